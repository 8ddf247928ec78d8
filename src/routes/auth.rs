use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use crate::{
    dto::{
        auth_dto::{AuthResponse, LoginPayload, MeResponse, RegisterPayload},
        common::{ApiResponse, JsonBody},
    },
    error::Result,
    services::auth_service::CurrentUser,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Account created and token issued", body = AuthResponse),
        (status = 422, description = "Invalid payload or email already taken")
    )
)]
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterPayload>,
) -> Result<impl IntoResponse> {
    let (user, token) = state.auth_service.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "User registered successfully".to_string(),
            user: user.into(),
            token,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Token issued", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginPayload>,
) -> Result<impl IntoResponse> {
    let (user, token) = state.auth_service.login(payload).await?;
    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        user: user.into(),
        token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Current token revoked"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    state.auth_service.logout(&current).await?;
    Ok(Json(ApiResponse::message("Logged out successfully")))
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "The authenticated user", body = MeResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn me(Extension(current): Extension<CurrentUser>) -> Result<impl IntoResponse> {
    Ok(Json(MeResponse {
        success: true,
        user: current.user.into(),
    }))
}
