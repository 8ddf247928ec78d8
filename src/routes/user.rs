use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use crate::{
    dto::{
        common::{ApiResponse, JsonBody, PathParam, QueryParams},
        user_dto::{CreateUserPayload, UpdateUserPayload, UserListQuery, UserResponse},
    },
    error::Result,
    services::auth_service::CurrentUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("role" = Option<String>, Query, description = "admin, company or candidate"),
        ("search" = Option<String>, Query, description = "Substring match on name or email")
    ),
    responses(
        (status = 200, description = "Page of users", body = [UserResponse]),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    QueryParams(query): QueryParams<UserListQuery>,
) -> Result<impl IntoResponse> {
    let page = state.user_service.list(&current.user.actor(), query).await?;
    Ok(Json(ApiResponse::data(page)))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 422, description = "Invalid payload or email already taken")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(payload): JsonBody<CreateUserPayload>,
) -> Result<impl IntoResponse> {
    let user = state
        .user_service
        .create(&current.user.actor(), payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("User created successfully", user)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 403, description = "Caller is neither the user nor an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.show(&current.user.actor(), id).await?;
    Ok(Json(ApiResponse::data(user)))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserPayload,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Caller is neither the user nor an admin"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Invalid payload or role change attempted")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<UpdateUserPayload>,
) -> Result<impl IntoResponse> {
    let user = state
        .user_service
        .update(&current.user.actor(), id, payload)
        .await?;
    Ok(Json(ApiResponse::with_message("User updated successfully", user)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User and everything they own deleted"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    state.user_service.delete(&current.user.actor(), id).await?;
    Ok(Json(ApiResponse::message("User deleted successfully")))
}
