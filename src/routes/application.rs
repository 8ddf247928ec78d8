use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use crate::{
    dto::{
        application_dto::{
            ApplicationListQuery, ApplicationResponse, CreateApplicationPayload,
            UpdateApplicationPayload,
        },
        common::{ApiResponse, JsonBody, PathParam, QueryParams},
    },
    error::Result,
    services::auth_service::CurrentUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/applications",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("status" = Option<String>, Query, description = "pending, reviewed, accepted or rejected"),
        ("job_offer_id" = Option<i64>, Query, description = "Restrict to one offer")
    ),
    responses(
        (status = 200, description = "Applications visible to the caller", body = [ApplicationResponse])
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn list_applications(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    QueryParams(query): QueryParams<ApplicationListQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .application_service
        .list(&current.user.actor(), query)
        .await?;
    Ok(Json(ApiResponse::data(page)))
}

#[utoipa::path(
    post,
    path = "/api/applications",
    request_body = CreateApplicationPayload,
    responses(
        (status = 201, description = "Application submitted with status pending", body = ApplicationResponse),
        (status = 400, description = "Offer not active or already applied"),
        (status = 403, description = "Caller is not a candidate or does not own the CV"),
        (status = 422, description = "Invalid payload")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn create_application(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(payload): JsonBody<CreateApplicationPayload>,
) -> Result<impl IntoResponse> {
    let application = state
        .application_service
        .create(&current.user.actor(), payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Application submitted successfully",
            application,
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}",
    params(("id" = i64, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application with candidate, offer and CV", body = ApplicationResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Application not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let application = state
        .application_service
        .show(&current.user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::data(application)))
}

#[utoipa::path(
    put,
    path = "/api/applications/{id}",
    params(("id" = i64, Path, description = "Application ID")),
    request_body = UpdateApplicationPayload,
    responses(
        (status = 200, description = "Status updated", body = ApplicationResponse),
        (status = 403, description = "Caller is the candidate or an unrelated company"),
        (status = 404, description = "Application not found"),
        (status = 422, description = "Missing or unknown status")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn update_application(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<UpdateApplicationPayload>,
) -> Result<impl IntoResponse> {
    let application = state
        .application_service
        .update(&current.user.actor(), id, payload)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Application updated successfully",
        application,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/applications/{id}",
    params(("id" = i64, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application deleted"),
        (status = 403, description = "Only the candidate or an admin may delete"),
        (status = 404, description = "Application not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn delete_application(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    state
        .application_service
        .delete(&current.user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::message("Application deleted successfully")))
}
