use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use crate::{
    dto::{
        common::{ApiResponse, JsonBody, PathParam, QueryParams},
        job_offer_dto::{
            CreateJobOfferPayload, JobOfferListQuery, JobOfferResponse, UpdateJobOfferPayload,
        },
    },
    error::Result,
    services::auth_service::CurrentUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/job-offers",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("status" = Option<String>, Query, description = "active, inactive or closed"),
        ("location" = Option<String>, Query, description = "Substring match on location"),
        ("contract_type" = Option<String>, Query, description = "Exact contract type"),
        ("search" = Option<String>, Query, description = "Substring match on title or description")
    ),
    responses(
        (status = 200, description = "Page of visible job offers", body = [JobOfferResponse])
    )
)]
#[axum::debug_handler]
pub async fn list_job_offers(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    QueryParams(query): QueryParams<JobOfferListQuery>,
) -> Result<impl IntoResponse> {
    let actor = current.map(|Extension(c)| c.user.actor());
    let page = state.job_offer_service.list(actor.as_ref(), query).await?;
    Ok(Json(ApiResponse::data(page)))
}

#[utoipa::path(
    get,
    path = "/api/my-job-offers",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("status" = Option<String>, Query, description = "active, inactive or closed"),
        ("location" = Option<String>, Query, description = "Substring match on location"),
        ("contract_type" = Option<String>, Query, description = "Exact contract type"),
        ("search" = Option<String>, Query, description = "Substring match on title or description")
    ),
    responses(
        (status = 200, description = "Page of the caller's offers in every status", body = [JobOfferResponse]),
        (status = 403, description = "Caller is a candidate")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn list_my_job_offers(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    QueryParams(query): QueryParams<JobOfferListQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .job_offer_service
        .list_mine(&current.user.actor(), query)
        .await?;
    Ok(Json(ApiResponse::data(page)))
}

#[utoipa::path(
    get,
    path = "/api/job-offers/{id}",
    params(("id" = i64, Path, description = "Job offer ID")),
    responses(
        (status = 200, description = "Job offer with company and application count", body = JobOfferResponse),
        (status = 403, description = "Offer is not active and the caller does not own it"),
        (status = 404, description = "Job offer not found")
    )
)]
#[axum::debug_handler]
pub async fn get_job_offer(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let actor = current.map(|Extension(c)| c.user.actor());
    let offer = state.job_offer_service.show(actor.as_ref(), id).await?;
    Ok(Json(ApiResponse::data(offer)))
}

#[utoipa::path(
    post,
    path = "/api/job-offers",
    request_body = CreateJobOfferPayload,
    responses(
        (status = 201, description = "Job offer created", body = JobOfferResponse),
        (status = 403, description = "Caller is not a company"),
        (status = 422, description = "Invalid payload")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn create_job_offer(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(payload): JsonBody<CreateJobOfferPayload>,
) -> Result<impl IntoResponse> {
    let offer = state
        .job_offer_service
        .create(&current.user.actor(), payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Job offer created successfully", offer)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/job-offers/{id}",
    params(("id" = i64, Path, description = "Job offer ID")),
    request_body = UpdateJobOfferPayload,
    responses(
        (status = 200, description = "Job offer updated", body = JobOfferResponse),
        (status = 403, description = "Caller neither owns the offer nor is an admin"),
        (status = 404, description = "Job offer not found"),
        (status = 422, description = "Invalid payload")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn update_job_offer(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<UpdateJobOfferPayload>,
) -> Result<impl IntoResponse> {
    let offer = state
        .job_offer_service
        .update(&current.user.actor(), id, payload)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Job offer updated successfully",
        offer,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/job-offers/{id}",
    params(("id" = i64, Path, description = "Job offer ID")),
    responses(
        (status = 200, description = "Job offer and its applications deleted"),
        (status = 403, description = "Caller neither owns the offer nor is an admin"),
        (status = 404, description = "Job offer not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn delete_job_offer(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    state
        .job_offer_service
        .delete(&current.user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::message("Job offer deleted successfully")))
}
