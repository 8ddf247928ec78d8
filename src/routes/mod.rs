pub mod application;
pub mod auth;
pub mod cv_file;
pub mod dashboard;
pub mod health;
pub mod job_offer;
pub mod user;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{Request, Response},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::Span;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::Config;
use crate::middleware::{
    auth::{optional_auth, require_auth},
    cors::cors_layer,
    rate_limit::{rate_limit, RateLimiter},
};
use crate::AppState;

/// Headroom above the upload cap so an oversized file still reaches the
/// handler and is reported as a validation error.
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        dashboard::get_dashboard,
        job_offer::list_job_offers,
        job_offer::list_my_job_offers,
        job_offer::get_job_offer,
        job_offer::create_job_offer,
        job_offer::update_job_offer,
        job_offer::delete_job_offer,
        application::list_applications,
        application::create_application,
        application::get_application,
        application::update_application,
        application::delete_application,
        cv_file::list_cv_files,
        cv_file::upload_cv_file,
        cv_file::get_cv_file,
        cv_file::download_cv_file,
        cv_file::delete_cv_file,
        user::list_users,
        user::create_user,
        user::get_user,
        user::update_user,
        user::delete_user,
    ),
    components(schemas(
        crate::dto::auth_dto::RegisterPayload,
        crate::dto::auth_dto::LoginPayload,
        crate::dto::auth_dto::AuthResponse,
        crate::dto::auth_dto::MeResponse,
        crate::dto::user_dto::UserResponse,
        crate::dto::user_dto::CreateUserPayload,
        crate::dto::user_dto::UpdateUserPayload,
        crate::dto::job_offer_dto::CreateJobOfferPayload,
        crate::dto::job_offer_dto::UpdateJobOfferPayload,
        crate::dto::job_offer_dto::JobOfferResponse,
        crate::dto::application_dto::CreateApplicationPayload,
        crate::dto::application_dto::UpdateApplicationPayload,
        crate::dto::application_dto::ApplicationResponse,
        crate::dto::cv_file_dto::CvFileResponse,
        crate::dto::cv_file_dto::CvUploadForm,
        crate::dto::dashboard_dto::DashboardStats,
        crate::dto::dashboard_dto::AdminDashboard,
        crate::dto::dashboard_dto::CompanyDashboard,
        crate::dto::dashboard_dto::CandidateDashboard,
        crate::models::user::Role,
        crate::models::job_offer::OfferStatus,
        crate::models::job_offer::ContractType,
        crate::models::application::ApplicationStatus,
    )),
    modifiers(&BearerAuth),
    tags((name = "jobboard", description = "Job offers, applications and résumés"))
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Full HTTP surface: `/health` and the OpenAPI document at the root, the
/// marketplace API under `/api`.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let public_limiter = RateLimiter::per_second("public", config.public_rps);

    let auth_api = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(from_fn_with_state(public_limiter.clone(), rate_limit));

    // anonymous callers allowed; a bearer token, when present, must be valid
    let public_api = Router::new()
        .route("/job-offers", get(job_offer::list_job_offers))
        .route("/job-offers/:id", get(job_offer::get_job_offer))
        .route_layer(from_fn_with_state(state.clone(), optional_auth))
        .layer(from_fn_with_state(public_limiter, rate_limit));

    let protected_api = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/my-job-offers", get(job_offer::list_my_job_offers))
        .route("/job-offers", post(job_offer::create_job_offer))
        .route(
            "/job-offers/:id",
            axum::routing::put(job_offer::update_job_offer)
                .patch(job_offer::update_job_offer)
                .delete(job_offer::delete_job_offer),
        )
        .route(
            "/applications",
            get(application::list_applications).post(application::create_application),
        )
        .route(
            "/applications/:id",
            get(application::get_application)
                .put(application::update_application)
                .patch(application::update_application)
                .delete(application::delete_application),
        )
        .route(
            "/cv-files",
            get(cv_file::list_cv_files).post(cv_file::upload_cv_file),
        )
        .route(
            "/cv-files/:id",
            get(cv_file::get_cv_file).delete(cv_file::delete_cv_file),
        )
        .route("/cv-files/:id/download", get(cv_file::download_cv_file))
        .route("/users", get(user::list_users).post(user::create_user))
        .route(
            "/users/:id",
            get(user::get_user)
                .put(user::update_user)
                .delete(user::delete_user),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .layer(from_fn_with_state(
            RateLimiter::per_second("api", config.api_rps),
            rate_limit,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api", auth_api.merge(public_api).merge(protected_api))
        .with_state(state)
        .layer(DefaultBodyLimit::max(
            config.max_upload_bytes + BODY_LIMIT_HEADROOM,
        ))
        .layer(CompressionLayer::new())
        .layer(cors_layer(config.cors_allowed_origin.as_deref()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri(),
                        status = tracing::field::Empty,
                    )
                })
                .on_response(|res: &Response<_>, latency: Duration, span: &Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, ?latency, "request failed");
                    } else {
                        tracing::info!(%status, ?latency, "request completed");
                    }
                }),
        )
}
