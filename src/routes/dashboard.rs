use axum::{
    extract::{Extension, State},
    response::{IntoResponse, Json},
};

use crate::{
    dto::{common::ApiResponse, dashboard_dto::DashboardStats},
    error::Result,
    services::auth_service::CurrentUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Role-scoped counters and recent activity", body = DashboardStats),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let stats = state.dashboard_service.stats(&current.user.actor()).await?;
    Ok(Json(ApiResponse::data(stats)))
}
