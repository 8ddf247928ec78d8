use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::application_dto::ApplicationResponse;
use crate::dto::job_offer_dto::JobOfferResponse;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub total_users: i64,
    pub total_companies: i64,
    pub total_candidates: i64,
    pub total_job_offers: i64,
    pub active_job_offers: i64,
    pub total_applications: i64,
    pub pending_applications: i64,
    pub recent_job_offers: Vec<JobOfferResponse>,
    pub recent_applications: Vec<ApplicationResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompanyDashboard {
    pub total_job_offers: i64,
    pub active_job_offers: i64,
    pub total_applications: i64,
    pub pending_applications: i64,
    pub accepted_applications: i64,
    pub recent_applications: Vec<ApplicationResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CandidateDashboard {
    pub total_applications: i64,
    pub pending_applications: i64,
    pub accepted_applications: i64,
    pub total_cv_files: i64,
    pub recent_applications: Vec<ApplicationResponse>,
}

/// Serialized without a tag; the shape already tells the roles apart.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum DashboardStats {
    Admin(AdminDashboard),
    Company(CompanyDashboard),
    Candidate(CandidateDashboard),
}
