use crate::dto::dashboard_dto::{
    AdminDashboard, CandidateDashboard, CompanyDashboard, DashboardStats,
};
use crate::error::Result;
use crate::models::application::ApplicationStatus;
use crate::models::job_offer::OfferStatus;
use crate::models::user::Role;
use crate::policy::{Actor, ListingScope};
use crate::services::application_service::ApplicationService;
use crate::services::cv_file_service::CvFileService;
use crate::services::job_offer_service::JobOfferService;
use crate::services::user_service::UserService;

const ADMIN_RECENT: i64 = 5;
const OWNER_RECENT: i64 = 10;

/// Read-only projection over the other services; counts are taken at query
/// time and never stored.
#[derive(Clone)]
pub struct DashboardService {
    users: UserService,
    offers: JobOfferService,
    applications: ApplicationService,
    cv_files: CvFileService,
}

impl DashboardService {
    pub fn new(
        users: UserService,
        offers: JobOfferService,
        applications: ApplicationService,
        cv_files: CvFileService,
    ) -> Self {
        Self {
            users,
            offers,
            applications,
            cv_files,
        }
    }

    pub async fn stats(&self, actor: &Actor) -> Result<DashboardStats> {
        match actor.role {
            Role::Admin => self.admin().await.map(DashboardStats::Admin),
            Role::Company => self.company(actor.id).await.map(DashboardStats::Company),
            Role::Candidate => self.candidate(actor.id).await.map(DashboardStats::Candidate),
        }
    }

    async fn admin(&self) -> Result<AdminDashboard> {
        let by_role = self.users.count_by_role().await?;
        let role_count = |role: Role| by_role.get(&role).copied().unwrap_or(0);
        Ok(AdminDashboard {
            total_users: by_role.values().sum(),
            total_companies: role_count(Role::Company),
            total_candidates: role_count(Role::Candidate),
            total_job_offers: self.offers.count(ListingScope::All, None).await?,
            active_job_offers: self
                .offers
                .count(ListingScope::All, Some(OfferStatus::Active))
                .await?,
            total_applications: self.applications.count(ListingScope::All, None).await?,
            pending_applications: self
                .applications
                .count(ListingScope::All, Some(ApplicationStatus::Pending))
                .await?,
            recent_job_offers: self.offers.recent(ListingScope::All, ADMIN_RECENT).await?,
            recent_applications: self
                .applications
                .recent(ListingScope::All, ADMIN_RECENT)
                .await?,
        })
    }

    async fn company(&self, company_id: i64) -> Result<CompanyDashboard> {
        let scope = ListingScope::Company(company_id);
        Ok(CompanyDashboard {
            total_job_offers: self.offers.count(scope, None).await?,
            active_job_offers: self.offers.count(scope, Some(OfferStatus::Active)).await?,
            total_applications: self.applications.count(scope, None).await?,
            pending_applications: self
                .applications
                .count(scope, Some(ApplicationStatus::Pending))
                .await?,
            accepted_applications: self
                .applications
                .count(scope, Some(ApplicationStatus::Accepted))
                .await?,
            recent_applications: self.applications.recent(scope, OWNER_RECENT).await?,
        })
    }

    async fn candidate(&self, candidate_id: i64) -> Result<CandidateDashboard> {
        let scope = ListingScope::Candidate(candidate_id);
        Ok(CandidateDashboard {
            total_applications: self.applications.count(scope, None).await?,
            pending_applications: self
                .applications
                .count(scope, Some(ApplicationStatus::Pending))
                .await?,
            accepted_applications: self
                .applications
                .count(scope, Some(ApplicationStatus::Accepted))
                .await?,
            total_cv_files: self.cv_files.count_for_candidate(candidate_id).await?,
            recent_applications: self.applications.recent(scope, OWNER_RECENT).await?,
        })
    }
}
