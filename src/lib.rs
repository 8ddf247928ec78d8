pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod routes;
pub mod services;
pub mod storage;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    application_service::ApplicationService, auth_service::AuthService,
    cv_file_service::CvFileService, dashboard_service::DashboardService,
    job_offer_service::JobOfferService, user_service::UserService,
};
use crate::storage::{BlobStore, LocalBlobStore};
use crate::utils::crypto::TokenSigner;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub storage: Arc<dyn BlobStore>,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub job_offer_service: JobOfferService,
    pub application_service: ApplicationService,
    pub cv_file_service: CvFileService,
    pub dashboard_service: DashboardService,
}

impl AppState {
    /// Wires the services against the local-disk blob store from `config`.
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let storage: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(config.uploads_dir.clone()));
        Self::with_storage(pool, storage, config)
    }

    pub fn with_storage(pool: PgPool, storage: Arc<dyn BlobStore>, config: &Config) -> Self {
        let signer = TokenSigner::new(&config.jwt_secret, config.jwt_ttl_minutes);

        let user_service = UserService::new(pool.clone(), storage.clone());
        let auth_service = AuthService::new(pool.clone(), signer, user_service.clone());
        let job_offer_service = JobOfferService::new(pool.clone(), user_service.clone());
        let cv_file_service = CvFileService::new(
            pool.clone(),
            storage.clone(),
            user_service.clone(),
            config.max_upload_bytes,
        );
        let application_service = ApplicationService::new(
            pool.clone(),
            user_service.clone(),
            job_offer_service.clone(),
            cv_file_service.clone(),
        );
        let dashboard_service = DashboardService::new(
            user_service.clone(),
            job_offer_service.clone(),
            application_service.clone(),
            cv_file_service.clone(),
        );

        Self {
            pool,
            storage,
            auth_service,
            user_service,
            job_offer_service,
            application_service,
            cv_file_service,
            dashboard_service,
        }
    }
}
