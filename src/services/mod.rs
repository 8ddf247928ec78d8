pub mod application_service;
pub mod auth_service;
pub mod cv_file_service;
pub mod dashboard_service;
pub mod job_offer_service;
pub mod user_service;
