pub mod application_dto;
pub mod auth_dto;
pub mod common;
pub mod cv_file_dto;
pub mod dashboard_dto;
pub mod job_offer_dto;
pub mod user_dto;
