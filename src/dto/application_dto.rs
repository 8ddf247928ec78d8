use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::common::nullable;
use crate::dto::cv_file_dto::CvFileResponse;
use crate::dto::job_offer_dto::JobOfferResponse;
use crate::dto::user_dto::UserResponse;
use crate::models::application::{Application, ApplicationStatus};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateApplicationPayload {
    #[validate(required(message = "The job offer id field is required."))]
    pub job_offer_id: Option<i64>,
    pub cv_file_id: Option<i64>,
    #[validate(length(max = 5000))]
    pub message: Option<String>,
}

/// `message: null` clears the stored message; leaving it out keeps it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateApplicationPayload {
    #[validate(required(message = "The status field is required."))]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub message: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplicationResponse {
    pub id: i64,
    pub candidate_id: i64,
    pub job_offer_id: i64,
    pub cv_file_id: Option<i64>,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_offer: Option<JobOfferResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_file: Option<CvFileResponse>,
}

impl From<Application> for ApplicationResponse {
    fn from(value: Application) -> Self {
        Self {
            id: value.id,
            candidate_id: value.candidate_id,
            job_offer_id: value.job_offer_id,
            cv_file_id: value.cv_file_id,
            status: value.status,
            message: value.message,
            created_at: value.created_at,
            updated_at: value.updated_at,
            candidate: None,
            job_offer: None,
            cv_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApplicationListQuery {
    pub page: Option<i64>,
    pub status: Option<String>,
    pub job_offer_id: Option<i64>,
}
