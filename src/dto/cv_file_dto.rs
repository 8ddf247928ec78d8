use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::user_dto::UserResponse;
use crate::models::cv_file::CvFile;

/// Multipart body of `POST /api/cv-files`, documented for OpenAPI only; the
/// handler reads the parts directly.
#[derive(Debug, ToSchema)]
pub struct CvUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub cv_file: Vec<u8>,
}

/// The storage key stays server-side; clients fetch content via `/download`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CvFileResponse {
    pub id: i64,
    pub candidate_id: i64,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<UserResponse>,
}

impl From<CvFile> for CvFileResponse {
    fn from(value: CvFile) -> Self {
        Self {
            id: value.id,
            candidate_id: value.candidate_id,
            file_name: value.file_name,
            file_size: value.file_size,
            mime_type: value.mime_type,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
            candidate: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CvFileListQuery {
    pub page: Option<i64>,
    pub is_active: Option<bool>,
}
