use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::utils::validation::field_error;

pub type Result<T> = std::result::Result<T, Error>;

pub const DUPLICATE_APPLICATION_CONSTRAINT: &str = "applications_candidate_offer_unique";
pub const USER_EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::Multipart(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Error::Config(_)
            | Error::Database(_)
            | Error::Anyhow(_)
            | Error::Internal(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Flattens validator output into `field -> [messages]`.
pub fn validation_messages(errors: &validator::ValidationErrors) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    for (field, errs) in errors.field_errors() {
        let messages = errs
            .iter()
            .map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("The {} field is invalid ({}).", field, e.code),
            })
            .collect();
        out.insert(field.to_string(), messages);
    }
    out
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = match self {
            Error::Validation(errors) => json!({
                "success": false,
                "message": "The given data was invalid.",
                "errors": validation_messages(&errors),
            }),
            Error::BadRequest(msg)
            | Error::Unauthorized(msg)
            | Error::Forbidden(msg)
            | Error::NotFound(msg) => json!({ "success": false, "message": msg }),
            Error::Multipart(err) => json!({ "success": false, "message": err.to_string() }),
            Error::TooManyRequests => json!({ "success": false, "message": "Too many requests" }),
            other => {
                tracing::error!(error = %other, "request failed");
                json!({ "success": false, "message": "An unexpected error occurred" })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(ref db)
                if db.constraint() == Some(DUPLICATE_APPLICATION_CONSTRAINT) =>
            {
                Error::BadRequest("You have already applied to this job offer".to_string())
            }
            sqlx::Error::Database(ref db) if db.constraint() == Some(USER_EMAIL_CONSTRAINT) => {
                Error::Validation(field_error(
                    "email",
                    "unique",
                    "The email has already been taken.",
                ))
            }
            other => Error::Database(other),
        }
    }
}
