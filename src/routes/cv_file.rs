use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Extension, Multipart, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tokio_util::io::ReaderStream;

use crate::{
    dto::{
        common::{ApiResponse, PathParam, QueryParams},
        cv_file_dto::{CvFileListQuery, CvFileResponse, CvUploadForm},
    },
    error::{Error, Result},
    services::{
        auth_service::CurrentUser,
        cv_file_service::{UploadedFile, UPLOAD_FIELD},
    },
    utils::validation::field_error,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/cv-files",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("is_active" = Option<bool>, Query, description = "Filter on the active flag")
    ),
    responses(
        (status = 200, description = "The caller's CVs, or all CVs for an admin", body = [CvFileResponse]),
        (status = 403, description = "Companies cannot list CVs")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn list_cv_files(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    QueryParams(query): QueryParams<CvFileListQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .cv_file_service
        .list(&current.user.actor(), query)
        .await?;
    Ok(Json(ApiResponse::data(page)))
}

fn upload_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::Validation(field_error(UPLOAD_FIELD, "max", "The cv file is too large."))
    } else {
        Error::Multipart(e)
    }
}

#[utoipa::path(
    post,
    path = "/api/cv-files",
    request_body(
        content = CvUploadForm,
        content_type = "multipart/form-data",
        description = "Single `cv_file` part: pdf, doc or docx"
    ),
    responses(
        (status = 201, description = "CV stored", body = CvFileResponse),
        (status = 403, description = "Caller is not a candidate"),
        (status = 422, description = "Missing, empty, oversized or unsupported file")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn upload_cv_file(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let mut upload = None;
    if let Ok(mut multipart) = multipart {
        while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
            if field.name() != Some(UPLOAD_FIELD) {
                continue;
            }
            let file_name = field.file_name().unwrap_or("cv").to_string();
            let bytes = field.bytes().await.map_err(upload_error)?;
            upload = Some(UploadedFile { file_name, bytes });
            break;
        }
    }

    let cv = state
        .cv_file_service
        .upload(&current.user.actor(), upload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("CV uploaded successfully", cv)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/cv-files/{id}",
    params(("id" = i64, Path, description = "CV file ID")),
    responses(
        (status = 200, description = "CV metadata with its candidate", body = CvFileResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "CV not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_cv_file(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let cv = state
        .cv_file_service
        .show(&current.user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::data(cv)))
}

#[utoipa::path(
    get,
    path = "/api/cv-files/{id}/download",
    params(("id" = i64, Path, description = "CV file ID")),
    responses(
        (status = 200, description = "File content as an attachment"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "CV or its stored file not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn download_cv_file(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<Response> {
    let download = state
        .cv_file_service
        .download(&current.user.actor(), id)
        .await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        download.file_name
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(&download.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(download.reader)),
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/api/cv-files/{id}",
    params(("id" = i64, Path, description = "CV file ID")),
    responses(
        (status = 200, description = "CV and its stored file deleted"),
        (status = 403, description = "Only the owner or an admin may delete"),
        (status = 404, description = "CV not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn delete_cv_file(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    state
        .cv_file_service
        .delete(&current.user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::message("CV deleted successfully")))
}
