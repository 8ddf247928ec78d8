use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::dto::common::{page_number, page_offset, Page, PER_PAGE};
use crate::dto::cv_file_dto::{CvFileListQuery, CvFileResponse};
use crate::dto::user_dto::UserResponse;
use crate::error::{Error, Result};
use crate::models::cv_file::CvFile;
use crate::policy::{self, Actor, Listing, ListingScope};
use crate::services::user_service::UserService;
use crate::storage::{BlobReader, BlobStore};
use crate::utils::validation::field_error;

pub(crate) const CV_COLUMNS: &str =
    "id, candidate_id, file_name, storage_key, file_size, mime_type, is_active, created_at, updated_at";

pub const UPLOAD_FIELD: &str = "cv_file";

/// A file part lifted out of the multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// An accepted résumé format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CvFormat {
    pub extension: &'static str,
    pub mime_type: &'static str,
    magic: &'static [u8],
}

const FORMATS: [CvFormat; 3] = [
    CvFormat {
        extension: "pdf",
        mime_type: "application/pdf",
        magic: b"%PDF",
    },
    CvFormat {
        extension: "doc",
        mime_type: "application/msword",
        magic: &[0xD0, 0xCF, 0x11, 0xE0],
    },
    CvFormat {
        extension: "docx",
        mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        magic: b"PK\x03\x04",
    },
];

/// Checks an upload against the accepted formats and the size cap.
pub fn inspect_upload(
    file: &UploadedFile,
    max_bytes: usize,
) -> std::result::Result<CvFormat, validator::ValidationErrors> {
    let reject = |msg: &'static str| field_error(UPLOAD_FIELD, "file", msg);

    if file.bytes.is_empty() {
        return Err(reject("The cv file must not be empty."));
    }
    if file.bytes.len() > max_bytes {
        return Err(reject("The cv file is too large."));
    }
    let extension = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let Some(format) = FORMATS.iter().find(|f| f.extension == extension) else {
        return Err(reject("The cv file must be a file of type: pdf, doc, docx."));
    };
    if !file.bytes.starts_with(format.magic) {
        return Err(reject("The cv file content does not match its extension."));
    }
    Ok(*format)
}

/// Keeps the base name and drops characters that would break a
/// `Content-Disposition` header.
pub fn display_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "cv".to_string()
    } else {
        cleaned.chars().take(255).collect()
    }
}

pub struct CvDownload {
    pub file_name: String,
    pub mime_type: String,
    pub reader: BlobReader,
}

#[derive(Clone)]
pub struct CvFileService {
    pool: PgPool,
    storage: Arc<dyn BlobStore>,
    users: UserService,
    max_upload_bytes: usize,
}

impl CvFileService {
    pub fn new(
        pool: PgPool,
        storage: Arc<dyn BlobStore>,
        users: UserService,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            pool,
            storage,
            users,
            max_upload_bytes,
        }
    }

    pub async fn find(&self, id: i64) -> Result<Option<CvFile>> {
        let sql = format!("SELECT {} FROM cv_files WHERE id = $1", CV_COLUMNS);
        let cv = sqlx::query_as::<_, CvFile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cv)
    }

    pub async fn get(&self, id: i64) -> Result<CvFile> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound("CV not found".to_string()))
    }

    pub async fn list(&self, actor: &Actor, query: CvFileListQuery) -> Result<Page<CvFileResponse>> {
        let Some(scope) = policy::listing_scope(Some(actor), Listing::CvFiles) else {
            tracing::debug!(actor_id = actor.id, "cv listing denied");
            return Err(Error::Forbidden("You are not allowed to list CVs".to_string()));
        };
        let page = page_number(query.page);

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM cv_files");
        push_cv_filters(&mut count_qb, scope, query.is_active);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut items_qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM cv_files", CV_COLUMNS));
        push_cv_filters(&mut items_qb, scope, query.is_active);
        items_qb
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(PER_PAGE)
            .push(" OFFSET ")
            .push_bind(page_offset(page));
        let rows = items_qb
            .build_query_as::<CvFile>()
            .fetch_all(&self.pool)
            .await?;

        let items = self.hydrate(rows).await?;
        Ok(Page::new(items, total, page, PER_PAGE))
    }

    pub async fn show(&self, actor: &Actor, id: i64) -> Result<CvFileResponse> {
        let cv = self.get(id).await?;
        self.authorize_view(actor, &cv).await?;
        let candidate = self.users.find(cv.candidate_id).await?.map(UserResponse::from);
        let mut response = CvFileResponse::from(cv);
        response.candidate = candidate;
        Ok(response)
    }

    /// Stores the blob first, then the row; a failed insert removes the blob
    /// again.
    pub async fn upload(&self, actor: &Actor, file: Option<UploadedFile>) -> Result<CvFileResponse> {
        if !policy::can_upload_cv_file(actor) {
            return Err(Error::Forbidden("Only candidates can upload CVs".to_string()));
        }
        let Some(file) = file else {
            return Err(Error::Validation(field_error(
                UPLOAD_FIELD,
                "required",
                "The cv file field is required.",
            )));
        };
        let format = inspect_upload(&file, self.max_upload_bytes)?;

        let storage_key = format!("cv_files/{}/{}.{}", actor.id, Uuid::new_v4(), format.extension);
        let file_size = file.bytes.len() as i64;
        self.storage.put(&storage_key, file.bytes).await?;

        let sql = format!(
            "INSERT INTO cv_files (candidate_id, file_name, storage_key, file_size, mime_type)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            CV_COLUMNS
        );
        let inserted = sqlx::query_as::<_, CvFile>(&sql)
            .bind(actor.id)
            .bind(display_name(&file.file_name))
            .bind(&storage_key)
            .bind(file_size)
            .bind(format.mime_type)
            .fetch_one(&self.pool)
            .await;
        let cv = match inserted {
            Ok(cv) => cv,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&storage_key).await {
                    tracing::warn!(key = %storage_key, error = ?cleanup, "orphaned cv blob");
                }
                return Err(e.into());
            }
        };

        tracing::info!(actor_id = actor.id, cv_file_id = cv.id, size = file_size, "cv uploaded");
        Ok(cv.into())
    }

    pub async fn download(&self, actor: &Actor, id: i64) -> Result<CvDownload> {
        let cv = self.get(id).await?;
        self.authorize_view(actor, &cv).await?;
        let Some(reader) = self.storage.open(&cv.storage_key).await? else {
            tracing::warn!(cv_file_id = cv.id, key = %cv.storage_key, "cv blob missing");
            return Err(Error::NotFound("File not found on server".to_string()));
        };
        Ok(CvDownload {
            file_name: cv.file_name,
            mime_type: cv.mime_type,
            reader,
        })
    }

    /// Removes the blob and the row. Applications that referenced the CV keep
    /// existing with `cv_file_id` cleared.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        let cv = self.get(id).await?;
        if !policy::can_delete_cv_file(actor, &cv) {
            tracing::debug!(actor_id = actor.id, cv_file_id = id, "cv delete denied");
            return Err(Error::Forbidden("You are not allowed to delete this CV".to_string()));
        }
        self.storage.delete(&cv.storage_key).await?;
        sqlx::query("DELETE FROM cv_files WHERE id = $1")
            .bind(cv.id)
            .execute(&self.pool)
            .await?;
        tracing::info!(actor_id = actor.id, cv_file_id = id, "cv deleted");
        Ok(())
    }

    pub async fn find_many(&self, ids: &[i64]) -> Result<Vec<CvFile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM cv_files WHERE id = ANY($1)", CV_COLUMNS);
        let rows = sqlx::query_as::<_, CvFile>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count_for_candidate(&self, candidate_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cv_files WHERE candidate_id = $1",
        )
        .bind(candidate_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn authorize_view(&self, actor: &Actor, cv: &CvFile) -> Result<()> {
        let owners = if actor.is_company() {
            self.related_offer_owners(cv.id).await?
        } else {
            Vec::new()
        };
        if !policy::can_view_cv_file(actor, cv, &owners) {
            tracing::debug!(actor_id = actor.id, cv_file_id = cv.id, "cv access denied");
            return Err(Error::Forbidden("You are not allowed to access this CV".to_string()));
        }
        Ok(())
    }

    /// Owners of the offers that applications carrying this CV target.
    async fn related_offer_owners(&self, cv_file_id: i64) -> Result<Vec<i64>> {
        let owners = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT o.company_id
             FROM applications a
             JOIN job_offers o ON o.id = a.job_offer_id
             WHERE a.cv_file_id = $1",
        )
        .bind(cv_file_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(owners)
    }

    async fn hydrate(&self, rows: Vec<CvFile>) -> Result<Vec<CvFileResponse>> {
        let mut candidate_ids: Vec<i64> = rows.iter().map(|c| c.candidate_id).collect();
        candidate_ids.sort_unstable();
        candidate_ids.dedup();
        let candidates = self.users.find_many(&candidate_ids).await?;
        Ok(rows
            .into_iter()
            .map(|cv| {
                let candidate = candidates.get(&cv.candidate_id).cloned().map(UserResponse::from);
                let mut response = CvFileResponse::from(cv);
                response.candidate = candidate;
                response
            })
            .collect())
    }
}

fn push_cv_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: ListingScope, is_active: Option<bool>) {
    qb.push(" WHERE TRUE");
    match scope {
        ListingScope::Candidate(candidate_id) => {
            qb.push(" AND candidate_id = ").push_bind(candidate_id);
        }
        ListingScope::All => {}
        ListingScope::ActiveOnly | ListingScope::ActiveOrCompany(_) | ListingScope::Company(_) => {
            qb.push(" AND FALSE");
        }
    }
    if let Some(is_active) = is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
}
