use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::dto::application_dto::{
    ApplicationListQuery, ApplicationResponse, CreateApplicationPayload, UpdateApplicationPayload,
};
use crate::dto::common::{page_number, page_offset, Page, PER_PAGE};
use crate::dto::cv_file_dto::CvFileResponse;
use crate::dto::user_dto::UserResponse;
use crate::error::{Error, Result};
use crate::models::application::{Application, ApplicationStatus};
use crate::policy::{self, Actor, ApplicationDraft, Listing, ListingScope};
use crate::services::cv_file_service::CvFileService;
use crate::services::job_offer_service::JobOfferService;
use crate::services::user_service::UserService;
use crate::utils::validation::{field_error, max_chars, validate, validate_with};

const MESSAGE_MAX_CHARS: usize = 5000;

pub(crate) const APPLICATION_COLUMNS: &str =
    "id, candidate_id, job_offer_id, cv_file_id, status, message, created_at, updated_at";

#[derive(Clone)]
pub struct ApplicationService {
    pool: PgPool,
    users: UserService,
    offers: JobOfferService,
    cv_files: CvFileService,
}

impl ApplicationService {
    pub fn new(
        pool: PgPool,
        users: UserService,
        offers: JobOfferService,
        cv_files: CvFileService,
    ) -> Self {
        Self {
            pool,
            users,
            offers,
            cv_files,
        }
    }

    pub async fn find(&self, id: i64) -> Result<Option<Application>> {
        let sql = format!("SELECT {} FROM applications WHERE id = $1", APPLICATION_COLUMNS);
        let application = sqlx::query_as::<_, Application>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(application)
    }

    pub async fn get(&self, id: i64) -> Result<Application> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound("Application not found".to_string()))
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: ApplicationListQuery,
    ) -> Result<Page<ApplicationResponse>> {
        let Some(scope) = policy::listing_scope(Some(actor), Listing::Applications) else {
            return Err(Error::Forbidden("You are not allowed to list applications".to_string()));
        };
        let page = page_number(query.page);
        let status = query
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM applications");
        push_application_filters(&mut count_qb, scope, status.as_deref(), query.job_offer_id);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut items_qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM applications",
            APPLICATION_COLUMNS
        ));
        push_application_filters(&mut items_qb, scope, status.as_deref(), query.job_offer_id);
        items_qb
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(PER_PAGE)
            .push(" OFFSET ")
            .push_bind(page_offset(page));
        let rows = items_qb
            .build_query_as::<Application>()
            .fetch_all(&self.pool)
            .await?;

        let items = self.hydrate(rows).await?;
        Ok(Page::new(items, total, page, PER_PAGE))
    }

    /// Most recent applications within a scope, hydrated. Used by the dashboard.
    pub async fn recent(&self, scope: ListingScope, limit: i64) -> Result<Vec<ApplicationResponse>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM applications",
            APPLICATION_COLUMNS
        ));
        push_application_filters(&mut qb, scope, None, None);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(limit);
        let rows = qb.build_query_as::<Application>().fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    /// Counts applications within a scope, optionally restricted to a status.
    pub async fn count(&self, scope: ListingScope, status: Option<ApplicationStatus>) -> Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM applications");
        push_application_filters(&mut qb, scope, status.map(|s| s.as_str()), None);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    pub async fn show(&self, actor: &Actor, id: i64) -> Result<ApplicationResponse> {
        let application = self.get(id).await?;
        let offer = self.offers.get(application.job_offer_id).await?;
        if !policy::can_view_application(actor, &application, &offer) {
            tracing::debug!(actor_id = actor.id, application_id = id, "application view denied");
            return Err(Error::Forbidden("Access denied".to_string()));
        }
        self.hydrate_one(application).await
    }

    /// Submits an application for the acting candidate. The unique
    /// `(candidate_id, job_offer_id)` constraint settles concurrent
    /// duplicates that both pass the precondition check.
    pub async fn create(
        &self,
        actor: &Actor,
        payload: CreateApplicationPayload,
    ) -> Result<ApplicationResponse> {
        if !policy::can_create_application(actor) {
            return Err(Error::Forbidden("Only candidates can apply".to_string()));
        }
        validate(&payload)?;
        let job_offer_id = payload.job_offer_id.ok_or_else(|| {
            Error::Validation(field_error(
                "job_offer_id",
                "required",
                "The job offer id field is required.",
            ))
        })?;

        let Some(offer) = self.offers.find(job_offer_id).await? else {
            return Err(Error::Validation(field_error(
                "job_offer_id",
                "exists",
                "The selected job offer id is invalid.",
            )));
        };
        let cv = match payload.cv_file_id {
            Some(cv_file_id) => match self.cv_files.find(cv_file_id).await? {
                Some(cv) => Some(cv),
                None => {
                    return Err(Error::Validation(field_error(
                        "cv_file_id",
                        "exists",
                        "The selected cv file id is invalid.",
                    )))
                }
            },
            None => None,
        };

        let draft = ApplicationDraft {
            candidate_id: actor.id,
            job_offer_id: offer.id,
            cv_file_id: payload.cv_file_id,
            message: payload.message,
        };
        let existing = self.existing_for(draft.candidate_id, draft.job_offer_id).await?;
        if let Err(violation) =
            policy::application_creation_preconditions(&draft, &offer, &existing, cv.as_ref())
        {
            tracing::debug!(actor_id = actor.id, offer_id = offer.id, %violation, "application rejected");
            return Err(violation.into());
        }

        let sql = format!(
            "INSERT INTO applications (candidate_id, job_offer_id, cv_file_id, status, message)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            APPLICATION_COLUMNS
        );
        let application = sqlx::query_as::<_, Application>(&sql)
            .bind(draft.candidate_id)
            .bind(draft.job_offer_id)
            .bind(draft.cv_file_id)
            .bind(ApplicationStatus::default())
            .bind(&draft.message)
            .fetch_one(&self.pool)
            .await?;

        tracing::info!(
            actor_id = actor.id,
            application_id = application.id,
            offer_id = offer.id,
            "application submitted"
        );
        self.hydrate_one(application).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        payload: UpdateApplicationPayload,
    ) -> Result<ApplicationResponse> {
        let application = self.get(id).await?;
        let offer = self.offers.get(application.job_offer_id).await?;
        if !policy::can_mutate_application_status(actor, &application, &offer) {
            tracing::debug!(actor_id = actor.id, application_id = id, "application update denied");
            return Err(Error::Forbidden(
                "You are not allowed to modify this application".to_string(),
            ));
        }
        validate_with(&payload, |errors| {
            if let Some(Some(message)) = &payload.message {
                if let Err(err) = max_chars(message, MESSAGE_MAX_CHARS) {
                    errors.add("message", err);
                }
            }
        })?;
        let requested = payload.status.as_deref().unwrap_or_default();
        let status = policy::application_status_transition(application.status, requested)?;

        let sql = format!(
            "UPDATE applications SET
                status = $2,
                message = CASE WHEN $3 THEN $4 ELSE message END,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            APPLICATION_COLUMNS
        );
        let updated = sqlx::query_as::<_, Application>(&sql)
            .bind(application.id)
            .bind(status)
            .bind(payload.message.is_some())
            .bind(payload.message.clone().flatten())
            .fetch_one(&self.pool)
            .await?;

        tracing::info!(
            actor_id = actor.id,
            application_id = id,
            from = %application.status,
            to = %updated.status,
            "application status changed"
        );
        self.hydrate_one(updated).await
    }

    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        let application = self.get(id).await?;
        if !policy::can_delete_application(actor, &application) {
            tracing::debug!(actor_id = actor.id, application_id = id, "application delete denied");
            return Err(Error::Forbidden(
                "You are not allowed to delete this application".to_string(),
            ));
        }
        sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(application.id)
            .execute(&self.pool)
            .await?;
        tracing::info!(actor_id = actor.id, application_id = id, "application deleted");
        Ok(())
    }

    async fn existing_for(&self, candidate_id: i64, job_offer_id: i64) -> Result<Vec<Application>> {
        let sql = format!(
            "SELECT {} FROM applications WHERE candidate_id = $1 AND job_offer_id = $2",
            APPLICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, Application>(&sql)
            .bind(candidate_id)
            .bind(job_offer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Attaches candidate, offer (with its company) and CV to each row.
    async fn hydrate(&self, rows: Vec<Application>) -> Result<Vec<ApplicationResponse>> {
        let candidate_ids = unique(rows.iter().map(|a| a.candidate_id));
        let offer_ids = unique(rows.iter().map(|a| a.job_offer_id));
        let cv_ids = unique(rows.iter().filter_map(|a| a.cv_file_id));

        let candidates = self.users.find_many(&candidate_ids).await?;
        let offers = self.offers.find_many(&offer_ids).await?;
        let offers = self
            .offers
            .hydrate(offers.into_values().collect())
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect::<HashMap<_, _>>();
        let cvs = self
            .cv_files
            .find_many(&cv_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect::<HashMap<_, _>>();

        Ok(rows
            .into_iter()
            .map(|application| {
                let candidate = candidates
                    .get(&application.candidate_id)
                    .cloned()
                    .map(UserResponse::from);
                let job_offer = offers.get(&application.job_offer_id).cloned();
                let cv_file = application
                    .cv_file_id
                    .and_then(|id| cvs.get(&id).cloned())
                    .map(CvFileResponse::from);
                let mut response = ApplicationResponse::from(application);
                response.candidate = candidate;
                response.job_offer = job_offer;
                response.cv_file = cv_file;
                response
            })
            .collect())
    }

    async fn hydrate_one(&self, application: Application) -> Result<ApplicationResponse> {
        let mut hydrated = self.hydrate(vec![application]).await?;
        hydrated
            .pop()
            .ok_or_else(|| Error::Internal("hydration dropped the application".to_string()))
    }
}

fn unique(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn push_application_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: ListingScope,
    status: Option<&str>,
    job_offer_id: Option<i64>,
) {
    qb.push(" WHERE TRUE");
    match scope {
        ListingScope::All => {}
        ListingScope::Candidate(candidate_id) => {
            qb.push(" AND candidate_id = ").push_bind(candidate_id);
        }
        ListingScope::Company(company_id) => {
            qb.push(" AND job_offer_id IN (SELECT id FROM job_offers WHERE company_id = ")
                .push_bind(company_id)
                .push(")");
        }
        ListingScope::ActiveOnly | ListingScope::ActiveOrCompany(_) => {
            qb.push(" AND FALSE");
        }
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(job_offer_id) = job_offer_id {
        qb.push(" AND job_offer_id = ").push_bind(job_offer_id);
    }
}
