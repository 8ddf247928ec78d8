use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::dto::common::{page_number, page_offset, Page, PER_PAGE};
use crate::dto::job_offer_dto::{
    CreateJobOfferPayload, JobOfferListQuery, JobOfferResponse, UpdateJobOfferPayload,
};
use crate::dto::user_dto::UserResponse;
use crate::error::{Error, Result};
use crate::models::job_offer::{ContractType, JobOffer, OfferStatus};
use crate::models::user::Role;
use crate::policy::{self, Actor, Listing, ListingScope};
use crate::services::user_service::UserService;
use crate::utils::validation::{
    self, field_error, invalid, max_chars, non_negative, salary_range_error, validate_with,
};

pub(crate) const OFFER_COLUMNS: &str = "id, title, description, requirements, salary_min, salary_max, location, contract_type, status, company_id, created_at, updated_at";

#[derive(Clone)]
pub struct JobOfferService {
    pool: PgPool,
    users: UserService,
}

impl JobOfferService {
    pub fn new(pool: PgPool, users: UserService) -> Self {
        Self { pool, users }
    }

    pub async fn find(&self, id: i64) -> Result<Option<JobOffer>> {
        let sql = format!("SELECT {} FROM job_offers WHERE id = $1", OFFER_COLUMNS);
        let offer = sqlx::query_as::<_, JobOffer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(offer)
    }

    pub async fn get(&self, id: i64) -> Result<JobOffer> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound("Job offer not found".to_string()))
    }

    pub async fn find_many(&self, ids: &[i64]) -> Result<HashMap<i64, JobOffer>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!("SELECT {} FROM job_offers WHERE id = ANY($1)", OFFER_COLUMNS);
        let offers = sqlx::query_as::<_, JobOffer>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(offers.into_iter().map(|o| (o.id, o)).collect())
    }

    /// Public board. Anonymous callers and candidates only ever see active
    /// offers; an explicit `status` filter widens the scope for companies
    /// (their own offers) and admins (everything).
    pub async fn list(
        &self,
        actor: Option<&Actor>,
        query: JobOfferListQuery,
    ) -> Result<Page<JobOfferResponse>> {
        let query = query.normalized();
        let listing = Listing::JobOffers {
            status_requested: query.status.is_some(),
        };
        let scope = policy::listing_scope(actor, listing).unwrap_or(ListingScope::ActiveOnly);
        self.list_scoped(scope, query).await
    }

    /// `/my-job-offers`: a company's own offers in every status, or all
    /// offers for an admin.
    pub async fn list_mine(
        &self,
        actor: &Actor,
        query: JobOfferListQuery,
    ) -> Result<Page<JobOfferResponse>> {
        let Some(scope) = policy::listing_scope(Some(actor), Listing::MyJobOffers) else {
            tracing::debug!(actor_id = actor.id, "my-job-offers denied");
            return Err(Error::Forbidden(
                "Access reserved to companies and administrators".to_string(),
            ));
        };
        self.list_scoped(scope, query.normalized()).await
    }

    async fn list_scoped(
        &self,
        scope: ListingScope,
        query: JobOfferListQuery,
    ) -> Result<Page<JobOfferResponse>> {
        let page = page_number(query.page);

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM job_offers");
        push_offer_filters(&mut count_qb, scope, &query);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut items_qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM job_offers", OFFER_COLUMNS));
        push_offer_filters(&mut items_qb, scope, &query);
        items_qb
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(PER_PAGE)
            .push(" OFFSET ")
            .push_bind(page_offset(page));
        let offers = items_qb
            .build_query_as::<JobOffer>()
            .fetch_all(&self.pool)
            .await?;

        let items = self.hydrate(offers).await?;
        Ok(Page::new(items, total, page, PER_PAGE))
    }

    pub async fn count(&self, scope: ListingScope, status: Option<OfferStatus>) -> Result<i64> {
        let query = JobOfferListQuery {
            status: status.map(|s| s.as_str().to_string()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM job_offers");
        push_offer_filters(&mut qb, scope, &query);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    pub async fn recent(&self, scope: ListingScope, limit: i64) -> Result<Vec<JobOfferResponse>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM job_offers", OFFER_COLUMNS));
        push_offer_filters(&mut qb, scope, &JobOfferListQuery::default());
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(limit);
        let offers = qb.build_query_as::<JobOffer>().fetch_all(&self.pool).await?;
        self.hydrate(offers).await
    }

    pub async fn show(&self, actor: Option<&Actor>, id: i64) -> Result<JobOfferResponse> {
        let offer = self.get(id).await?;
        if !policy::can_view_job_offer(actor, &offer) {
            tracing::debug!(actor_id = ?actor.map(|a| a.id), offer_id = id, "job offer view denied");
            return Err(Error::Forbidden("This job offer is not available".to_string()));
        }
        let applications_count = self.count_applications(offer.id).await?;
        let mut response = self.hydrate_one(offer).await?;
        response.applications_count = Some(applications_count);
        Ok(response)
    }

    pub async fn create(
        &self,
        actor: &Actor,
        payload: CreateJobOfferPayload,
    ) -> Result<JobOfferResponse> {
        if !policy::can_create_job_offer(actor) {
            return Err(Error::Forbidden(
                "Only companies can create job offers".to_string(),
            ));
        }
        validate_with(&payload, |errors| {
            if let Some(err) = salary_range_error(payload.salary_min, payload.salary_max) {
                errors.add("salary_max", err);
            }
        })?;

        let contract_type = parse_contract_type(payload.contract_type.as_deref())?;
        let status = parse_offer_status(payload.status.as_deref())?.unwrap_or_default();

        let sql = format!(
            "INSERT INTO job_offers (
                title, description, requirements, salary_min, salary_max,
                location, contract_type, status, company_id
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            OFFER_COLUMNS
        );
        let offer = sqlx::query_as::<_, JobOffer>(&sql)
            .bind(&payload.title)
            .bind(&payload.description)
            .bind(&payload.requirements)
            .bind(payload.salary_min)
            .bind(payload.salary_max)
            .bind(&payload.location)
            .bind(contract_type)
            .bind(status)
            .bind(actor.id)
            .fetch_one(&self.pool)
            .await?;

        tracing::info!(actor_id = actor.id, offer_id = offer.id, "job offer created");
        self.hydrate_one(offer).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        payload: UpdateJobOfferPayload,
    ) -> Result<JobOfferResponse> {
        let offer = self.get(id).await?;
        if !policy::can_mutate_job_offer(actor, &offer) {
            tracing::debug!(actor_id = actor.id, offer_id = id, "job offer update denied");
            return Err(Error::Forbidden(
                "You are not allowed to modify this job offer".to_string(),
            ));
        }

        let company_id = if actor.is_admin() {
            payload.company_id
        } else {
            None
        };
        let target_company = match company_id {
            Some(company_id) => self.users.find(company_id).await?,
            None => None,
        };

        validate_with(&payload, |errors| {
            if let Some(Some(min)) = &payload.salary_min {
                if let Err(err) = non_negative(min) {
                    errors.add("salary_min", err);
                }
            }
            if let Some(Some(max)) = &payload.salary_max {
                if let Err(err) = non_negative(max) {
                    errors.add("salary_max", err);
                }
            }
            if let Some(Some(location)) = &payload.location {
                if let Err(err) = max_chars(location, 255) {
                    errors.add("location", err);
                }
            }
            if let Some(Some(raw)) = &payload.contract_type {
                if let Err(err) = validation::contract_type(raw) {
                    errors.add("contract_type", err);
                }
            }
            let min = payload.salary_min.unwrap_or(offer.salary_min);
            let max = payload.salary_max.unwrap_or(offer.salary_max);
            if let Some(err) = salary_range_error(min, max) {
                errors.add("salary_max", err);
            }
            if company_id.is_some() && target_company.as_ref().map(|u| u.role) != Some(Role::Company) {
                errors.add(
                    "company_id",
                    invalid("exists", "The selected company id is invalid."),
                );
            }
        })?;

        let contract_type = parse_contract_type(payload.contract_type.clone().flatten().as_deref())?;
        let status = parse_offer_status(payload.status.as_deref())?;

        // Nullable columns take a (present, value) pair so `null` can clear them.
        let sql = format!(
            "UPDATE job_offers SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                requirements = CASE WHEN $4 THEN $5 ELSE requirements END,
                salary_min = CASE WHEN $6 THEN $7 ELSE salary_min END,
                salary_max = CASE WHEN $8 THEN $9 ELSE salary_max END,
                location = CASE WHEN $10 THEN $11 ELSE location END,
                contract_type = CASE WHEN $12 THEN $13 ELSE contract_type END,
                status = COALESCE($14, status),
                company_id = COALESCE($15, company_id),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            OFFER_COLUMNS
        );
        let updated = sqlx::query_as::<_, JobOffer>(&sql)
            .bind(offer.id)
            .bind(&payload.title)
            .bind(&payload.description)
            .bind(payload.requirements.is_some())
            .bind(payload.requirements.clone().flatten())
            .bind(payload.salary_min.is_some())
            .bind(payload.salary_min.flatten())
            .bind(payload.salary_max.is_some())
            .bind(payload.salary_max.flatten())
            .bind(payload.location.is_some())
            .bind(payload.location.clone().flatten())
            .bind(payload.contract_type.is_some())
            .bind(contract_type)
            .bind(status)
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;

        tracing::info!(actor_id = actor.id, offer_id = id, status = %updated.status, "job offer updated");
        self.hydrate_one(updated).await
    }

    /// Applications on the offer are removed with it.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        let offer = self.get(id).await?;
        if !policy::can_mutate_job_offer(actor, &offer) {
            tracing::debug!(actor_id = actor.id, offer_id = id, "job offer delete denied");
            return Err(Error::Forbidden(
                "You are not allowed to delete this job offer".to_string(),
            ));
        }
        sqlx::query("DELETE FROM job_offers WHERE id = $1")
            .bind(offer.id)
            .execute(&self.pool)
            .await?;
        tracing::info!(actor_id = actor.id, offer_id = id, "job offer deleted");
        Ok(())
    }

    pub async fn count_applications(&self, offer_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM applications WHERE job_offer_id = $1",
        )
        .bind(offer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Attaches the owning company to each offer.
    pub async fn hydrate(&self, offers: Vec<JobOffer>) -> Result<Vec<JobOfferResponse>> {
        let mut company_ids: Vec<i64> = offers.iter().map(|o| o.company_id).collect();
        company_ids.sort_unstable();
        company_ids.dedup();
        let companies = self.users.find_many(&company_ids).await?;
        Ok(offers
            .into_iter()
            .map(|offer| {
                let company = companies.get(&offer.company_id).cloned().map(UserResponse::from);
                JobOfferResponse::from(offer).with_company(company)
            })
            .collect())
    }

    pub async fn hydrate_one(&self, offer: JobOffer) -> Result<JobOfferResponse> {
        let company = self.users.find(offer.company_id).await?.map(UserResponse::from);
        Ok(JobOfferResponse::from(offer).with_company(company))
    }
}

fn push_offer_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: ListingScope,
    query: &JobOfferListQuery,
) {
    qb.push(" WHERE TRUE");
    match scope {
        ListingScope::All => {}
        ListingScope::ActiveOnly => {
            qb.push(" AND status = ").push_bind(OfferStatus::Active);
        }
        ListingScope::ActiveOrCompany(company_id) => {
            qb.push(" AND (status = ")
                .push_bind(OfferStatus::Active)
                .push(" OR company_id = ")
                .push_bind(company_id)
                .push(")");
        }
        ListingScope::Company(company_id) => {
            qb.push(" AND company_id = ").push_bind(company_id);
        }
        // offers have no candidate owner
        ListingScope::Candidate(_) => {
            qb.push(" AND FALSE");
        }
    }
    if let Some(status) = &query.status {
        qb.push(" AND status = ").push_bind(status.clone());
    }
    if let Some(location) = &query.location {
        qb.push(" AND location ILIKE ")
            .push_bind(format!("%{}%", location));
    }
    if let Some(contract_type) = &query.contract_type {
        qb.push(" AND contract_type = ").push_bind(contract_type.clone());
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn parse_contract_type(raw: Option<&str>) -> Result<Option<ContractType>> {
    raw.map(|v| {
        v.parse::<ContractType>().map_err(|_| {
            Error::Validation(field_error(
                "contract_type",
                "in",
                "The selected contract type is invalid.",
            ))
        })
    })
    .transpose()
}

fn parse_offer_status(raw: Option<&str>) -> Result<Option<OfferStatus>> {
    raw.map(|v| {
        v.parse::<OfferStatus>().map_err(|_| {
            Error::Validation(field_error("status", "in", "The selected status is invalid."))
        })
    })
    .transpose()
}
