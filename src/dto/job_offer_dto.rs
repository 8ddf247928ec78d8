use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::common::nullable;
use crate::dto::user_dto::UserResponse;
use crate::models::job_offer::{ContractType, JobOffer, OfferStatus};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateJobOfferPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub requirements: Option<String>,
    #[validate(custom(function = "crate::utils::validation::non_negative"))]
    pub salary_min: Option<Decimal>,
    #[validate(custom(function = "crate::utils::validation::non_negative"))]
    pub salary_max: Option<Decimal>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(custom(function = "crate::utils::validation::contract_type"))]
    pub contract_type: Option<String>,
    #[validate(custom(function = "crate::utils::validation::offer_status"))]
    pub status: Option<String>,
}

/// Partial update: an absent field keeps its stored value, an explicit
/// `null` clears a nullable column. Checks on the nullable fields run in the
/// service because they see through both `Option` layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateJobOfferPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub requirements: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub salary_min: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub salary_max: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub contract_type: Option<Option<String>>,
    #[validate(custom(function = "crate::utils::validation::offer_status"))]
    pub status: Option<String>,
    /// Honoured for admins only.
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobOfferResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    pub location: Option<String>,
    pub contract_type: Option<ContractType>,
    pub status: OfferStatus,
    pub company_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications_count: Option<i64>,
}

impl From<JobOffer> for JobOfferResponse {
    fn from(value: JobOffer) -> Self {
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
            requirements: value.requirements,
            salary_min: value.salary_min,
            salary_max: value.salary_max,
            location: value.location,
            contract_type: value.contract_type,
            status: value.status,
            company_id: value.company_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
            company: None,
            applications_count: None,
        }
    }
}

impl JobOfferResponse {
    pub fn with_company(mut self, company: Option<UserResponse>) -> Self {
        self.company = company;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JobOfferListQuery {
    pub page: Option<i64>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub contract_type: Option<String>,
    pub search: Option<String>,
}

impl JobOfferListQuery {
    /// Blank query-string values count as absent.
    pub fn normalized(self) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            page: self.page,
            status: clean(self.status),
            location: clean(self.location),
            contract_type: clean(self.contract_type),
            search: clean(self.search),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_salary_and_unknown_enums_fail() {
        let payload = CreateJobOfferPayload {
            title: "Backend developer".into(),
            description: "Rust services".into(),
            requirements: None,
            salary_min: Some(Decimal::from(-5)),
            salary_max: None,
            location: Some("Lyon".into()),
            contract_type: Some("gig".into()),
            status: Some("draft".into()),
        };
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("salary_min"));
        assert!(fields.contains_key("contract_type"));
        assert!(fields.contains_key("status"));
    }

    #[test]
    fn update_tells_null_from_absent() {
        let payload: UpdateJobOfferPayload = serde_json::from_value(serde_json::json!({
            "salary_min": null,
            "location": "Nantes",
        }))
        .unwrap();
        assert_eq!(payload.salary_min, Some(None));
        assert_eq!(payload.location, Some(Some("Nantes".to_string())));
        assert_eq!(payload.salary_max, None);
        assert_eq!(payload.requirements, None);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let query = JobOfferListQuery {
            page: Some(2),
            status: Some("  ".into()),
            location: Some(" Paris ".into()),
            contract_type: None,
            search: Some(String::new()),
        }
        .normalized();
        assert_eq!(query.status, None);
        assert_eq!(query.location.as_deref(), Some("Paris"));
        assert_eq!(query.search, None);
    }
}
