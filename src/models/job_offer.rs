use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;

use super::{text_enum, EnumParseError};

/// Offer lifecycle. Every status is reachable from every other one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    #[default]
    Active,
    Inactive,
    Closed,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 3] = [OfferStatus::Active, OfferStatus::Inactive, OfferStatus::Closed];

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Active => "active",
            OfferStatus::Inactive => "inactive",
            OfferStatus::Closed => "closed",
        }
    }
}

impl FromStr for OfferStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OfferStatus::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| EnumParseError {
                kind: "offer status",
                value: s.to_string(),
            })
    }
}

text_enum!(OfferStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ContractType {
    Permanent,
    FixedTerm,
    Internship,
    Freelance,
    PartTime,
}

impl ContractType {
    pub const ALL: [ContractType; 5] = [
        ContractType::Permanent,
        ContractType::FixedTerm,
        ContractType::Internship,
        ContractType::Freelance,
        ContractType::PartTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Permanent => "permanent",
            ContractType::FixedTerm => "fixed-term",
            ContractType::Internship => "internship",
            ContractType::Freelance => "freelance",
            ContractType::PartTime => "part-time",
        }
    }
}

impl FromStr for ContractType {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractType::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| EnumParseError {
                kind: "contract type",
                value: s.to_string(),
            })
    }
}

text_enum!(ContractType);

#[derive(Debug, Clone, FromRow)]
pub struct JobOffer {
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
}
