use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::user_dto::UserResponse;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterPayload {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(
        length(min = 8),
        must_match(other = "password_confirmation", message = "The password confirmation does not match.")
    )]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
    #[validate(custom(function = "crate::utils::validation::registrable_role"))]
    pub role: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserResponse,
}
