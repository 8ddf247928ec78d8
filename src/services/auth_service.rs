use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::auth_dto::{LoginPayload, RegisterPayload};
use crate::error::{Error, Result};
use crate::models::access_token::AccessToken;
use crate::models::user::{Role, User};
use crate::services::user_service::{NewUser, UserService};
use crate::utils::crypto::{verify_password, TokenSigner};
use crate::utils::validation::validate;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_TOKEN: &str = "Unauthenticated";

/// The user behind a verified bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token_id: Uuid,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    signer: TokenSigner,
    users: UserService,
}

impl AuthService {
    pub fn new(pool: PgPool, signer: TokenSigner, users: UserService) -> Self {
        Self {
            pool,
            signer,
            users,
        }
    }

    pub async fn register(&self, payload: RegisterPayload) -> Result<(User, String)> {
        validate(&payload)?;
        let role = payload
            .role
            .parse::<Role>()
            .map_err(|e| Error::Internal(e.to_string()))?;
        let user = self
            .users
            .insert(NewUser {
                name: payload.name,
                email: payload.email,
                password: payload.password,
                role,
                phone: payload.phone,
                address: payload.address,
            })
            .await?;
        let token = self.issue_token(&user).await?;
        tracing::info!(user_id = user.id, role = %user.role, "user registered");
        Ok((user, token))
    }

    /// Verifies the password and replaces every earlier token of the user
    /// with a fresh one.
    pub async fn login(&self, payload: LoginPayload) -> Result<(User, String)> {
        validate(&payload)?;
        let Some(user) = self.users.find_by_email(&payload.email.to_lowercase()).await? else {
            tracing::debug!("login with unknown email");
            return Err(Error::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        let hash = user.password_hash.clone();
        let password = payload.password;
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| Error::Internal(format!("password check task failed: {}", e)))?
            .unwrap_or(false);
        if !matches {
            tracing::debug!(user_id = user.id, "login with wrong password");
            return Err(Error::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        sqlx::query("DELETE FROM access_tokens WHERE user_id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        let token = self.issue_token(&user).await?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok((user, token))
    }

    pub async fn logout(&self, current: &CurrentUser) -> Result<()> {
        sqlx::query("DELETE FROM access_tokens WHERE id = $1")
            .bind(current.token_id)
            .execute(&self.pool)
            .await?;
        tracing::info!(user_id = current.user.id, "user logged out");
        Ok(())
    }

    /// Resolves a raw bearer token. Every failure is a 401.
    pub async fn resolve(&self, token: &str) -> Result<CurrentUser> {
        let claims = self.signer.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            Error::Unauthorized(INVALID_TOKEN.to_string())
        })?;

        let row = sqlx::query_as::<_, AccessToken>(
            "UPDATE access_tokens SET last_used_at = NOW()
             WHERE id = $1 AND user_id = $2 AND expires_at > NOW()
             RETURNING id, user_id, expires_at, last_used_at, created_at",
        )
        .bind(claims.jti)
        .bind(claims.sub)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Unauthorized(INVALID_TOKEN.to_string()))?;

        let user = self
            .users
            .find(row.user_id)
            .await?
            .ok_or_else(|| Error::Unauthorized(INVALID_TOKEN.to_string()))?;

        Ok(CurrentUser {
            user,
            token_id: row.id,
        })
    }

    async fn issue_token(&self, user: &User) -> Result<String> {
        let signed = self
            .signer
            .sign(user.id, user.role)
            .map_err(|e| Error::Internal(format!("token signing failed: {}", e)))?;
        sqlx::query("INSERT INTO access_tokens (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(signed.claims.jti)
            .bind(user.id)
            .bind(signed.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(signed.token)
    }

    /// Drops tokens past their expiry. Called at startup.
    pub async fn prune_expired_tokens(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
