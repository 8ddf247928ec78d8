use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::dto::common::{page_number, page_offset, Page, PER_PAGE};
use crate::dto::user_dto::{CreateUserPayload, UpdateUserPayload, UserListQuery, UserResponse};
use crate::error::{Error, Result};
use crate::models::user::{Role, User};
use crate::policy::{self, Actor, Listing};
use crate::storage::{purge_blobs, BlobStore};
use crate::utils::crypto::hash_password;
use crate::utils::validation::{invalid, validate_with};

pub(crate) const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, phone, address, created_at, updated_at";

/// Fields for a new account; the password is still in clear text here.
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
    storage: Arc<dyn BlobStore>,
}

impl UserService {
    pub fn new(pool: PgPool, storage: Arc<dyn BlobStore>) -> Self {
        Self { pool, storage }
    }

    pub async fn find(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_many(&self, ids: &[i64]) -> Result<HashMap<i64, User>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    /// Inserts an account. A taken email surfaces as a 422 on `email` through
    /// the unique index.
    pub async fn insert(&self, new_user: NewUser) -> Result<User> {
        let password_hash = hash_in_background(new_user.password).await?;
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, role, phone, address)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.name)
            .bind(new_user.email.to_lowercase())
            .bind(&password_hash)
            .bind(new_user.role)
            .bind(&new_user.phone)
            .bind(&new_user.address)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list(&self, actor: &Actor, query: UserListQuery) -> Result<Page<UserResponse>> {
        if policy::listing_scope(Some(actor), Listing::Users).is_none() {
            tracing::debug!(actor_id = actor.id, "user listing denied");
            return Err(Error::Forbidden("Access reserved to administrators".to_string()));
        }
        let page = page_number(query.page);
        let role = query
            .role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from);
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count_qb, role.as_deref(), search.as_deref());
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut items_qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        push_user_filters(&mut items_qb, role.as_deref(), search.as_deref());
        items_qb
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(PER_PAGE)
            .push(" OFFSET ")
            .push_bind(page_offset(page));
        let items = items_qb.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(Page::new(items, total, page, PER_PAGE).map(UserResponse::from))
    }

    pub async fn show(&self, actor: &Actor, id: i64) -> Result<UserResponse> {
        let user = self.get(id).await?;
        if !policy::can_access_user(actor, user.id) {
            return Err(Error::Forbidden("You are not allowed to view this user".to_string()));
        }
        Ok(user.into())
    }

    pub async fn create(&self, actor: &Actor, payload: CreateUserPayload) -> Result<UserResponse> {
        if !policy::can_manage_users(actor) {
            return Err(Error::Forbidden("Access reserved to administrators".to_string()));
        }
        validate_with(&payload, |_| {})?;
        let role = payload
            .role
            .parse::<Role>()
            .map_err(|e| Error::Internal(e.to_string()))?;
        let user = self
            .insert(NewUser {
                name: payload.name,
                email: payload.email,
                password: payload.password,
                role,
                phone: payload.phone,
                address: payload.address,
            })
            .await?;
        tracing::info!(actor_id = actor.id, user_id = user.id, role = %user.role, "user created");
        Ok(user.into())
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        payload: UpdateUserPayload,
    ) -> Result<UserResponse> {
        let user = self.get(id).await?;
        if !policy::can_access_user(actor, user.id) {
            return Err(Error::Forbidden("You are not allowed to update this user".to_string()));
        }
        validate_with(&payload, |errors| {
            if let Some(requested) = payload.role.as_deref() {
                if requested != user.role.as_str() {
                    errors.add("role", invalid("immutable", "The role cannot be changed."));
                }
            }
        })?;

        let password_hash = match payload.password {
            Some(password) => Some(hash_in_background(password).await?),
            None => None,
        };
        let sql = format!(
            "UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&payload.name)
            .bind(payload.email.map(|e| e.to_lowercase()))
            .bind(&password_hash)
            .bind(&payload.phone)
            .bind(&payload.address)
            .fetch_one(&self.pool)
            .await?;
        Ok(updated.into())
    }

    /// Removes the account; offers, applications and CV rows go with it in
    /// storage, then the orphaned CV blobs are purged.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        let user = self.get(id).await?;
        if !policy::can_manage_users(actor) {
            return Err(Error::Forbidden("Access reserved to administrators".to_string()));
        }
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT storage_key FROM cv_files WHERE candidate_id = $1")
                .bind(user.id)
                .fetch_all(&self.pool)
                .await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        let purged = purge_blobs(self.storage.as_ref(), &keys).await;
        tracing::info!(actor_id = actor.id, user_id = user.id, purged, "user deleted");
        Ok(())
    }

    /// Creates the admin account if no user holds `email` yet. Returns true
    /// when a row was inserted.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool> {
        if let Some(existing) = self.find_by_email(&email.to_lowercase()).await? {
            if existing.role != Role::Admin {
                tracing::warn!(email, role = %existing.role, "bootstrap admin email belongs to a non-admin account");
            }
            return Ok(false);
        }
        self.insert(NewUser {
            name: "Administrator".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Admin,
            phone: None,
            address: None,
        })
        .await?;
        Ok(true)
    }

    pub async fn count_by_role(&self) -> Result<HashMap<Role, i64>> {
        let rows: Vec<(Role, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }
}

/// Runs Argon2 on the blocking pool.
pub(crate) async fn hash_in_background(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| Error::Internal(format!("password hashing failed: {}", e)))
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, role: Option<&str>, search: Option<&str>) {
    qb.push(" WHERE TRUE");
    if let Some(role) = role {
        qb.push(" AND role = ").push_bind(role.to_string());
    }
    if let Some(search) = search {
        qb.push(" AND (name ILIKE ")
            .push_bind(search.to_string())
            .push(" OR email ILIKE ")
            .push_bind(search.to_string())
            .push(")");
    }
}
