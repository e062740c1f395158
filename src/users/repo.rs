use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::model::{NewUser, UserPatch, UserRecord};

/// Credential persistence seam consumed by the auth managers. Every method
/// fails only on transport/storage trouble; absence is `Ok(None)`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>>;
    async fn find_by_activation_link(&self, link: &str) -> anyhow::Result<Option<UserRecord>>;
    async fn find_by_reset_code(&self, code: &str) -> anyhow::Result<Option<UserRecord>>;
    async fn create(&self, new_user: NewUser) -> anyhow::Result<UserRecord>;
    async fn update(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<Option<UserRecord>>;
    async fn list(&self) -> anyhow::Result<Vec<UserRecord>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const SELECT_COLUMNS: &str = "id, email, full_name, password_hash, role, is_creator, \
     is_active, activation_link, refresh_token_hash, password_reset_code, created_at";

pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_by_column(&self, column: &str, value: &str) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        self.find_by_column("email", email).await
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_activation_link(&self, link: &str) -> anyhow::Result<Option<UserRecord>> {
        self.find_by_column("activation_link", link).await
    }

    async fn find_by_reset_code(&self, code: &str) -> anyhow::Result<Option<UserRecord>> {
        self.find_by_column("password_reset_code", code).await
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<UserRecord> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (email, full_name, password_hash, role, is_creator, is_active, activation_link)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .bind(new_user.is_creator)
        .bind(new_user.is_active)
        .bind(&new_user.activation_link)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                password_hash = COALESCE($4, password_hash),
                is_active = COALESCE($5, is_active),
                refresh_token_hash = COALESCE($6, refresh_token_hash),
                password_reset_code = CASE
                    WHEN $8 THEN NULL
                    ELSE COALESCE($7, password_reset_code)
                END
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.email)
        .bind(patch.full_name)
        .bind(patch.password_hash)
        .bind(patch.is_active)
        .bind(patch.refresh_token_hash)
        .bind(patch.password_reset_code)
        .bind(patch.clear_reset_code)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> anyhow::Result<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
