use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account role. `is_creator` on the record is orthogonal: a creator is an
/// admin additionally allowed to create other admins, not a third role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Canonical credential record, owned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_creator: bool,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub activation_link: String,
    /// SHA-256 hex of the latest refresh token, empty when no live session.
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,
    #[serde(skip_serializing)]
    pub password_reset_code: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_creator: bool,
    pub is_active: bool,
    pub activation_link: String,
}

/// Partial update; `None` fields are left untouched. The reset code needs a
/// dedicated clear flag because `None` already means "keep".
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
    pub refresh_token_hash: Option<String>,
    pub password_reset_code: Option<String>,
    pub clear_reset_code: bool,
}
