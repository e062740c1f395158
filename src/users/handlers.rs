use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::dto::{MessageResponse, PublicUser};
use crate::auth::extractors::{AdminUser, CreatorUser};
use crate::auth::handlers::{is_valid_email, validate_new_password};
use crate::auth::password::hash_password;
use crate::auth::tokens::generate_activation_link;
use crate::error::AppError;
use crate::state::AppState;
use crate::users::model::{NewUser, Role};
use crate::users::repo::CredentialStore;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/admins", post(create_admin))
        .route("/users/:id", get(get_user).delete(delete_user))
}

/// Admin creation body; unlike signup it may carry the creator flag.
#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub is_creator: bool,
}

#[instrument(skip(state, _caller, payload))]
async fn create_admin(
    State(state): State<AppState>,
    _caller: CreatorUser,
    Json(payload): Json<CreateAdminRequest>,
) -> Result<Json<PublicUser>, AppError> {
    if !is_valid_email(&payload.email) {
        return Err(AppError::InvalidArgument("invalid email".into()));
    }
    validate_new_password(&payload.password)?;
    if payload.password != payload.confirm_password {
        return Err(AppError::InvalidArgument("passwords do not match".into()));
    }
    if state
        .store
        .find_by_email(&payload.email)
        .await
        .map_err(AppError::store)?
        .is_some()
    {
        return Err(AppError::Conflict("admin already exists".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    // admins are created active, no mail confirmation round-trip
    let admin = state
        .store
        .create(NewUser {
            email: payload.email,
            full_name: payload.full_name,
            password_hash,
            role: Role::Admin,
            is_creator: payload.is_creator,
            is_active: true,
            activation_link: generate_activation_link(),
        })
        .await
        .map_err(AppError::store)?;

    info!(admin_id = %admin.id, is_creator = admin.is_creator, "admin created");
    Ok(Json(PublicUser::from(&admin)))
}

#[instrument(skip(state, _caller))]
async fn list_users(
    State(state): State<AppState>,
    _caller: AdminUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = state.store.list().await.map_err(AppError::store)?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, _caller))]
async fn get_user(
    State(state): State<AppState>,
    _caller: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .store
        .find_by_id(id)
        .await
        .map_err(AppError::store)?
        .ok_or_else(|| AppError::NotFound(format!("user with id {id} not found")))?;
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip(state, _caller))]
async fn delete_user(
    State(state): State<AppState>,
    _caller: CreatorUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let deleted = state.store.delete(id).await.map_err(AppError::store)?;
    if !deleted {
        return Err(AppError::NotFound(format!("user with id {id} not found")));
    }
    info!(user_id = %id, "user deleted");
    Ok(Json(MessageResponse::new("user deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::auth::jwt::Claims;
    use crate::config::AppConfig;
    use crate::mail::testing::RecordingNotifier;
    use crate::users::repo::testing::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        state: AppState,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::from_parts(Arc::new(AppConfig::fake()), store.clone(), notifier);
        Fixture { store, state }
    }

    fn creator_claims() -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            email: "root@x.com".into(),
            is_active: true,
            is_creator: true,
            role: Role::Admin,
            iat: 0,
            exp: usize::MAX,
        }
    }

    fn admin_claims() -> Claims {
        Claims {
            is_creator: false,
            ..creator_claims()
        }
    }

    fn admin_request(email: &str, is_creator: bool) -> CreateAdminRequest {
        CreateAdminRequest {
            email: email.into(),
            full_name: "Second Admin".into(),
            password: "Adm1n-pass!".into(),
            confirm_password: "Adm1n-pass!".into(),
            is_creator,
        }
    }

    #[tokio::test]
    async fn create_admin_creates_an_active_admin_with_creator_flag() {
        let fx = fixture();
        let Json(created) = create_admin(
            State(fx.state.clone()),
            CreatorUser(creator_claims()),
            Json(admin_request("adm@x.com", true)),
        )
        .await
        .unwrap();
        assert_eq!(created.role, Role::Admin);

        // no mail confirmation round-trip for admins
        let record = fx.store.find_by_email("adm@x.com").await.unwrap().unwrap();
        assert!(record.is_active);
        assert!(record.is_creator);
        assert_eq!(record.role, Role::Admin);
    }

    #[tokio::test]
    async fn create_admin_with_existing_email_conflicts() {
        let fx = fixture();
        create_admin(
            State(fx.state.clone()),
            CreatorUser(creator_claims()),
            Json(admin_request("adm@x.com", false)),
        )
        .await
        .unwrap();

        let err = create_admin(
            State(fx.state.clone()),
            CreatorUser(creator_claims()),
            Json(admin_request("adm@x.com", false)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn create_admin_with_mismatched_passwords_is_rejected() {
        let fx = fixture();
        let mut req = admin_request("adm@x.com", false);
        req.confirm_password = "different-pass".into();
        let err = create_admin(
            State(fx.state.clone()),
            CreatorUser(creator_claims()),
            Json(req),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert!(fx.store.find_by_email("adm@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_and_get_return_created_accounts() {
        let fx = fixture();
        let Json(created) = create_admin(
            State(fx.state.clone()),
            CreatorUser(creator_claims()),
            Json(admin_request("adm@x.com", false)),
        )
        .await
        .unwrap();

        let Json(users) = list_users(State(fx.state.clone()), AdminUser(admin_claims()))
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "adm@x.com");

        let Json(fetched) = get_user(
            State(fx.state.clone()),
            AdminUser(admin_claims()),
            Path(created.id),
        )
        .await
        .unwrap();
        assert_eq!(fetched.id, created.id);
    }

    #[tokio::test]
    async fn delete_user_removes_the_record_and_rejects_unknown_ids() {
        let fx = fixture();
        let Json(created) = create_admin(
            State(fx.state.clone()),
            CreatorUser(creator_claims()),
            Json(admin_request("adm@x.com", false)),
        )
        .await
        .unwrap();

        delete_user(
            State(fx.state.clone()),
            CreatorUser(creator_claims()),
            Path(created.id),
        )
        .await
        .unwrap();
        assert!(fx.store.find_by_email("adm@x.com").await.unwrap().is_none());

        let err = delete_user(
            State(fx.state.clone()),
            CreatorUser(creator_claims()),
            Path(created.id),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
