use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::dto::{
    AuthResponse, MessageResponse, ProfileResponse, PublicUser, SignupRequest,
    UpdateProfileRequest,
};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{generate_activation_link, refresh_fingerprint};
use crate::error::AppError;
use crate::mail::NotificationSender;
use crate::state::AppState;
use crate::users::model::{NewUser, Role, UserPatch, UserRecord};
use crate::users::repo::CredentialStore;

/// Owns the signup/signin/refresh/logout lifecycle and the stored
/// refresh-token fingerprint. Stateless between calls; everything durable
/// lives in the credential store.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn NotificationSender>,
    keys: JwtKeys,
    api_url: String,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn NotificationSender>,
        keys: JwtKeys,
        api_url: String,
    ) -> Self {
        Self {
            store,
            notifier,
            keys,
            api_url,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            state.notifier.clone(),
            JwtKeys::from_ref(state),
            state.config.api_url.clone(),
        )
    }

    /// Creates an unverified account and mails the activation link.
    /// Delivery failure surfaces as `Unavailable` but leaves the record in
    /// place; activation can be retried out-of-band.
    pub async fn signup(&self, req: SignupRequest) -> Result<MessageResponse, AppError> {
        if req.password != req.confirm_password {
            return Err(AppError::InvalidArgument("passwords do not match".into()));
        }
        if self
            .store
            .find_by_email(&req.email)
            .await
            .map_err(AppError::store)?
            .is_some()
        {
            return Err(AppError::Conflict("user already exists".into()));
        }

        let password_hash = hash_password(&req.password)?;
        let user = self
            .store
            .create(NewUser {
                email: req.email,
                full_name: req.full_name,
                password_hash,
                role: Role::User,
                is_creator: false,
                is_active: false,
                activation_link: generate_activation_link(),
            })
            .await
            .map_err(AppError::store)?;

        let url = format!(
            "{}/api/v1/auth/activate/{}",
            self.api_url, user.activation_link
        );
        if let Err(e) = self
            .notifier
            .send_activation(&user.email, &user.full_name, &url)
            .await
        {
            // The account stays; signup is deliberately not transactional
            // with mail delivery.
            warn!(error = %e, user_id = %user.id, "activation mail failed, account left unconfirmed");
            return Err(AppError::Unavailable(
                "could not send activation email".into(),
            ));
        }

        info!(user_id = %user.id, "user signed up");
        Ok(MessageResponse::new(
            "registered successfully, please confirm your account",
        ))
    }

    pub async fn signin(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = self
            .store
            .find_by_email(email)
            .await
            .map_err(AppError::store)?
            .ok_or_else(AppError::invalid_credentials)?;

        if !user.is_active {
            return Err(AppError::invalid_credentials());
        }
        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::invalid_credentials());
        }

        let response = self.rotate(&user).await?;
        info!(user_id = %user.id, "user signed in");
        Ok(response)
    }

    /// Exchanges a live refresh token for a fresh pair. A token from a
    /// superseded rotation no longer matches the stored fingerprint and is
    /// rejected as a replay.
    pub async fn refresh(&self, presented: &str) -> Result<AuthResponse, AppError> {
        let claims = self
            .keys
            .verify_refresh(presented)
            .map_err(|_| AppError::Unauthorized("invalid or expired refresh token".into()))?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::Unauthorized("not signed in".into()))?;

        if user.refresh_token_hash.is_empty() {
            return Err(AppError::Unauthorized("not signed in".into()));
        }
        if user.refresh_token_hash != refresh_fingerprint(presented) {
            warn!(user_id = %user.id, "stale refresh token presented");
            return Err(AppError::Unauthorized("refresh token does not match".into()));
        }

        self.rotate(&user).await
    }

    /// Clears the stored fingerprint unconditionally; logging out twice with
    /// an already-invalidated token is tolerated. A token that fails
    /// verification outright is a malformed request, not a forbidden one.
    pub async fn logout(&self, presented: &str) -> Result<MessageResponse, AppError> {
        let claims = self
            .keys
            .verify_refresh(presented)
            .map_err(|e| AppError::InvalidArgument(e.to_string()))?;

        self.store
            .update(
                claims.sub,
                UserPatch {
                    refresh_token_hash: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .map_err(AppError::store)?;

        info!(user_id = %claims.sub, "user logged out");
        Ok(MessageResponse::new("logged out"))
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<ProfileResponse, AppError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::NotFound("user not found".into()))?;
        Ok(ProfileResponse {
            full_name: user.full_name,
            email: user.email,
        })
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<ProfileResponse, AppError> {
        // one record per email; taking over another account's address is a
        // caller error, not a storage fault
        if let Some(email) = req.email.as_deref() {
            if let Some(existing) = self
                .store
                .find_by_email(email)
                .await
                .map_err(AppError::store)?
            {
                if existing.id != user_id {
                    return Err(AppError::Conflict("email already in use".into()));
                }
            }
        }
        let updated = self
            .store
            .update(
                user_id,
                UserPatch {
                    full_name: req.full_name,
                    email: req.email,
                    ..Default::default()
                },
            )
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::NotFound("user not found".into()))?;
        Ok(ProfileResponse {
            full_name: updated.full_name,
            email: updated.email,
        })
    }

    /// Issues a new pair and overwrites the stored fingerprint. Last write
    /// wins: concurrent rotations for one user are not serialized, the
    /// loser's freshly issued refresh token is dead on arrival.
    async fn rotate(&self, user: &UserRecord) -> Result<AuthResponse, AppError> {
        let pair = self.keys.issue_pair(user)?;
        self.store
            .update(
                user.id,
                UserPatch {
                    refresh_token_hash: Some(refresh_fingerprint(&pair.refresh_token)),
                    ..Default::default()
                },
            )
            .await
            .map_err(AppError::store)?;
        Ok(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: PublicUser::from(user),
        })
    }
}
