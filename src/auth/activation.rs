use std::sync::Arc;

use tracing::info;

use crate::auth::dto::MessageResponse;
use crate::error::AppError;
use crate::state::AppState;
use crate::users::model::UserPatch;
use crate::users::repo::CredentialStore;

/// Consumes activation links. Never issues tokens; the user still has to
/// sign in afterwards.
pub struct ActivationManager {
    store: Arc<dyn CredentialStore>,
}

impl ActivationManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.store.clone())
    }

    /// Repeated clicks on the same link are safe: an already-active account
    /// reports success without further mutation.
    pub async fn activate(&self, link: &str) -> Result<MessageResponse, AppError> {
        let user = self
            .store
            .find_by_activation_link(link)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::Unauthorized("activation link is invalid".into()))?;

        if user.is_active {
            return Ok(MessageResponse::new("account is already activated"));
        }

        self.store
            .update(
                user.id,
                UserPatch {
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(AppError::store)?;

        info!(user_id = %user.id, "account activated");
        Ok(MessageResponse::new("your account has been activated"))
    }
}
