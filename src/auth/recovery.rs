use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::auth::dto::MessageResponse;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::generate_reset_code;
use crate::error::AppError;
use crate::mail::NotificationSender;
use crate::state::AppState;
use crate::users::model::UserPatch;
use crate::users::repo::CredentialStore;

/// Two independent password flows: an authenticated in-session change and
/// the unauthenticated forgot/confirm recovery via a one-time mailed code.
pub struct PasswordRecoveryManager {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn NotificationSender>,
}

impl PasswordRecoveryManager {
    pub fn new(store: Arc<dyn CredentialStore>, notifier: Arc<dyn NotificationSender>) -> Self {
        Self { store, notifier }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.notifier.clone())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<MessageResponse, AppError> {
        if old_password == new_password {
            return Err(AppError::InvalidArgument(
                "new password must differ from the old password".into(),
            ));
        }
        if new_password != confirm_password {
            return Err(AppError::InvalidArgument("new passwords do not match".into()));
        }

        let user = self
            .store
            .find_by_id(user_id)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::NotFound("user not found".into()))?;

        if !verify_password(old_password, &user.password_hash)? {
            return Err(AppError::InvalidArgument("old password is incorrect".into()));
        }

        let password_hash = hash_password(new_password)?;
        self.store
            .update(
                user.id,
                UserPatch {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await
            .map_err(AppError::store)?;

        info!(user_id = %user.id, "password changed");
        Ok(MessageResponse::new("password updated successfully"))
    }

    /// Persists a one-time code on the record and mails it. The code has no
    /// expiry or attempt cap; it dies only by being used.
    pub async fn request_reset(&self, email: &str) -> Result<MessageResponse, AppError> {
        let user = self
            .store
            .find_by_email(email)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::NotFound("user with this email not found".into()))?;

        let code = generate_reset_code();
        self.store
            .update(
                user.id,
                UserPatch {
                    password_reset_code: Some(code.clone()),
                    ..Default::default()
                },
            )
            .await
            .map_err(AppError::store)?;

        if let Err(e) = self.notifier.send_password_reset(&user.email, &code).await {
            tracing::warn!(error = %e, user_id = %user.id, "reset mail failed");
            return Err(AppError::Unavailable("could not send reset email".into()));
        }

        info!(user_id = %user.id, "password reset requested");
        Ok(MessageResponse::new("reset code sent to your email"))
    }

    /// Consumes a mailed code. A successful confirm clears it, so replaying
    /// the same code afterwards fails `NotFound`.
    pub async fn confirm_reset(
        &self,
        code: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<MessageResponse, AppError> {
        let user = self
            .store
            .find_by_reset_code(code)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::NotFound("user not found".into()))?;

        if new_password != confirm_password {
            return Err(AppError::InvalidArgument("passwords do not match".into()));
        }
        if verify_password(new_password, &user.password_hash)? {
            return Err(AppError::InvalidArgument(
                "new password must differ from the old one".into(),
            ));
        }

        let password_hash = hash_password(new_password)?;
        self.store
            .update(
                user.id,
                UserPatch {
                    password_hash: Some(password_hash),
                    clear_reset_code: true,
                    ..Default::default()
                },
            )
            .await
            .map_err(AppError::store)?;

        info!(user_id = %user.id, "password reset confirmed");
        Ok(MessageResponse::new("password reset successfully"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::tests::{active_user, fixture, Fixture};
    use crate::mail::testing::SentMessage;

    fn recovery(fx: &Fixture) -> PasswordRecoveryManager {
        PasswordRecoveryManager::new(fx.store.clone(), fx.notifier.clone())
    }

    #[tokio::test]
    async fn change_password_rejects_new_equal_to_old_even_when_correct() {
        let fx = fixture();
        let id = active_user(&fx, "a@x.com").await;
        let err = recovery(&fx)
            .change_password(id, "Secret1!", "Secret1!", "Secret1!")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn change_password_rejects_wrong_old_password() {
        let fx = fixture();
        let id = active_user(&fx, "a@x.com").await;
        let err = recovery(&fx)
            .change_password(id, "wrong-old", "Brand-new1", "Brand-new1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn change_password_rejects_mismatched_confirmation() {
        let fx = fixture();
        let id = active_user(&fx, "a@x.com").await;
        let err = recovery(&fx)
            .change_password(id, "Secret1!", "Brand-new1", "Brand-new2")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn change_password_updates_the_stored_hash() {
        let fx = fixture();
        let id = active_user(&fx, "a@x.com").await;
        recovery(&fx)
            .change_password(id, "Secret1!", "Brand-new1", "Brand-new1")
            .await
            .unwrap();

        assert!(fx.sessions.signin("a@x.com", "Secret1!").await.is_err());
        assert!(fx.sessions.signin("a@x.com", "Brand-new1").await.is_ok());
    }

    #[tokio::test]
    async fn change_password_for_vanished_user_is_not_found() {
        let fx = fixture();
        let err = recovery(&fx)
            .change_password(Uuid::new_v4(), "old", "new-password", "new-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn request_reset_for_unknown_email_is_not_found() {
        let fx = fixture();
        let err = recovery(&fx).request_reset("nobody@x.com").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn request_reset_persists_and_mails_an_eight_digit_code() {
        let fx = fixture();
        let id = active_user(&fx, "a@x.com").await;
        recovery(&fx).request_reset("a@x.com").await.unwrap();

        let stored = fx.store.get(id).unwrap().password_reset_code.unwrap();
        assert_eq!(stored.len(), 8);
        assert!(stored.chars().all(|c| c.is_ascii_digit()));

        let mailed = fx
            .notifier
            .sent_messages()
            .into_iter()
            .find_map(|m| match m {
                SentMessage::PasswordReset { email, code } if email == "a@x.com" => Some(code),
                _ => None,
            })
            .expect("reset mail sent");
        assert_eq!(mailed, stored);
    }

    #[tokio::test]
    async fn confirm_reset_with_current_password_is_rejected() {
        let fx = fixture();
        let id = active_user(&fx, "a@x.com").await;
        recovery(&fx).request_reset("a@x.com").await.unwrap();
        let code = fx.store.get(id).unwrap().password_reset_code.unwrap();

        let err = recovery(&fx)
            .confirm_reset(&code, "Secret1!", "Secret1!")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn confirm_reset_succeeds_once_and_clears_the_code() {
        let fx = fixture();
        let id = active_user(&fx, "a@x.com").await;
        recovery(&fx).request_reset("a@x.com").await.unwrap();
        let code = fx.store.get(id).unwrap().password_reset_code.unwrap();

        recovery(&fx)
            .confirm_reset(&code, "Brand-new1", "Brand-new1")
            .await
            .unwrap();
        assert!(fx.store.get(id).unwrap().password_reset_code.is_none());
        assert!(fx.sessions.signin("a@x.com", "Brand-new1").await.is_ok());

        // the code is single-use
        let err = recovery(&fx)
            .confirm_reset(&code, "Another-pw1", "Another-pw1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn confirm_reset_rejects_mismatched_passwords() {
        let fx = fixture();
        let id = active_user(&fx, "a@x.com").await;
        recovery(&fx).request_reset("a@x.com").await.unwrap();
        let code = fx.store.get(id).unwrap().password_reset_code.unwrap();

        let err = recovery(&fx)
            .confirm_reset(&code, "Brand-new1", "Brand-new2")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}
