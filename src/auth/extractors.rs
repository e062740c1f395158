use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::jwt::{Claims, JwtKeys};
use crate::error::AppError;
use crate::state::AppState;
use crate::users::model::Role;

/// Extracts and verifies the bearer access token, attaching the identity
/// claims to the handler.
#[derive(Debug)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing Authorization header".into()))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("invalid auth scheme".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(token).map_err(|_| {
            warn!("invalid or expired access token");
            AppError::Unauthorized("invalid or expired token".into())
        })?;

        Ok(AuthUser(claims))
    }
}

/// Role gate stacked on top of authentication.
#[derive(Debug)]
pub struct AdminUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Admin {
            return Err(AppError::Forbidden("admin role required".into()));
        }
        Ok(AdminUser(claims))
    }
}

/// Creator gate; orthogonal to the role gate, not a stronger admin.
#[derive(Debug)]
pub struct CreatorUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for CreatorUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.is_creator {
            return Err(AppError::Forbidden("only creator admins are allowed".into()));
        }
        Ok(CreatorUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::users::model::UserRecord;

    fn user_with(role: Role, is_creator: bool) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "ann@example.com".into(),
            full_name: "Ann".into(),
            password_hash: "irrelevant".into(),
            role,
            is_creator,
            is_active: true,
            activation_link: Uuid::new_v4().to_string(),
            refresh_token_hash: String::new(),
            password_reset_code: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn parts_with_bearer(token: &str) -> Parts {
        let req = Request::builder()
            .header(axum::http::header::AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap();
        req.into_parts().0
    }

    async fn extract<T>(parts: &mut Parts, state: &AppState) -> Result<T, AppError>
    where
        T: FromRequestParts<AppState, Rejection = AppError>,
    {
        T::from_request_parts(parts, state).await
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let state = AppState::fake();
        let mut parts = Request::builder().body(()).unwrap().into_parts().0;
        let err = extract::<AuthUser>(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refresh_token_does_not_authorize_requests() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let pair = keys.issue_pair(&user_with(Role::User, false)).unwrap();
        let mut parts = parts_with_bearer(&pair.refresh_token);
        let err = extract::<AuthUser>(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn access_token_attaches_claims() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user = user_with(Role::User, false);
        let pair = keys.issue_pair(&user).unwrap();
        let mut parts = parts_with_bearer(&pair.access_token);
        let AuthUser(claims) = extract::<AuthUser>(&mut parts, &state).await.unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
    }

    #[tokio::test]
    async fn admin_gate_rejects_plain_users() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let pair = keys.issue_pair(&user_with(Role::User, false)).unwrap();
        let mut parts = parts_with_bearer(&pair.access_token);
        let err = extract::<AdminUser>(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn creator_gate_rejects_non_creator_admins() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let pair = keys.issue_pair(&user_with(Role::Admin, false)).unwrap();

        // an ordinary admin passes the role gate but not the creator gate
        let mut parts = parts_with_bearer(&pair.access_token);
        assert!(extract::<AdminUser>(&mut parts, &state).await.is_ok());
        let mut parts = parts_with_bearer(&pair.access_token);
        let err = extract::<CreatorUser>(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn creator_gate_admits_creator_admins() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let pair = keys.issue_pair(&user_with(Role::Admin, true)).unwrap();
        let mut parts = parts_with_bearer(&pair.access_token);
        assert!(extract::<CreatorUser>(&mut parts, &state).await.is_ok());
    }
}
