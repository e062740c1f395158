use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::instrument;

use crate::auth::activation::ActivationManager;
use crate::auth::dto::{
    AuthResponse, ChangePasswordRequest, ConfirmResetRequest, ForgotPasswordRequest,
    MessageResponse, ProfileResponse, RefreshRequest, SigninRequest, SignupRequest,
    UpdateProfileRequest,
};
use crate::auth::extractors::AuthUser;
use crate::auth::recovery::PasswordRecoveryManager;
use crate::auth::session::SessionManager;
use crate::error::AppError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/activate/:link", get(activate))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/password", post(change_password))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/confirm", post(confirm_reset))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me).patch(update_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn validate_new_password(password: &str) -> Result<(), AppError> {
    if password.len() < 8 {
        return Err(AppError::InvalidArgument("password too short".into()));
    }
    Ok(())
}

fn validate_full_name(full_name: &str) -> Result<(), AppError> {
    let len = full_name.chars().count();
    if !(2..=50).contains(&len) {
        return Err(AppError::InvalidArgument(
            "full name must be between 2 and 50 characters".into(),
        ));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if !is_valid_email(&payload.email) {
        return Err(AppError::InvalidArgument("invalid email".into()));
    }
    validate_full_name(&payload.full_name)?;
    validate_new_password(&payload.password)?;

    let message = SessionManager::from_state(&state).signup(payload).await?;
    Ok(Json(message))
}

#[instrument(skip(state, payload))]
async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let auth = SessionManager::from_state(&state)
        .signin(&payload.email, &payload.password)
        .await?;
    Ok(Json(auth))
}

#[instrument(skip(state))]
async fn activate(
    State(state): State<AppState>,
    Path(link): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = ActivationManager::from_state(&state).activate(&link).await?;
    Ok(Json(message))
}

#[instrument(skip(state, payload))]
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let auth = SessionManager::from_state(&state)
        .refresh(&payload.refresh_token)
        .await?;
    Ok(Json(auth))
}

#[instrument(skip(state, payload))]
async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = SessionManager::from_state(&state)
        .logout(&payload.refresh_token)
        .await?;
    Ok(Json(message))
}

#[instrument(skip(state, user))]
async fn get_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = SessionManager::from_state(&state).profile(user.sub).await?;
    Ok(Json(profile))
}

#[instrument(skip(state, user, payload))]
async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    if let Some(email) = payload.email.as_deref() {
        if !is_valid_email(email) {
            return Err(AppError::InvalidArgument("invalid email".into()));
        }
    }
    if let Some(full_name) = payload.full_name.as_deref() {
        validate_full_name(full_name)?;
    }
    let profile = SessionManager::from_state(&state)
        .update_profile(user.sub, payload)
        .await?;
    Ok(Json(profile))
}

#[instrument(skip(state, user, payload))]
async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_new_password(&payload.new_password)?;
    let message = PasswordRecoveryManager::from_state(&state)
        .change_password(
            user.sub,
            &payload.old_password,
            &payload.new_password,
            &payload.confirm_password,
        )
        .await?;
    Ok(Json(message))
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = PasswordRecoveryManager::from_state(&state)
        .request_reset(&payload.email)
        .await?;
    Ok(Json(message))
}

#[instrument(skip(state, payload))]
async fn confirm_reset(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmResetRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_new_password(&payload.new_password)?;
    let message = PasswordRecoveryManager::from_state(&state)
        .confirm_reset(&payload.code, &payload.new_password, &payload.confirm_password)
        .await?;
    Ok(Json(message))
}
