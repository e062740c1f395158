mod app;
mod auth;
mod config;
mod error;
mod mail;
mod state;
mod users;

use crate::auth::password::hash_password;
use crate::auth::tokens::generate_activation_link;
use crate::state::AppState;
use crate::users::model::{NewUser, Role};
use crate::users::repo::CredentialStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "taskboard=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;
    bootstrap_admin(&app_state).await?;

    let app = app::build_app(app_state);
    app::serve(app).await
}

/// Seeds the configured creator-admin when the store does not know the email
/// yet, so a fresh deployment has an account that can mint other admins.
async fn bootstrap_admin(state: &AppState) -> anyhow::Result<()> {
    let Some(seed) = state.config.bootstrap_admin.as_ref() else {
        return Ok(());
    };

    if state.store.find_by_email(&seed.email).await?.is_some() {
        tracing::info!(email = %seed.email, "bootstrap admin already exists");
        return Ok(());
    }

    let admin = state
        .store
        .create(NewUser {
            email: seed.email.clone(),
            full_name: seed.full_name.clone(),
            password_hash: hash_password(&seed.password)?,
            role: Role::Admin,
            is_creator: true,
            is_active: true,
            activation_link: generate_activation_link(),
        })
        .await?;
    tracing::info!(admin_id = %admin.id, email = %admin.email, "bootstrap admin created");
    Ok(())
}
