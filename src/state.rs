use crate::config::AppConfig;
use crate::mail::{LogNotifier, NotificationSender};
use crate::users::repo::{CredentialStore, PgCredentialStore};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CredentialStore>,
    pub notifier: Arc<dyn NotificationSender>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            warn!(error = %e, "migration failed; continuing with existing schema");
        }

        let store = Arc::new(PgCredentialStore::new(db)) as Arc<dyn CredentialStore>;
        let notifier = Arc::new(LogNotifier) as Arc<dyn NotificationSender>;

        Ok(Self {
            config,
            store,
            notifier,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
        }
    }

    #[cfg(test)]
    pub(crate) fn fake() -> Self {
        use crate::mail::testing::RecordingNotifier;
        use crate::users::repo::testing::InMemoryStore;

        Self {
            config: Arc::new(AppConfig::fake()),
            store: Arc::new(InMemoryStore::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }
}
