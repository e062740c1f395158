use axum::async_trait;
use tracing::info;

/// Outbound notification seam. The auth core only ever needs these two
/// messages; template rendering and SMTP transport live behind the trait.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_activation(
        &self,
        email: &str,
        full_name: &str,
        activation_url: &str,
    ) -> anyhow::Result<()>;

    async fn send_password_reset(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Development transport: logs the dispatch instead of talking to a relay.
pub struct LogNotifier;

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send_activation(
        &self,
        email: &str,
        full_name: &str,
        activation_url: &str,
    ) -> anyhow::Result<()> {
        info!(%email, %full_name, %activation_url, "activation mail dispatched");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, code: &str) -> anyhow::Result<()> {
        info!(%email, %code, "password reset mail dispatched");
        Ok(())
    }
}
