use async_trait::async_trait;
use position_alert_core::{Notification, Notifier};
use tracing::info;

/// Writes alerts to the log instead of delivering them. Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(subject = %notification.subject, "Dry run, alert not sent");
        for line in notification.text_body.lines().filter(|l| !l.trim().is_empty()) {
            info!("  {}", line);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
