use async_trait::async_trait;

use super::{Notification, Notifier, NotifyError};

/// Emits notifications as structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = %n.kind,
            agent = %n.agent,
            session = %n.display_name,
            tool = n.tool.as_deref(),
            snippet = n.snippet.as_deref(),
            "{}",
            n.message
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
