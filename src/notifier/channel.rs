use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Notification, Notifier, NotifyError};

/// Forwards notifications into a tokio channel.
///
/// Useful for embedding the watcher in another program and for tests.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        self.tx.send(n.clone()).map_err(|_| NotifyError::Closed)
    }

    fn name(&self) -> &str {
        "channel"
    }
}
