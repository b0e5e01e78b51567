use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use super::{Notification, Notifier, NotifyError};

/// Sends each notification to several sinks concurrently.
///
/// Individual failures are logged; the send only fails when every sink
/// failed.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Add a sink.
    pub fn push(&mut self, sink: Arc<dyn Notifier>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for FanoutNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("FanoutNotifier").field("sinks", &names).finish()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        let results = join_all(self.sinks.iter().map(|sink| sink.send(n))).await;

        let mut failed = 0;
        for (sink, result) in self.sinks.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(sink = sink.name(), error = %e, "Notification delivery failed");
                failed += 1;
            }
        }

        if failed > 0 && failed == self.sinks.len() {
            return Err(NotifyError::AllFailed(failed));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "fanout"
    }
}
