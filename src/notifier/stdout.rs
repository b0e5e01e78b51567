use async_trait::async_trait;

use crate::display;

use super::{Notification, Notifier, NotifyError};

/// Prints colored notification lines to the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutNotifier {
    raw_mode: bool,
}

impl StdoutNotifier {
    /// `raw_mode` disables snippet truncation.
    #[must_use]
    pub fn new(raw_mode: bool) -> Self {
        Self { raw_mode }
    }
}

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        display::print_notification(n, self.raw_mode);
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}
