//! Outbound notification sinks.
//!
//! The watcher only knows the [`Notifier`] trait; delivery (terminal,
//! webhook, channel) is chosen by the binary.

mod channel;
mod fanout;
mod log;
mod stdout;
mod webhook;

pub use channel::ChannelNotifier;
pub use fanout::FanoutNotifier;
pub use log::LogNotifier;
pub use stdout::StdoutNotifier;
pub use webhook::WebhookNotifier;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::Verbosity;
use crate::display::truncate;
use crate::matcher::{MatchSignal, SignalKind};
use crate::state::{QuietEvent, QuietKind};

/// Longest snippet carried by a notification.
pub const SNIPPET_MAX_LEN: usize = 200;

/// Lifecycle event being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A turn finished (immediate).
    Complete,
    /// Quiet after completion.
    Cooling,
    Awaiting,
    Holding,
    /// Process CPU stayed low.
    Idle,
    /// Process exited.
    Exited,
}

impl EventKind {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Complete => "Complete",
            Self::Cooling => "Cooling",
            Self::Awaiting => "Awaiting",
            Self::Holding => "Holding",
            Self::Idle => "Idle",
            Self::Exited => "Exited",
        }
    }
}

impl From<QuietKind> for EventKind {
    fn from(kind: QuietKind) -> Self {
        match kind {
            QuietKind::Cooling => Self::Cooling,
            QuietKind::Awaiting => Self::Awaiting,
            QuietKind::Holding => Self::Holding,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A message delivered to every configured sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: EventKind,
    pub title: String,
    /// Agent name, e.g. `claude`.
    pub agent: String,
    /// Agent or session name shown to the user.
    pub display_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Triggering log line, omitted at minimal verbosity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    #[must_use]
    pub fn new(
        kind: EventKind,
        agent: impl Into<String>,
        display_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: kind.title().to_string(),
            agent: agent.into(),
            display_name: display_name.into(),
            message: message.into(),
            tool: None,
            snippet: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a snippet if the verbosity allows it.
    ///
    /// The snippet is cut to [`SNIPPET_MAX_LEN`] characters unless `raw`.
    #[must_use]
    pub fn with_snippet(mut self, line: Option<&str>, verbosity: Verbosity, raw: bool) -> Self {
        if verbosity.includes_snippet() {
            self.snippet = line
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| truncate(l, SNIPPET_MAX_LEN, raw));
        }
        self
    }

    /// Notification for a quiet-period inference.
    #[must_use]
    pub fn from_quiet(event: &QuietEvent, verbosity: Verbosity, raw: bool) -> Self {
        Self::new(
            event.kind.into(),
            &event.agent,
            &event.display_name,
            event.kind.describe(&event.display_name, event.silent_for),
        )
        .with_snippet(event.line.as_deref(), verbosity, raw)
    }

    /// Immediate notification for a strong signal.
    ///
    /// Returns `None` for weak signals.
    #[must_use]
    pub fn from_signal(
        signal: &MatchSignal,
        display_name: &str,
        verbosity: Verbosity,
        raw: bool,
    ) -> Option<Self> {
        let (kind, message) = match signal.kind {
            SignalKind::Activity => return None,
            SignalKind::Complete => (EventKind::Complete, format!("{display_name} finished a turn")),
            SignalKind::Awaiting => (
                EventKind::Awaiting,
                format!("{display_name} is waiting for input"),
            ),
            SignalKind::Holding => (
                EventKind::Holding,
                match signal.tool() {
                    Some(tool) => format!("{display_name} wants to run {tool}"),
                    None => format!("{display_name} is waiting for approval"),
                },
            ),
        };
        let mut notification = Self::new(kind, &signal.agent, display_name, message)
            .with_snippet(Some(&signal.line), verbosity, raw);
        notification.tool = signal.tool().map(str::to_string);
        Some(notification)
    }
}

/// Errors from delivering a notification.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned status {0}")]
    Status(u16),

    #[error("Notification receiver dropped")]
    Closed,

    /// Every sink of a fanout failed.
    #[error("All {0} notifiers failed")]
    AllFailed(usize),
}

/// A destination for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_signal_skips_activity() {
        let signal = MatchSignal::new(SignalKind::Activity, "claude", "assistant output", "{}");
        assert!(Notification::from_signal(&signal, "Claude Code", Verbosity::Verbose, false).is_none());
    }

    #[test]
    fn test_from_signal_holding_with_tool() {
        let signal = MatchSignal::new(SignalKind::Holding, "claude", "tool use", r#"{"x":1}"#)
            .with_tool(Some("Bash"));
        let n = Notification::from_signal(&signal, "Claude Code", Verbosity::Normal, false).unwrap();
        assert_eq!(n.kind, EventKind::Holding);
        assert_eq!(n.title, "Holding");
        assert_eq!(n.tool.as_deref(), Some("Bash"));
        assert!(n.message.contains("Bash"));
        assert_eq!(n.snippet.as_deref(), Some(r#"{"x":1}"#));
    }

    #[test]
    fn test_minimal_verbosity_drops_snippet() {
        let signal = MatchSignal::new(SignalKind::Complete, "codex", "task complete", "done");
        let n = Notification::from_signal(&signal, "Codex", Verbosity::Minimal, false).unwrap();
        assert!(n.snippet.is_none());
    }

    #[test]
    fn test_from_quiet() {
        let event = QuietEvent {
            key: "claude".to_string(),
            agent: "claude".to_string(),
            display_name: "Claude Code".to_string(),
            kind: QuietKind::Cooling,
            cue: SignalKind::Complete,
            silent_for: Duration::from_secs(20),
            line: Some("x".repeat(500)),
        };
        let n = Notification::from_quiet(&event, Verbosity::Normal, false);
        assert_eq!(n.kind, EventKind::Cooling);
        assert!(n.message.contains("20s"));
        assert!(n.snippet.unwrap().len() <= SNIPPET_MAX_LEN);
    }

    #[test]
    fn test_raw_keeps_full_snippet() {
        let line = "y".repeat(500);
        let signal = MatchSignal::new(SignalKind::Complete, "claude", "turn finished", &line);

        let n = Notification::from_signal(&signal, "Claude Code", Verbosity::Normal, true).unwrap();
        assert_eq!(n.snippet.as_deref(), Some(line.as_str()));

        let cut = Notification::from_signal(&signal, "Claude Code", Verbosity::Normal, false).unwrap();
        assert_eq!(cut.snippet.unwrap().chars().count(), SNIPPET_MAX_LEN);
    }

    #[test]
    fn test_notification_serializes_kind() {
        let n = Notification::new(EventKind::Exited, "aider", "Aider", "gone");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "exited");
        assert_eq!(json["title"], "Exited");
        assert!(json.get("snippet").is_none());
    }
}
