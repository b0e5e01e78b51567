//! Lifecycle events inferred from silence after a cue.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::matcher::SignalKind;

/// What a quiet period after a given cue most likely means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuietKind {
    /// Finished a turn and stayed silent: done.
    Cooling,
    /// Went silent without a completion marker: likely waiting on the user.
    Awaiting,
    /// Still silent after asking for tool approval.
    Holding,
}

impl QuietKind {
    /// Infer the quiet outcome from the last recorded cue.
    #[must_use]
    pub fn from_cue(cue: SignalKind) -> Self {
        match cue {
            SignalKind::Complete => Self::Cooling,
            SignalKind::Holding => Self::Holding,
            SignalKind::Activity | SignalKind::Awaiting => Self::Awaiting,
        }
    }

    /// Notification title.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Cooling => "Cooling",
            Self::Awaiting => "Awaiting",
            Self::Holding => "Holding",
        }
    }

    /// Notification body for a session display name.
    #[must_use]
    pub fn describe(self, display_name: &str, silent_for: Duration) -> String {
        let secs = silent_for.as_secs();
        match self {
            Self::Cooling => format!("{display_name} finished and has been quiet for {secs}s"),
            Self::Awaiting => format!("{display_name} went quiet for {secs}s and may need input"),
            Self::Holding => {
                format!("{display_name} is still waiting for tool approval after {secs}s")
            }
        }
    }
}

impl fmt::Display for QuietKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A quiet-period outcome ready to be turned into a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuietEvent {
    /// State key (agent name or log path).
    pub key: String,
    pub agent: String,
    pub display_name: String,
    pub kind: QuietKind,
    /// Cue the inference was based on.
    pub cue: SignalKind,
    pub silent_for: Duration,
    /// Line that set the cue, if recorded.
    pub line: Option<String>,
}
