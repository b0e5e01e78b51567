//! Match signals produced from single log lines.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of lifecycle cue carried by a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Assistant is doing something; no turn boundary implied.
    Activity,
    /// Assistant finished producing a response.
    Complete,
    /// Assistant is blocked waiting for tool-use approval.
    Holding,
    /// Explicit "ready for next input".
    Awaiting,
}

impl SignalKind {
    /// Strong cues define the inferred lifecycle phase.
    #[must_use]
    pub fn is_strong(self) -> bool {
        !matches!(self, Self::Activity)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Complete => "complete",
            Self::Holding => "holding",
            Self::Awaiting => "awaiting",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata key for an extracted tool name.
pub const META_TOOL: &str = "tool";

/// A classified log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSignal {
    pub kind: SignalKind,
    /// Owning agent name.
    pub agent: String,
    /// Human-readable reason.
    pub reason: String,
    /// The raw matched line.
    pub line: String,
    pub metadata: BTreeMap<String, String>,
}

impl MatchSignal {
    #[must_use]
    pub fn new(
        kind: SignalKind,
        agent: impl Into<String>,
        reason: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            agent: agent.into(),
            reason: reason.into(),
            line: line.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach the tool name if one was extracted.
    #[must_use]
    pub fn with_tool(self, tool: Option<&str>) -> Self {
        match tool {
            Some(name) if !name.is_empty() => self.with_meta(META_TOOL, name),
            _ => self,
        }
    }

    /// Extracted tool name, if any.
    #[must_use]
    pub fn tool(&self) -> Option<&str> {
        self.metadata.get(META_TOOL).map(String::as_str)
    }
}
