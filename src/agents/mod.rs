//! Descriptors for the coding-assistant CLIs whose logs are watched.

mod registry;

pub use registry::{builtin_agents, lookup, resolve_agents, AgentSpec, BUILTIN_AGENTS};

use std::path::{Path, PathBuf};

use serde::Serialize;

/// A monitored coding assistant.
///
/// Built once at startup from the static registry (or from a custom
/// agent entry in the config) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    /// Unique internal key, e.g. `claude`.
    pub name: String,
    /// Human-readable name used in notifications.
    pub display_name: String,
    /// Directory (or single file) holding the agent's logs.
    pub log_path: PathBuf,
    /// File-name glob patterns; empty means any recognized log extension.
    pub patterns: Vec<String>,
    /// Candidate OS process names, matched as substrings.
    pub process_names: Vec<String>,
    /// Name of the line format, used to pick a matcher.
    pub format: String,
}

impl Agent {
    /// Build an agent from a static registry entry, expanding `~`.
    #[must_use]
    pub fn from_spec(spec: &AgentSpec) -> Self {
        Self {
            name: spec.name.to_string(),
            display_name: spec.display_name.to_string(),
            log_path: expand_home(spec.log_path),
            patterns: spec.patterns.iter().map(ToString::to_string).collect(),
            process_names: spec.process_names.iter().map(ToString::to_string).collect(),
            format: spec.name.to_string(),
        }
    }

    /// Replace the log location, keeping everything else.
    #[must_use]
    pub fn with_log_path(mut self, path: impl AsRef<str>) -> Self {
        self.log_path = expand_home(path.as_ref());
        self
    }

    /// Whether the configured log location currently exists.
    #[must_use]
    pub fn log_path_exists(&self) -> bool {
        self.log_path.exists()
    }
}

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading `~`, or a missing home directory, are returned
/// unchanged.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(path), |home| home.join(rest)),
        None => Path::new(path).to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home_absolute_unchanged() {
        assert_eq!(expand_home("/var/log/x"), PathBuf::from("/var/log/x"));
    }

    #[test]
    fn test_expand_home_tilde_prefix() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(
            expand_home("~/.claude/projects"),
            home.join(".claude/projects")
        );
        assert_eq!(expand_home("~"), home);
    }

    #[test]
    fn test_with_log_path_overrides_location() {
        let spec = lookup("claude").unwrap();
        let agent = Agent::from_spec(spec).with_log_path("/tmp/claude-logs");
        assert_eq!(agent.log_path, PathBuf::from("/tmp/claude-logs"));
        assert_eq!(agent.name, "claude");
        assert_eq!(agent.format, "claude");
    }
}
