//! Configuration types.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::agents::{expand_home, Agent};

/// How much the watcher reports as it goes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Quiet-period notifications only, without log snippets.
    Minimal,
    /// Quiet-period notifications with the last matched line.
    #[default]
    Normal,
    /// Also notify immediately on every strong signal.
    Verbose,
}

impl Verbosity {
    /// Whether strong signals produce an immediate notification.
    #[must_use]
    pub fn notifies_immediately(self) -> bool {
        matches!(self, Self::Verbose)
    }

    /// Whether notifications carry the matched log line.
    #[must_use]
    pub fn includes_snippet(self) -> bool {
        !matches!(self, Self::Minimal)
    }
}

/// An agent defined in the config file rather than the built-in registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomAgent {
    /// Unique name, referenced from `agents`.
    pub name: String,
    /// Name shown in notifications; defaults to `name`.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Log directory or file.
    pub path: String,
    /// File-name glob patterns.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Candidate process names.
    #[serde(default)]
    pub process_names: Vec<String>,
    /// Line format (`claude`, `codex`, `openai`, `gemini`, `generic`, `auto`).
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "auto".to_string()
}

impl CustomAgent {
    /// Convert into a runtime descriptor.
    #[must_use]
    pub fn to_agent(&self) -> Agent {
        Agent {
            name: self.name.clone(),
            display_name: self
                .display_name
                .clone()
                .unwrap_or_else(|| self.name.clone()),
            log_path: expand_home(&self.path),
            patterns: self.patterns.clone(),
            process_names: self.process_names.clone(),
            format: self.format.clone(),
        }
    }
}

/// Webhook sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Endpoint receiving a JSON POST per notification.
    pub url: Url,
    /// Per-request timeout in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

/// Configuration for the log watcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    /// Names of the agents to monitor.
    pub agents: Vec<String>,
    /// Per-agent base path overrides.
    pub paths: BTreeMap<String, String>,
    /// Agents defined by the user.
    pub custom_agents: Vec<CustomAgent>,
    /// Poll interval in milliseconds (pull mode).
    pub poll_interval_ms: u64,
    /// Seconds of silence after a cue before a quiet notification fires.
    pub quiet_secs: u64,
    /// Maximum number of files tailed per agent.
    pub max_files: usize,
    /// Maximum directory depth walked when discovering files.
    pub max_depth: usize,
    /// Seconds between forced file rescans.
    pub rescan_secs: u64,
    /// Seconds a directory scan result is reused.
    pub scan_cache_ttl_secs: u64,
    /// Track each log file as its own session.
    pub per_instance: bool,
    /// Sample the assistant process for CPU idleness and exit.
    pub track_process: bool,
    /// Seconds between process samples.
    pub process_sample_secs: u64,
    /// CPU percentage below which the process counts as idle.
    pub process_idle_threshold: f64,
    /// Seconds of CPU idleness before an idle notification fires.
    pub process_idle_secs: u64,
    /// Output verbosity.
    pub verbosity: Verbosity,
    /// Read newly discovered files from the beginning instead of the end.
    pub from_start: bool,
    /// Keep notification snippets at full length.
    pub raw_snippets: bool,
    /// Optional webhook sink.
    pub webhook: Option<WebhookConfig>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            agents: vec!["claude".to_string()],
            paths: BTreeMap::new(),
            custom_agents: Vec::new(),
            poll_interval_ms: 1000,
            quiet_secs: 20,
            max_files: 5,
            max_depth: 3,
            rescan_secs: 5,
            scan_cache_ttl_secs: 3,
            per_instance: false,
            track_process: false,
            process_sample_secs: 2,
            process_idle_threshold: 1.0,
            process_idle_secs: 30,
            verbosity: Verbosity::Normal,
            from_start: false,
            raw_snippets: false,
            webhook: None,
        }
    }
}

impl WatchConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        Duration::from_secs(self.quiet_secs)
    }

    #[must_use]
    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_secs.max(1))
    }

    #[must_use]
    pub fn scan_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.scan_cache_ttl_secs)
    }

    #[must_use]
    pub fn process_sample_interval(&self) -> Duration {
        Duration::from_secs(self.process_sample_secs.max(1))
    }

    #[must_use]
    pub fn process_idle_duration(&self) -> Duration {
        Duration::from_secs(self.process_idle_secs)
    }
}
