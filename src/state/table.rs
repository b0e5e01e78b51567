//! Per-session cue table.
//!
//! All mutation goes through [`StateTable`] methods under one `RwLock`, so
//! the precedence and quiet-once rules hold no matter which timer or
//! file event triggers an update.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::matcher::{MatchSignal, SignalKind};

use super::{QuietEvent, QuietKind};

/// Whether state is keyed per agent or per log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    #[default]
    PerAgent,
    PerInstance,
}

/// Mutable lifecycle record for one agent or log instance.
#[derive(Debug, Clone)]
struct SessionState {
    agent: String,
    display_name: String,
    /// Owning log file in per-instance mode.
    path: Option<PathBuf>,
    last_cue: Option<Instant>,
    last_cue_at: Option<DateTime<Utc>>,
    cue: Option<SignalKind>,
    cue_line: Option<String>,
    quiet_notified: bool,
    files: Vec<PathBuf>,
}

impl SessionState {
    fn new(agent: &str, display_name: &str, path: Option<PathBuf>) -> Self {
        Self {
            agent: agent.to_string(),
            display_name: display_name.to_string(),
            path,
            last_cue: None,
            last_cue_at: None,
            cue: None,
            cue_line: None,
            quiet_notified: false,
            files: Vec::new(),
        }
    }

    /// Apply a cue. Returns true if the stored cue type changed.
    fn record(&mut self, kind: SignalKind, now: Instant) -> bool {
        self.last_cue = Some(now);
        self.last_cue_at = Some(Utc::now());
        self.quiet_notified = false;

        // Weak cues never replace a pending strong cue.
        let overwrite = match kind {
            SignalKind::Activity => matches!(
                self.cue,
                None | Some(SignalKind::Activity | SignalKind::Awaiting)
            ),
            _ => true,
        };
        if overwrite {
            self.cue = Some(kind);
        }
        overwrite
    }

    fn quiet_due(&self, quiet: Duration, now: Instant) -> bool {
        match self.last_cue {
            Some(at) => !self.quiet_notified && now.saturating_duration_since(at) >= quiet,
            None => false,
        }
    }
}

/// Serializable view of one tracked session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub key: String,
    pub agent: String,
    pub display_name: String,
    pub path: Option<PathBuf>,
    pub cue: Option<SignalKind>,
    pub last_cue_at: Option<DateTime<Utc>>,
    pub quiet_notified: bool,
    pub files: Vec<PathBuf>,
}

/// Table of session states keyed by agent name or log path.
#[derive(Debug, Default)]
pub struct StateTable {
    mode: TrackingMode,
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl StateTable {
    /// Create an empty table for the given tracking mode.
    #[must_use]
    pub fn new(mode: TrackingMode) -> Self {
        Self {
            mode,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    /// Get-or-create the record for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn ensure(&self, key: &str, agent: &str, display_name: &str, path: Option<PathBuf>) {
        let mut sessions = self.sessions.write().expect("RwLock poisoned");
        sessions
            .entry(key.to_string())
            .or_insert_with(|| SessionState::new(agent, display_name, path));
    }

    /// Record a cue of the given kind for `key`, creating the record if needed.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn record_cue(&self, key: &str, kind: SignalKind) {
        let mut sessions = self.sessions.write().expect("RwLock poisoned");
        let state = sessions
            .entry(key.to_string())
            .or_insert_with(|| SessionState::new(key, key, None));
        let changed = state.record(kind, Instant::now());
        tracing::debug!(key, cue = %kind, changed, "Recorded cue");
    }

    /// Record a matched signal, keeping its line as the notification snippet
    /// when it sets the cue type.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn record_signal(&self, key: &str, signal: &MatchSignal) {
        let mut sessions = self.sessions.write().expect("RwLock poisoned");
        let state = sessions
            .entry(key.to_string())
            .or_insert_with(|| SessionState::new(&signal.agent, &signal.agent, None));
        if state.record(signal.kind, Instant::now()) {
            state.cue_line = Some(signal.line.clone());
        }
        tracing::debug!(
            key,
            cue = %signal.kind,
            stored = ?state.cue,
            reason = %signal.reason,
            "Recorded signal"
        );
    }

    /// The stored cue type for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn cue_kind(&self, key: &str) -> Option<SignalKind> {
        self.sessions
            .read()
            .expect("RwLock poisoned")
            .get(key)
            .and_then(|s| s.cue)
    }

    /// Whether a quiet notification is due for `key`.
    ///
    /// True iff a cue was recorded, no quiet notification has been sent for
    /// it yet, and at least `quiet` has elapsed since.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn should_send_quiet(&self, key: &str, quiet: Duration) -> bool {
        self.sessions
            .read()
            .expect("RwLock poisoned")
            .get(key)
            .is_some_and(|s| s.quiet_due(quiet, Instant::now()))
    }

    /// Mark the current cue of `key` as notified.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn mark_quiet_notified(&self, key: &str) {
        let mut sessions = self.sessions.write().expect("RwLock poisoned");
        if let Some(state) = sessions.get_mut(key) {
            state.quiet_notified = true;
        }
    }

    /// Collect every due quiet event and mark each one notified.
    ///
    /// Check and mark happen under a single write lock.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn collect_quiet(&self, quiet: Duration) -> Vec<QuietEvent> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().expect("RwLock poisoned");
        let mut events: Vec<QuietEvent> = sessions
            .iter_mut()
            .filter(|(_, state)| state.quiet_due(quiet, now))
            .filter_map(|(key, state)| {
                let cue = state.cue?;
                let silent_for = state
                    .last_cue
                    .map_or(Duration::ZERO, |at| now.saturating_duration_since(at));
                state.quiet_notified = true;
                Some(QuietEvent {
                    key: key.clone(),
                    agent: state.agent.clone(),
                    display_name: state.display_name.clone(),
                    kind: QuietKind::from_cue(cue),
                    cue,
                    silent_for,
                    line: state.cue_line.clone(),
                })
            })
            .collect();
        events.sort_by(|a, b| a.key.cmp(&b.key));
        events
    }

    /// Replace the watched file list for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn set_files(&self, key: &str, files: Vec<PathBuf>) {
        let mut sessions = self.sessions.write().expect("RwLock poisoned");
        if let Some(state) = sessions.get_mut(key) {
            state.files = files;
        }
    }

    /// Display name recorded for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn display_name(&self, key: &str) -> Option<String> {
        self.sessions
            .read()
            .expect("RwLock poisoned")
            .get(key)
            .map(|s| s.display_name.clone())
    }

    /// Number of tracked sessions.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().expect("RwLock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of every tracked session.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StateSnapshot> {
        let sessions = self.sessions.read().expect("RwLock poisoned");
        let mut out: Vec<StateSnapshot> = sessions
            .iter()
            .map(|(key, s)| StateSnapshot {
                key: key.clone(),
                agent: s.agent.clone(),
                display_name: s.display_name.clone(),
                path: s.path.clone(),
                cue: s.cue,
                last_cue_at: s.last_cue_at,
                quiet_notified: s.quiet_notified,
                files: s.files.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Drop every record.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn clear(&self) {
        self.sessions.write().expect("RwLock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(3600);

    #[test]
    fn test_no_cue_recorded_is_none() {
        let table = StateTable::new(TrackingMode::PerAgent);
        table.ensure("claude", "claude", "Claude Code", None);
        assert_eq!(table.cue_kind("claude"), None);
        assert!(!table.should_send_quiet("claude", Duration::ZERO));
        assert!(!table.should_send_quiet("missing", Duration::ZERO));
    }

    #[test]
    fn test_strong_cue_precedence() {
        let table = StateTable::new(TrackingMode::PerAgent);
        table.record_cue("k", SignalKind::Activity);
        assert_eq!(table.cue_kind("k"), Some(SignalKind::Activity));
        table.record_cue("k", SignalKind::Complete);
        table.record_cue("k", SignalKind::Activity);
        assert_eq!(table.cue_kind("k"), Some(SignalKind::Complete));
    }

    #[test]
    fn test_strong_replaces_strong() {
        let table = StateTable::new(TrackingMode::PerAgent);
        table.record_cue("k", SignalKind::Holding);
        table.record_cue("k", SignalKind::Complete);
        assert_eq!(table.cue_kind("k"), Some(SignalKind::Complete));
        table.record_cue("k", SignalKind::Holding);
        assert_eq!(table.cue_kind("k"), Some(SignalKind::Holding));
    }

    #[test]
    fn test_activity_replaces_explicit_awaiting() {
        let table = StateTable::new(TrackingMode::PerAgent);
        table.record_cue("k", SignalKind::Awaiting);
        table.record_cue("k", SignalKind::Activity);
        assert_eq!(table.cue_kind("k"), Some(SignalKind::Activity));
    }

    #[test]
    fn test_quiet_once_cycle() {
        let table = StateTable::new(TrackingMode::PerAgent);
        table.record_cue("k", SignalKind::Complete);

        assert!(!table.should_send_quiet("k", LONG));
        assert!(table.should_send_quiet("k", Duration::ZERO));

        table.mark_quiet_notified("k");
        assert!(!table.should_send_quiet("k", Duration::ZERO));

        // A new cue re-arms the quiet check.
        table.record_cue("k", SignalKind::Activity);
        assert!(table.should_send_quiet("k", Duration::ZERO));
    }

    #[test]
    fn test_quiet_fires_after_elapsed_time() {
        let table = StateTable::new(TrackingMode::PerAgent);
        let quiet = Duration::from_millis(40);
        table.record_cue("k", SignalKind::Complete);
        assert!(!table.should_send_quiet("k", quiet));
        std::thread::sleep(Duration::from_millis(60));
        assert!(table.should_send_quiet("k", quiet));
    }

    #[test]
    fn test_collect_quiet_builds_events_and_marks() {
        let table = StateTable::new(TrackingMode::PerAgent);
        table.ensure("a", "claude", "Claude Code", None);
        table.ensure("b", "codex", "Codex", None);
        table.ensure("c", "gemini", "Gemini CLI", None);
        table.record_cue("a", SignalKind::Complete);
        table.record_cue("b", SignalKind::Activity);
        table.record_cue("c", SignalKind::Holding);

        let events = table.collect_quiet(Duration::ZERO);
        let kinds: Vec<_> = events.iter().map(|e| (e.key.as_str(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("a", QuietKind::Cooling),
                ("b", QuietKind::Awaiting),
                ("c", QuietKind::Holding),
            ]
        );
        assert_eq!(events[0].display_name, "Claude Code");

        assert!(table.collect_quiet(Duration::ZERO).is_empty());
    }

    #[test]
    fn test_record_signal_keeps_cue_line() {
        let table = StateTable::new(TrackingMode::PerInstance);
        let strong = MatchSignal::new(SignalKind::Complete, "claude", "turn finished", "line-1");
        let weak = MatchSignal::new(SignalKind::Activity, "claude", "assistant output", "line-2");
        table.record_signal("/tmp/a.jsonl", &strong);
        table.record_signal("/tmp/a.jsonl", &weak);

        let events = table.collect_quiet(Duration::ZERO);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line.as_deref(), Some("line-1"));
        assert_eq!(events[0].agent, "claude");
        assert_eq!(table.mode(), TrackingMode::PerInstance);
    }

    #[test]
    fn test_snapshot_and_files() {
        let table = StateTable::new(TrackingMode::PerAgent);
        table.ensure("claude", "claude", "Claude Code", None);
        table.set_files("claude", vec![PathBuf::from("/tmp/x.jsonl")]);
        table.record_cue("claude", SignalKind::Holding);

        let snap = table.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].cue, Some(SignalKind::Holding));
        assert_eq!(snap[0].files, vec![PathBuf::from("/tmp/x.jsonl")]);
        assert!(snap[0].last_cue_at.is_some());
        assert_eq!(table.display_name("claude").as_deref(), Some("Claude Code"));

        table.clear();
        assert!(table.is_empty());
    }
}
