//! Orchestrates tailing, matching, state and notifications for all agents.
//!
//! One task owns every [`TailerManager`], matcher and the process monitor;
//! a single `select!` loop reacts to filesystem events (or poll ticks) and
//! to the rescan, quiet-sweep and process-sampling timers. Push and pull
//! modes share [`Watcher::process_agent`] and [`Watcher::sweep_quiet`], so
//! they produce the same notifications for the same input.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::agents::{resolve_agents, Agent};
use crate::config::WatchConfig;
use crate::matcher::{self, Matcher};
use crate::notifier::{EventKind as NoticeKind, Notification, Notifier};
use crate::process::{name_matches, ProcessMonitor};
use crate::state::{StateTable, TrackingMode};

use super::discovery::instance_display_name;
use super::error::WatcherError;
use super::manager::{ScanOptions, TailerManager};

/// Debounce window for filesystem events.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// Period of the quiet-period sweep.
pub const QUIET_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// How the watcher learns about new log content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Filesystem change notifications.
    #[default]
    Events,
    /// Fixed-interval reads of every tailed file.
    Polling,
}

impl ScheduleMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Polling => "polling",
        }
    }
}

struct AgentSlot {
    agent: Agent,
    manager: TailerManager,
    matcher: Box<dyn Matcher>,
}

struct FsWatch {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    events: mpsc::UnboundedReceiver<DebounceEventResult>,
    watched: HashSet<PathBuf>,
}

impl FsWatch {
    fn new() -> Result<Self, WatcherError> {
        let (tx, events) = mpsc::unbounded_channel();
        let debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            let _ = tx.send(result);
        })?;
        Ok(Self {
            debouncer,
            events,
            watched: HashSet::new(),
        })
    }

    /// Start watching `target` unless already watched.
    fn ensure_watched(&mut self, target: &Path, recursive: bool) {
        if self.watched.contains(target) {
            return;
        }
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        match self.debouncer.watch(target, mode) {
            Ok(()) => {
                tracing::debug!(path = %target.display(), "Watching directory");
                self.watched.insert(target.to_path_buf());
            }
            Err(e) => {
                tracing::warn!(path = %target.display(), error = %e, "Failed to watch directory");
            }
        }
    }
}

/// The log watcher.
pub struct Watcher {
    slots: Vec<AgentSlot>,
    config: WatchConfig,
    state: Arc<StateTable>,
    notifier: Arc<dyn Notifier>,
    mode: ScheduleMode,
    process: Option<ProcessMonitor>,
    fs: Option<FsWatch>,
}

impl Watcher {
    /// Build a watcher for `agents`.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::NoAgents`] for an empty agent list, or a
    /// notify error if the filesystem watcher cannot be created in
    /// [`ScheduleMode::Events`].
    pub fn new(
        agents: Vec<Agent>,
        config: WatchConfig,
        notifier: Arc<dyn Notifier>,
        mode: ScheduleMode,
    ) -> Result<Self, WatcherError> {
        if agents.is_empty() {
            return Err(WatcherError::NoAgents);
        }

        let tracking = if config.per_instance {
            TrackingMode::PerInstance
        } else {
            TrackingMode::PerAgent
        };
        let state = Arc::new(StateTable::new(tracking));
        let options = ScanOptions::from_config(&config);

        let slots: Vec<AgentSlot> = agents
            .into_iter()
            .map(|agent| {
                if tracking == TrackingMode::PerAgent {
                    state.ensure(&agent.name, &agent.name, &agent.display_name, None);
                }
                AgentSlot {
                    manager: TailerManager::new(&agent, options),
                    matcher: matcher::for_agent(&agent),
                    agent,
                }
            })
            .collect();

        let process = if config.track_process {
            let mut names: Vec<String> = slots
                .iter()
                .flat_map(|s| s.agent.process_names.iter().cloned())
                .collect();
            names.sort();
            names.dedup();
            if names.is_empty() {
                tracing::warn!("Process tracking enabled but no agent has process names");
                None
            } else {
                Some(ProcessMonitor::new(names))
            }
        } else {
            None
        };

        let fs = match mode {
            ScheduleMode::Events => Some(FsWatch::new()?),
            ScheduleMode::Polling => None,
        };

        let mut watcher = Self {
            slots,
            config,
            state,
            notifier,
            mode,
            process,
            fs,
        };
        watcher.watch_missing();
        Ok(watcher)
    }

    /// Build a watcher for the agents named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an agent name is unknown or construction fails.
    pub fn from_config(
        config: WatchConfig,
        notifier: Arc<dyn Notifier>,
        mode: ScheduleMode,
    ) -> Result<Self, WatcherError> {
        let agents = resolve_agents(&config)?;
        Self::new(agents, config, notifier, mode)
    }

    /// Replace the system process monitor, e.g. with a custom probe.
    #[must_use]
    pub fn with_process_monitor(mut self, monitor: ProcessMonitor) -> Self {
        self.process = Some(monitor);
        self
    }

    #[must_use]
    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    /// Shared handle to the session state table.
    #[must_use]
    pub fn state(&self) -> Arc<StateTable> {
        Arc::clone(&self.state)
    }

    /// Agents being watched.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.slots.iter().map(|s| &s.agent)
    }

    /// Run until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Currently never fails once constructed; per-file and delivery errors
    /// are logged and monitoring continues. If the filesystem event stream
    /// closes, the loop switches to polling.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), WatcherError> {
        tracing::info!(
            mode = self.mode.as_str(),
            agents = self.slots.len(),
            "Watcher started"
        );

        // Position every tailer before reacting to changes.
        self.poll_once().await;

        let mut rescan = tokio::time::interval(self.config.rescan_interval());
        let mut sweep = tokio::time::interval(QUIET_SWEEP_INTERVAL);
        let mut sample = tokio::time::interval(self.config.process_sample_interval());
        let mut poll = tokio::time::interval(self.config.poll_interval());
        for timer in [&mut rescan, &mut sweep, &mut sample, &mut poll] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }

        let mut polling = self.mode == ScheduleMode::Polling;
        let tracking = self.process.is_some();
        let mut exit_rx: Option<oneshot::Receiver<u32>> = None;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                exited = next_exit(&mut exit_rx) => {
                    exit_rx = None;
                    if let Some(pid) = exited {
                        self.handle_exit(pid).await;
                    }
                }
                fs_event = next_fs_event(&mut self.fs) => match fs_event {
                    Some(result) => self.handle_fs(result).await,
                    None => {
                        tracing::warn!("Filesystem event stream closed, falling back to polling");
                        self.fs = None;
                        self.mode = ScheduleMode::Polling;
                        polling = true;
                    }
                },
                _ = rescan.tick() => {
                    self.watch_missing();
                    self.refresh_all();
                }
                _ = sweep.tick() => self.sweep_quiet().await,
                _ = sample.tick(), if tracking => self.sample_process(&mut exit_rx, &cancel).await,
                _ = poll.tick(), if polling => self.poll_once().await,
            }
        }

        tracing::info!("Watcher stopping");
        self.close();
        Ok(())
    }

    /// Read and process new lines for every agent.
    pub async fn poll_once(&mut self) {
        for idx in 0..self.slots.len() {
            self.process_agent(idx).await;
        }
    }

    /// Refresh one agent's files, then match every new line.
    pub async fn process_agent(&mut self, idx: usize) {
        if idx >= self.slots.len() {
            return;
        }
        self.refresh_agent(idx);
        let batches = self.slots[idx].manager.read_all_new().await;
        for (path, lines) in batches {
            for line in lines {
                self.process_line(idx, &path, &line).await;
            }
        }
    }

    /// Emit one notification per session whose quiet period just elapsed.
    pub async fn sweep_quiet(&mut self) {
        let events = self.state.collect_quiet(self.config.quiet_period());
        for event in events {
            tracing::debug!(key = %event.key, kind = %event.kind, "Quiet period elapsed");
            let notification =
                Notification::from_quiet(&event, self.config.verbosity, self.config.raw_snippets);
            self.notify(notification).await;
        }
    }

    /// Release tailers and the filesystem watcher.
    pub fn close(&mut self) {
        for slot in &mut self.slots {
            slot.manager.close();
        }
        self.fs = None;
    }

    fn state_key(&self, agent: &Agent, path: &Path) -> String {
        match self.state.mode() {
            TrackingMode::PerAgent => agent.name.clone(),
            TrackingMode::PerInstance => path.display().to_string(),
        }
    }

    fn refresh_all(&mut self) {
        for idx in 0..self.slots.len() {
            self.refresh_agent(idx);
        }
    }

    fn refresh_agent(&mut self, idx: usize) {
        let files = self.slots[idx].manager.refresh_files();
        let agent = &self.slots[idx].agent;
        match self.state.mode() {
            TrackingMode::PerAgent => self.state.set_files(&agent.name, files),
            TrackingMode::PerInstance => {
                for path in files {
                    let key = path.display().to_string();
                    let display = instance_display_name(agent, &path);
                    self.state
                        .ensure(&key, &agent.name, &display, Some(path.clone()));
                    self.state.set_files(&key, vec![path]);
                }
            }
        }
    }

    async fn process_line(&mut self, idx: usize, path: &Path, line: &str) {
        let slot = &self.slots[idx];
        let Some(signal) = slot.matcher.match_line(line) else {
            return;
        };
        let key = self.state_key(&slot.agent, path);
        self.state.record_signal(&key, &signal);

        if self.config.verbosity.notifies_immediately() && signal.kind.is_strong() {
            let display = self
                .state
                .display_name(&key)
                .unwrap_or_else(|| slot.agent.display_name.clone());
            if let Some(notification) =
                Notification::from_signal(
                    &signal,
                    &display,
                    self.config.verbosity,
                    self.config.raw_snippets,
                )
            {
                self.notify(notification).await;
            }
        }
    }

    async fn handle_fs(&mut self, result: DebounceEventResult) {
        let events = match result {
            Ok(events) => events,
            Err(errors) => {
                for error in errors {
                    tracing::warn!(error = %error, "Filesystem watcher error");
                }
                return;
            }
        };

        let mut touched = BTreeSet::new();
        for event in &events {
            let structural = matches!(
                event.kind,
                EventKind::Create(_)
                    | EventKind::Remove(_)
                    | EventKind::Modify(notify::event::ModifyKind::Name(_))
            );
            for path in &event.paths {
                for (idx, slot) in self.slots.iter_mut().enumerate() {
                    if slot.manager.owns(path) {
                        touched.insert(idx);
                        if structural {
                            slot.manager.invalidate_cache();
                        }
                    }
                }
            }
        }

        for idx in touched {
            self.process_agent(idx).await;
        }
    }

    async fn sample_process(
        &mut self,
        exit_rx: &mut Option<oneshot::Receiver<u32>>,
        cancel: &CancellationToken,
    ) {
        let every = self.config.process_sample_interval();
        let threshold = self.config.process_idle_threshold;
        let idle_for = self.config.process_idle_duration();
        let Some(monitor) = self.process.as_mut() else {
            return;
        };

        let previous = monitor.current_pid();
        let Some(stats) = monitor.sample() else {
            return;
        };
        if previous != Some(stats.pid) || exit_rx.is_none() {
            *exit_rx = Some(monitor.watch_exit(stats.pid, every, cancel.child_token()));
        }
        tracing::trace!(
            pid = stats.pid,
            cpu = ?stats.cpu_percent,
            rss = stats.rss_bytes,
            "Process sample"
        );

        if monitor.check_idle(threshold, idle_for) {
            let process_name = monitor.current_name().map(str::to_string);
            let agent = self.agent_for_process(process_name.as_deref());
            let message = format!(
                "{} process {} has been idle for {}s",
                agent.display_name,
                stats.pid,
                idle_for.as_secs()
            );
            let notification =
                Notification::new(NoticeKind::Idle, &agent.name, &agent.display_name, message);
            self.notify(notification).await;
        }
    }

    async fn handle_exit(&mut self, pid: u32) {
        let process_name = self
            .process
            .as_ref()
            .and_then(|m| m.current_name().map(str::to_string));
        if let Some(monitor) = self.process.as_mut() {
            if monitor.current_pid() == Some(pid) {
                monitor.forget();
            }
        }

        let agent = self.agent_for_process(process_name.as_deref());
        tracing::info!(pid, agent = %agent.name, "Process exited");
        let message = format!("{} process {pid} exited", agent.display_name);
        let notification =
            Notification::new(NoticeKind::Exited, &agent.name, &agent.display_name, message);
        self.notify(notification).await;
    }

    /// Agent whose process names match `name`, defaulting to the first.
    fn agent_for_process(&self, name: Option<&str>) -> Agent {
        name.and_then(|name| {
            self.slots
                .iter()
                .find(|s| name_matches(name, &s.agent.process_names))
        })
        .unwrap_or(&self.slots[0])
        .agent
        .clone()
    }

    /// Register watches for base paths that exist now.
    fn watch_missing(&mut self) {
        let Some(fs) = self.fs.as_mut() else {
            return;
        };
        for slot in &self.slots {
            if let Some(target) = slot.manager.watch_target() {
                let recursive = slot.manager.base_path().is_dir();
                fs.ensure_watched(&target, recursive);
            }
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.send(&notification).await {
            tracing::warn!(
                notifier = self.notifier.name(),
                kind = %notification.kind,
                error = %e,
                "Failed to send notification"
            );
        }
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let agents: Vec<&str> = self.slots.iter().map(|s| s.agent.name.as_str()).collect();
        f.debug_struct("Watcher")
            .field("agents", &agents)
            .field("mode", &self.mode)
            .field("notifier", &self.notifier.name())
            .finish_non_exhaustive()
    }
}

async fn next_fs_event(fs: &mut Option<FsWatch>) -> Option<DebounceEventResult> {
    match fs {
        Some(fs) => fs.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_exit(rx: &mut Option<oneshot::Receiver<u32>>) -> Option<u32> {
    match rx {
        Some(rx) => rx.await.ok(),
        None => std::future::pending().await,
    }
}
