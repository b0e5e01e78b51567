//! CPU/memory sampling and idle detection for an agent's OS process.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::probe::{ProcSample, ProcessProbe, SystemProbe};

/// How long a failed PID lookup is remembered before searching again.
pub const DEFAULT_LOOKUP_COOLDOWN: Duration = Duration::from_secs(10);

/// Derived statistics from one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcStats {
    pub pid: u32,
    /// CPU utilization in percent of total capacity; `None` on the first
    /// sample of a process.
    pub cpu_percent: Option<f64>,
    pub rss_bytes: u64,
    pub vsz_bytes: u64,
    pub state: char,
}

/// Tracks whether CPU usage has stayed below a threshold long enough.
///
/// Fires once per idle episode; any reading at or above the threshold
/// starts a new episode.
#[derive(Debug, Default, Clone)]
pub struct IdleTracker {
    below_since: Option<Instant>,
    fired: bool,
}

impl IdleTracker {
    /// Feed one CPU reading. Returns true exactly once per idle episode.
    pub fn observe(
        &mut self,
        cpu_percent: Option<f64>,
        threshold: f64,
        duration: Duration,
        now: Instant,
    ) -> bool {
        let Some(cpu) = cpu_percent else {
            return false;
        };
        if cpu >= threshold {
            self.reset();
            return false;
        }
        let since = *self.below_since.get_or_insert(now);
        if !self.fired && now.saturating_duration_since(since) >= duration {
            self.fired = true;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.below_since = None;
        self.fired = false;
    }
}

/// Samples the process belonging to a set of candidate names.
pub struct ProcessMonitor {
    names: Vec<String>,
    probe: Arc<Mutex<Box<dyn ProcessProbe>>>,
    cached_pid: Option<u32>,
    cached_name: Option<String>,
    last_lookup: Option<Instant>,
    lookup_cooldown: Duration,
    last_sample: Option<(u32, ProcSample)>,
    last_cpu: Option<f64>,
    idle: IdleTracker,
}

impl ProcessMonitor {
    /// Monitor using the system probe.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self::with_probe(names, Box::new(SystemProbe::new()))
    }

    #[must_use]
    pub fn with_probe(names: Vec<String>, probe: Box<dyn ProcessProbe>) -> Self {
        Self {
            names,
            probe: Arc::new(Mutex::new(probe)),
            cached_pid: None,
            cached_name: None,
            last_lookup: None,
            lookup_cooldown: DEFAULT_LOOKUP_COOLDOWN,
            last_sample: None,
            last_cpu: None,
            idle: IdleTracker::default(),
        }
    }

    #[must_use]
    pub fn with_lookup_cooldown(mut self, cooldown: Duration) -> Self {
        self.lookup_cooldown = cooldown;
        self
    }

    /// Candidate process names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolve the PID of the newest matching process.
    ///
    /// A live cached PID is reused. After a miss, lookups are skipped until
    /// the cooldown expires.
    ///
    /// # Panics
    ///
    /// Panics if the probe mutex is poisoned.
    pub fn get_pid(&mut self) -> Option<u32> {
        let mut probe = self.probe.lock().expect("probe mutex poisoned");

        if let Some(pid) = self.cached_pid {
            if probe.is_alive(pid) {
                return Some(pid);
            }
            tracing::debug!(pid, "Cached process is gone");
            self.cached_pid = None;
            self.cached_name = None;
            self.last_sample = None;
            self.last_cpu = None;
            self.idle.reset();
        }

        if self
            .last_lookup
            .is_some_and(|at| at.elapsed() < self.lookup_cooldown)
        {
            return None;
        }
        self.last_lookup = Some(Instant::now());

        let newest = probe
            .find(&self.names)
            .into_iter()
            .max_by_key(|info| (info.start_time, info.pid))?;
        tracing::info!(pid = newest.pid, name = %newest.name, "Tracking process");
        self.cached_pid = Some(newest.pid);
        self.cached_name = Some(newest.name);
        self.cached_pid
    }

    /// Take a sample of the tracked process.
    ///
    /// CPU percentage needs two samples of the same PID, so the first call
    /// for a process reports `cpu_percent: None`.
    ///
    /// # Panics
    ///
    /// Panics if the probe mutex is poisoned.
    pub fn sample(&mut self) -> Option<ProcStats> {
        let pid = self.get_pid()?;
        let (current, cores) = {
            let mut probe = self.probe.lock().expect("probe mutex poisoned");
            (probe.sample(pid), probe.cpu_count().max(1))
        };
        let Some(current) = current else {
            self.forget();
            return None;
        };

        let cpu_percent = match self.last_sample {
            Some((prev_pid, prev)) if prev_pid == pid => cpu_percent(&prev, &current, cores),
            _ => None,
        };
        self.last_sample = Some((pid, current));
        self.last_cpu = cpu_percent;

        Some(ProcStats {
            pid,
            cpu_percent,
            rss_bytes: current.rss_bytes,
            vsz_bytes: current.vsz_bytes,
            state: current.state,
        })
    }

    /// Whether the process just completed `duration` below `threshold` CPU.
    ///
    /// Uses the most recent [`sample`](Self::sample) reading and returns
    /// true once per idle episode.
    pub fn check_idle(&mut self, threshold: f64, duration: Duration) -> bool {
        self.idle
            .observe(self.last_cpu, threshold, duration, Instant::now())
    }

    /// Whether the tracked process is still running.
    ///
    /// # Panics
    ///
    /// Panics if the probe mutex is poisoned.
    pub fn is_alive(&self) -> bool {
        self.cached_pid
            .is_some_and(|pid| self.probe.lock().expect("probe mutex poisoned").is_alive(pid))
    }

    /// Currently tracked PID, without lookup.
    #[must_use]
    pub fn current_pid(&self) -> Option<u32> {
        self.cached_pid
    }

    /// Name of the currently tracked process.
    #[must_use]
    pub fn current_name(&self) -> Option<&str> {
        self.cached_name.as_deref()
    }

    /// Drop the tracked PID and all sampling history.
    pub fn forget(&mut self) {
        self.cached_pid = None;
        self.cached_name = None;
        self.last_sample = None;
        self.last_cpu = None;
        self.last_lookup = None;
        self.idle.reset();
    }

    /// Resolve once `pid` exits, polling every `every`.
    ///
    /// The watch ends silently when `cancel` fires.
    #[must_use]
    pub fn watch_exit(
        &self,
        pid: u32,
        every: Duration,
        cancel: CancellationToken,
    ) -> oneshot::Receiver<u32> {
        let (tx, rx) = oneshot::channel();
        let probe = Arc::clone(&self.probe);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        let alive = match probe.lock() {
                            Ok(mut probe) => probe.is_alive(pid),
                            Err(_) => return,
                        };
                        if !alive {
                            let _ = tx.send(pid);
                            return;
                        }
                    }
                }
            }
        });
        rx
    }
}

impl std::fmt::Debug for ProcessMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessMonitor")
            .field("names", &self.names)
            .field("cached_pid", &self.cached_pid)
            .field("last_cpu", &self.last_cpu)
            .finish_non_exhaustive()
    }
}

/// CPU percent of total capacity between two samples.
#[allow(clippy::cast_precision_loss)]
fn cpu_percent(prev: &ProcSample, current: &ProcSample, cores: usize) -> Option<f64> {
    let wall = current
        .taken_at
        .saturating_duration_since(prev.taken_at)
        .as_secs_f64();
    if wall <= 0.0 {
        return None;
    }
    let used = (current.cpu_seconds - prev.cpu_seconds).max(0.0);
    Some(used / wall * 100.0 / cores as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessInfo;

    #[derive(Debug, Default)]
    struct FakeState {
        processes: Vec<ProcessInfo>,
        cpu_seconds: f64,
        alive: bool,
        finds: usize,
    }

    #[derive(Clone, Default)]
    struct FakeProbe(Arc<Mutex<FakeState>>);

    impl ProcessProbe for FakeProbe {
        fn find(&mut self, names: &[String]) -> Vec<ProcessInfo> {
            let mut state = self.0.lock().unwrap();
            state.finds += 1;
            state
                .processes
                .iter()
                .filter(|p| crate::process::name_matches(&p.name, names))
                .cloned()
                .collect()
        }

        fn sample(&mut self, _pid: u32) -> Option<ProcSample> {
            let state = self.0.lock().unwrap();
            state.alive.then(|| ProcSample {
                cpu_seconds: state.cpu_seconds,
                rss_bytes: 1024,
                vsz_bytes: 4096,
                state: 'S',
                taken_at: Instant::now(),
            })
        }

        fn is_alive(&mut self, _pid: u32) -> bool {
            self.0.lock().unwrap().alive
        }

        fn cpu_count(&self) -> usize {
            1
        }
    }

    fn proc(pid: u32, name: &str, start_time: u64) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: name.to_string(),
            start_time,
        }
    }

    fn monitor_with(processes: Vec<ProcessInfo>) -> (ProcessMonitor, FakeProbe) {
        let probe = FakeProbe::default();
        {
            let mut state = probe.0.lock().unwrap();
            state.processes = processes;
            state.alive = true;
        }
        let monitor = ProcessMonitor::with_probe(vec!["claude".to_string()], Box::new(probe.clone()));
        (monitor, probe)
    }

    #[test]
    fn test_prefers_newest_process() {
        let (mut monitor, _probe) =
            monitor_with(vec![proc(10, "claude", 100), proc(20, "claude", 200), proc(30, "vim", 300)]);
        assert_eq!(monitor.get_pid(), Some(20));
        assert_eq!(monitor.current_pid(), Some(20));
        assert_eq!(monitor.current_name(), Some("claude"));
    }

    #[test]
    fn test_lookup_cooldown_after_miss() {
        let (mut monitor, probe) = monitor_with(Vec::new());
        assert_eq!(monitor.get_pid(), None);
        probe.0.lock().unwrap().processes.push(proc(5, "claude", 1));
        assert_eq!(monitor.get_pid(), None);
        assert_eq!(probe.0.lock().unwrap().finds, 1);

        let mut monitor = monitor.with_lookup_cooldown(Duration::ZERO);
        assert_eq!(monitor.get_pid(), Some(5));
    }

    #[test]
    fn test_first_sample_has_no_cpu() {
        let (mut monitor, probe) = monitor_with(vec![proc(1, "claude", 1)]);
        let first = monitor.sample().unwrap();
        assert_eq!(first.cpu_percent, None);
        assert_eq!(first.rss_bytes, 1024);

        std::thread::sleep(Duration::from_millis(20));
        probe.0.lock().unwrap().cpu_seconds += 1.0;
        let second = monitor.sample().unwrap();
        assert!(second.cpu_percent.unwrap() > 100.0);
    }

    #[test]
    fn test_idle_fires_once_per_episode() {
        let (mut monitor, probe) = monitor_with(vec![proc(1, "claude", 1)]);
        let idle_for = Duration::from_millis(100);

        monitor.sample();
        assert!(!monitor.check_idle(1.0, idle_for));

        std::thread::sleep(Duration::from_millis(5));
        monitor.sample();
        assert!(!monitor.check_idle(1.0, idle_for));

        std::thread::sleep(Duration::from_millis(120));
        monitor.sample();
        assert!(monitor.check_idle(1.0, idle_for));
        assert!(!monitor.check_idle(1.0, idle_for));

        // A busy reading starts a new episode.
        std::thread::sleep(Duration::from_millis(5));
        probe.0.lock().unwrap().cpu_seconds += 5.0;
        monitor.sample();
        assert!(!monitor.check_idle(1.0, idle_for));

        std::thread::sleep(Duration::from_millis(5));
        monitor.sample();
        assert!(!monitor.check_idle(1.0, idle_for));
        std::thread::sleep(Duration::from_millis(120));
        monitor.sample();
        assert!(monitor.check_idle(1.0, idle_for));
    }

    #[test]
    fn test_dead_process_is_forgotten() {
        let (mut monitor, probe) = monitor_with(vec![proc(1, "claude", 1)]);
        assert!(monitor.sample().is_some());
        assert!(monitor.is_alive());

        probe.0.lock().unwrap().alive = false;
        assert!(!monitor.is_alive());
        assert!(monitor.sample().is_none());
        assert_eq!(monitor.current_pid(), None);
    }

    #[tokio::test]
    async fn test_watch_exit_signals_pid() {
        let (mut monitor, probe) = monitor_with(vec![proc(7, "claude", 1)]);
        let pid = monitor.get_pid().unwrap();
        let rx = monitor.watch_exit(pid, Duration::from_millis(10), CancellationToken::new());

        probe.0.lock().unwrap().alive = false;
        let exited = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
        assert_eq!(exited, 7);
    }

    #[test]
    fn test_idle_tracker_ignores_missing_readings() {
        let mut tracker = IdleTracker::default();
        let now = Instant::now();
        assert!(!tracker.observe(None, 1.0, Duration::ZERO, now));
        assert!(tracker.observe(Some(0.0), 1.0, Duration::ZERO, now));
        assert!(!tracker.observe(Some(0.0), 1.0, Duration::ZERO, now));
    }
}
