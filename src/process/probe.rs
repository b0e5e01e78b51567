//! OS process inspection.

use std::time::Instant;

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, System};

/// A process whose name matched one of the candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Start time in seconds since the epoch.
    pub start_time: u64,
}

/// Resource counters for one process at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcSample {
    /// Cumulative CPU time (user + system) in seconds.
    pub cpu_seconds: f64,
    pub rss_bytes: u64,
    pub vsz_bytes: u64,
    /// Run state letter as reported by `ps` (`R`, `S`, `Z`, ...).
    pub state: char,
    pub taken_at: Instant,
}

/// Source of process information.
pub trait ProcessProbe: Send {
    /// Processes whose name contains any of `names` (case-insensitive).
    fn find(&mut self, names: &[String]) -> Vec<ProcessInfo>;

    /// Current counters for `pid`, or `None` if it is gone.
    fn sample(&mut self, pid: u32) -> Option<ProcSample>;

    fn is_alive(&mut self, pid: u32) -> bool;

    /// Logical CPUs used to normalize CPU percentages.
    fn cpu_count(&self) -> usize;
}

/// Whether `process_name` contains any candidate, ignoring case.
#[must_use]
pub fn name_matches(process_name: &str, candidates: &[String]) -> bool {
    let lower = process_name.to_lowercase();
    candidates
        .iter()
        .filter(|c| !c.is_empty())
        .any(|c| lower.contains(&c.to_lowercase()))
}

/// Probe backed by `sysinfo`, reading exact CPU ticks from `/proc` on Linux.
pub struct SystemProbe {
    system: System,
    cores: usize,
    #[cfg(not(target_os = "linux"))]
    accumulated: std::collections::HashMap<u32, (f64, Instant)>,
}

impl SystemProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new(),
            cores: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            #[cfg(not(target_os = "linux"))]
            accumulated: std::collections::HashMap::new(),
        }
    }

    /// Cumulative CPU seconds and state letter from `/proc`.
    #[cfg(target_os = "linux")]
    fn cpu_and_state(
        &mut self,
        pid: u32,
        _usage_percent: f32,
        _status: ProcessStatus,
        _now: Instant,
    ) -> Option<(f64, char)> {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        let (state, ticks) = parse_proc_stat(&stat)?;
        let hz = nix::unistd::sysconf(nix::unistd::SysconfVar::CLK_TCK)
            .ok()
            .flatten()
            .filter(|hz| *hz > 0)
            .unwrap_or(100);
        #[allow(clippy::cast_precision_loss)]
        Some((ticks as f64 / hz as f64, state))
    }

    /// Integrate sysinfo's instantaneous usage into cumulative seconds.
    #[cfg(not(target_os = "linux"))]
    fn cpu_and_state(
        &mut self,
        pid: u32,
        usage_percent: f32,
        status: ProcessStatus,
        now: Instant,
    ) -> Option<(f64, char)> {
        let entry = self.accumulated.entry(pid).or_insert((0.0, now));
        let elapsed = now.saturating_duration_since(entry.1).as_secs_f64();
        entry.0 += f64::from(usage_percent) / 100.0 * elapsed;
        entry.1 = now;
        Some((entry.0, status_letter(status)))
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemProbe")
            .field("cores", &self.cores)
            .finish_non_exhaustive()
    }
}

impl ProcessProbe for SystemProbe {
    fn find(&mut self, names: &[String]) -> Vec<ProcessInfo> {
        self.system
            .refresh_processes_specifics(ProcessRefreshKind::new());
        self.system
            .processes()
            .iter()
            .filter(|(_, process)| name_matches(process.name(), names))
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                start_time: process.start_time(),
            })
            .collect()
    }

    fn sample(&mut self, pid: u32) -> Option<ProcSample> {
        let sys_pid = Pid::from_u32(pid);
        let refresh = ProcessRefreshKind::new().with_cpu().with_memory();
        if !self.system.refresh_process_specifics(sys_pid, refresh) {
            return None;
        }
        let (usage, status, rss_bytes, vsz_bytes) = {
            let process = self.system.process(sys_pid)?;
            (
                process.cpu_usage(),
                process.status(),
                process.memory(),
                process.virtual_memory(),
            )
        };
        let now = Instant::now();
        let (cpu_seconds, state) = self.cpu_and_state(pid, usage, status, now)?;
        Some(ProcSample {
            cpu_seconds,
            rss_bytes,
            vsz_bytes,
            state,
            taken_at: now,
        })
    }

    fn is_alive(&mut self, pid: u32) -> bool {
        let sys_pid = Pid::from_u32(pid);
        if !self
            .system
            .refresh_process_specifics(sys_pid, ProcessRefreshKind::new())
        {
            return false;
        }
        self.system
            .process(sys_pid)
            .is_some_and(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
    }

    fn cpu_count(&self) -> usize {
        self.cores
    }
}

/// `ps`-style letter for a sysinfo status.
#[must_use]
pub fn status_letter(status: ProcessStatus) -> char {
    match status {
        ProcessStatus::Run => 'R',
        ProcessStatus::Sleep => 'S',
        ProcessStatus::Idle => 'I',
        ProcessStatus::Stop => 'T',
        ProcessStatus::Zombie => 'Z',
        ProcessStatus::Dead => 'X',
        ProcessStatus::UninterruptibleDiskSleep => 'D',
        _ => '?',
    }
}

/// State letter and `utime + stime` ticks from a `/proc/<pid>/stat` line.
///
/// The command name may contain spaces and parentheses, so fields are
/// counted from the last `)`.
#[must_use]
pub fn parse_proc_stat(stat: &str) -> Option<(char, u64)> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    let mut fields = after_comm.split_whitespace();
    let state = fields.next()?.chars().next()?;
    // ppid pgrp session tty_nr tpgid flags minflt cminflt majflt cmajflt utime stime
    let utime: u64 = fields.nth(10)?.parse().ok()?;
    let stime: u64 = fields.next()?.parse().ok()?;
    Some((state, utime + stime))
}
