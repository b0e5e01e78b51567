//! Optional OS process tracking used as a secondary idle signal.

mod monitor;
mod probe;

pub use monitor::{IdleTracker, ProcStats, ProcessMonitor, DEFAULT_LOOKUP_COOLDOWN};
pub use probe::{
    name_matches, parse_proc_stat, status_letter, ProcSample, ProcessInfo, ProcessProbe, SystemProbe,
};
