//! Log tailing and the watch loop.
//!
//! Discovers each agent's recent log files, tails them incrementally and
//! drives matching, state updates and notifications.

mod agent_watcher;
mod discovery;
mod error;
mod manager;
mod tailer;

pub use agent_watcher::{ScheduleMode, Watcher, DEBOUNCE, QUIET_SWEEP_INTERVAL};
pub use discovery::{
    compile_patterns, instance_display_name, is_log_file, project_path_hash, scan_log_files,
    LOG_EXTENSIONS,
};
pub use error::WatcherError;
pub use manager::{ScanOptions, TailerManager};
pub use tailer::{Tailer, READ_CHUNK_SIZE};
