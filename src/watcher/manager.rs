//! Per-agent set of tailed log files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::agents::Agent;
use crate::config::WatchConfig;

use super::discovery::{compile_patterns, scan_log_files};
use super::tailer::Tailer;

/// Limits applied when discovering an agent's log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub max_files: usize,
    pub max_depth: usize,
    /// How long a directory scan is reused.
    pub cache_ttl: Duration,
    /// Read newly opened files from the beginning instead of the end.
    pub from_start: bool,
}

impl ScanOptions {
    #[must_use]
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_depth: config.max_depth,
            cache_ttl: config.scan_cache_ttl(),
            from_start: config.from_start,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&WatchConfig::default())
    }
}

#[derive(Debug)]
struct ScanCache {
    files: Vec<PathBuf>,
    scanned_at: Instant,
}

/// Owns one [`Tailer`] per interesting file of one agent.
#[derive(Debug)]
pub struct TailerManager {
    agent: String,
    base_path: PathBuf,
    patterns: Vec<glob::Pattern>,
    options: ScanOptions,
    scan_cache: Option<ScanCache>,
    tailers: BTreeMap<PathBuf, Tailer>,
    base_missing: bool,
}

impl TailerManager {
    #[must_use]
    pub fn new(agent: &Agent, options: ScanOptions) -> Self {
        Self {
            agent: agent.name.clone(),
            base_path: agent.log_path.clone(),
            patterns: compile_patterns(&agent.patterns),
            options,
            scan_cache: None,
            tailers: BTreeMap::new(),
            base_missing: false,
        }
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Whether `path` lives under this manager's base path.
    #[must_use]
    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(&self.base_path)
    }

    /// Directory to register with the filesystem watcher, if it exists.
    #[must_use]
    pub fn watch_target(&self) -> Option<PathBuf> {
        if self.base_path.is_dir() {
            Some(self.base_path.clone())
        } else if self.base_path.is_file() {
            self.base_path.parent().map(Path::to_path_buf)
        } else {
            None
        }
    }

    /// Files currently being tailed.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.tailers.keys().cloned().collect()
    }

    /// Force the next refresh to rescan the filesystem.
    pub fn invalidate_cache(&mut self) {
        self.scan_cache = None;
    }

    /// Reconcile open tailers with the current set of interesting files.
    ///
    /// Returns the desired file list, newest first.
    pub fn refresh_files(&mut self) -> Vec<PathBuf> {
        let desired = self.scan();

        self.tailers.retain(|path, _| {
            let keep = desired.contains(path);
            if !keep {
                tracing::debug!(path = %path.display(), "Stopped tailing file");
            }
            keep
        });

        for path in &desired {
            if !self.tailers.contains_key(path) {
                tracing::debug!(agent = %self.agent, path = %path.display(), "Tailing file");
                let tailer = Tailer::new(path.clone(), !self.options.from_start);
                self.tailers.insert(path.clone(), tailer);
            }
        }

        desired
    }

    /// Read new lines from every tailer.
    ///
    /// A tailer that fails is reset and skipped until the next call.
    pub async fn read_all_new(&mut self) -> BTreeMap<PathBuf, Vec<String>> {
        let mut out = BTreeMap::new();
        let mut stale = false;

        for (path, tailer) in &mut self.tailers {
            match tailer.read_new_lines().await {
                Ok(lines) if !lines.is_empty() => {
                    out.insert(path.clone(), lines);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Read failed, resetting tailer");
                    tailer.reset();
                    stale = true;
                }
            }
        }

        if stale {
            self.invalidate_cache();
        }
        out
    }

    /// Drop every tailer and the scan cache.
    pub fn close(&mut self) {
        self.tailers.clear();
        self.scan_cache = None;
    }

    fn scan(&mut self) -> Vec<PathBuf> {
        if let Some(cache) = &self.scan_cache {
            if cache.scanned_at.elapsed() < self.options.cache_ttl {
                return cache.files.clone();
            }
        }

        let exists = self.base_path.exists();
        if !exists && !self.base_missing {
            tracing::warn!(
                agent = %self.agent,
                path = %self.base_path.display(),
                "Log path does not exist yet"
            );
        } else if exists && self.base_missing {
            tracing::info!(agent = %self.agent, path = %self.base_path.display(), "Log path appeared");
        }
        self.base_missing = !exists;

        let files = scan_log_files(
            &self.base_path,
            &self.patterns,
            self.options.max_depth,
            self.options.max_files,
        );
        self.scan_cache = Some(ScanCache {
            files: files.clone(),
            scanned_at: Instant::now(),
        });
        files
    }
}
