//! Log file discovery.
//!
//! Finds the most recently modified log files under an agent's base path.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::agents::Agent;

/// Extensions considered log-like.
pub const LOG_EXTENSIONS: &[&str] = &["log", "txt", "json", "jsonl"];

/// Whether `path` has a recognized log extension.
#[must_use]
pub fn is_log_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| LOG_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Compile filename glob patterns, skipping invalid ones.
#[must_use]
pub fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "Ignoring invalid file pattern");
                None
            }
        })
        .collect()
}

fn matches_any(path: &Path, patterns: &[glob::Pattern]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| patterns.iter().any(|p| p.matches(name)))
}

/// Find up to `max_files` log files under `base`, newest first.
///
/// A `base` that is itself a file is returned as-is. A missing base yields
/// an empty list. Walks at most `max_depth` levels below `base`.
#[must_use]
pub fn scan_log_files(
    base: &Path,
    patterns: &[glob::Pattern],
    max_depth: usize,
    max_files: usize,
) -> Vec<PathBuf> {
    if base.is_file() {
        return vec![base.to_path_buf()];
    }
    if !base.is_dir() {
        return Vec::new();
    }

    let mut found: Vec<(PathBuf, SystemTime)> = WalkDir::new(base)
        .min_depth(1)
        .max_depth(max_depth.max(1))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_log_file(e.path()) && matches_any(e.path(), patterns))
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            Some((e.into_path(), modified))
        })
        .collect();

    found.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    found.truncate(max_files);
    found.into_iter().map(|(path, _)| path).collect()
}

/// Convert a project path to the directory name Claude Code uses for it.
///
/// ```
/// use std::path::Path;
/// use agent_watch::watcher::project_path_hash;
///
/// assert_eq!(project_path_hash(Path::new("/home/user/project")), "-home-user-project");
/// ```
#[must_use]
pub fn project_path_hash(project_path: &Path) -> String {
    project_path.to_string_lossy().replace('/', "-")
}

/// Best-effort project label for a hashed project directory name.
///
/// Strips the hashed home directory when present, otherwise keeps the last
/// dash-separated segment.
fn project_label(hashed: &str, home: Option<&Path>) -> Option<String> {
    let rest = home
        .map(project_path_hash)
        .and_then(|home| {
            hashed
                .strip_prefix(home.as_str())
                .filter(|rest| rest.is_empty() || rest.starts_with('-'))
                .map(str::to_string)
        })
        .map_or_else(
            || hashed.rsplit('-').next().unwrap_or_default().to_string(),
            |rest| rest.trim_start_matches('-').to_string(),
        );
    (!rest.is_empty()).then_some(rest)
}

/// Human-readable name for one log instance of `agent`.
///
/// Claude Code sessions are labelled with their project, other logs with
/// the file stem.
#[must_use]
pub fn instance_display_name(agent: &Agent, path: &Path) -> String {
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .filter(|n| n.starts_with('-'));

    let label = parent
        .and_then(|hashed| project_label(hashed, dirs::home_dir().as_deref()))
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        });

    match label {
        Some(label) => format!("{} [{label}]", agent.display_name),
        None => agent.display_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn touch(path: &Path, mtime: i64) {
        std::fs::write(path, "x\n").unwrap();
        set_file_mtime(path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    #[test]
    fn test_project_path_hash_simple() {
        assert_eq!(project_path_hash(Path::new("/home/user/project")), "-home-user-project");
        assert_eq!(project_path_hash(Path::new("/")), "-");
    }

    #[test]
    fn test_is_log_file() {
        assert!(is_log_file(Path::new("a.jsonl")));
        assert!(is_log_file(Path::new("a.LOG")));
        assert!(is_log_file(Path::new("dir/a.txt")));
        assert!(!is_log_file(Path::new("a.md")));
        assert!(!is_log_file(Path::new("jsonl")));
    }

    #[test]
    fn test_scan_keeps_newest_files() {
        let dir = TempDir::new().unwrap();
        for (i, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            let mtime = 1_700_000_000 + i64::try_from(i).unwrap() * 60;
            touch(&dir.path().join(format!("{name}.log")), mtime);
        }

        let files = scan_log_files(dir.path(), &[], 3, 3);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["e.log", "d.log", "c.log"]);
    }

    #[test]
    fn test_scan_filters_extensions_and_patterns() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("rollout-1.jsonl"), 1_700_000_000);
        touch(&dir.path().join("other.jsonl"), 1_700_000_001);
        touch(&dir.path().join("notes.md"), 1_700_000_002);

        assert_eq!(scan_log_files(dir.path(), &[], 3, 10).len(), 2);

        let patterns = compile_patterns(&["rollout-*.jsonl".to_string()]);
        let files = scan_log_files(dir.path(), &patterns, 3, 10);
        assert_eq!(files, vec![dir.path().join("rollout-1.jsonl")]);
    }

    #[test]
    fn test_scan_respects_depth() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&deep).unwrap();
        touch(&dir.path().join("a").join("shallow.log"), 1_700_000_000);
        touch(&deep.join("deep.log"), 1_700_000_001);

        let files = scan_log_files(dir.path(), &[], 2, 10);
        assert_eq!(files, vec![dir.path().join("a").join("shallow.log")]);

        assert_eq!(scan_log_files(dir.path(), &[], 4, 10).len(), 2);
    }

    #[test]
    fn test_scan_single_file_and_missing_base() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("agent.out");
        touch(&file, 1_700_000_000);
        assert_eq!(scan_log_files(&file, &[], 3, 5), vec![file]);
        assert!(scan_log_files(&dir.path().join("nope"), &[], 3, 5).is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let patterns = compile_patterns(&["[".to_string(), "*.log".to_string()]);
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn test_project_label() {
        let home = Path::new("/home/user");
        assert_eq!(
            project_label("-home-user-my-project", Some(home)).as_deref(),
            Some("my-project")
        );
        assert_eq!(project_label("-srv-app", Some(home)).as_deref(), Some("app"));
        assert_eq!(project_label("-home-user", Some(home)), None);
    }

    #[test]
    fn test_instance_display_name_uses_file_stem() {
        let agent = crate::agents::builtin_agents()
            .into_iter()
            .find(|a| a.name == "codex")
            .unwrap();
        let name = instance_display_name(&agent, Path::new("/x/sessions/rollout-42.jsonl"));
        assert_eq!(name, format!("{} [rollout-42]", agent.display_name));
    }
}
