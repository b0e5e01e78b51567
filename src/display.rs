//! Colored terminal output.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::agents::Agent;
use crate::notifier::{EventKind, Notification};

/// Current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate to at most `max_len` characters, adding an ellipsis if cut.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

fn label(kind: EventKind) -> String {
    let tag = format!("[{}]", kind.title().to_uppercase());
    match kind {
        EventKind::Complete | EventKind::Cooling => tag.green().bold().to_string(),
        EventKind::Holding => tag.yellow().bold().to_string(),
        EventKind::Awaiting => tag.cyan().bold().to_string(),
        EventKind::Idle => tag.blue().bold().to_string(),
        EventKind::Exited => tag.red().bold().to_string(),
    }
}

/// Print one notification.
pub fn print_notification(n: &Notification, raw_mode: bool) {
    println!(
        "{} {} {} {}",
        n.timestamp
            .format("%Y-%m-%dT%H:%M:%S%.6fZ")
            .to_string()
            .dimmed(),
        label(n.kind),
        n.display_name.bold(),
        n.message
    );
    if let Some(snippet) = &n.snippet {
        println!("    {}", truncate(snippet, 120, raw_mode).dimmed());
    }
    let _ = io::stdout().flush();
}

/// Print the agent being watched at startup.
pub fn print_watch_start(agent: &Agent, mode: &str) {
    let path = agent.log_path.display().to_string();
    let path = if agent.log_path_exists() {
        path.cyan().to_string()
    } else {
        format!("{} (missing)", path.yellow())
    };
    println!(
        "{} {} {} {} mode={}",
        timestamp().dimmed(),
        "[WATCH]".blue().bold(),
        agent.display_name.bold(),
        path,
        mode
    );
    let _ = io::stdout().flush();
}

/// Print one row of the agent listing.
pub fn print_agent_row(agent: &Agent) {
    let status = if agent.log_path_exists() {
        "found".green().to_string()
    } else {
        "missing".dimmed().to_string()
    };
    println!(
        "{:<10} {:<14} {:<8} {}",
        agent.name.bold(),
        agent.display_name,
        status,
        agent.log_path.display()
    );
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate("hello", 10, false), "hello");
        assert_eq!(truncate("hello", 5, false), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("hello world", 8, false), "hello...");
    }

    #[test]
    fn test_truncate_very_short_max() {
        assert_eq!(truncate("hello", 3, false), "...");
        assert_eq!(truncate("hello", 0, false), "...");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("héllo wörld", 8, false), "héllo...");
    }

    #[test]
    fn test_truncate_raw_mode_no_truncation() {
        let long_string = "a".repeat(200);
        assert_eq!(truncate(&long_string, 10, true), long_string);
    }
}
