//! Agent Watch - lifecycle notifications for coding-assistant CLIs.
//!
//! Tails the log files of tools such as Claude Code, Codex and Gemini CLI,
//! classifies each new line, and infers from silence whether a session
//! finished, is waiting for input, or is blocked on a tool approval.

pub mod agents;
pub mod config;
pub mod display;
pub mod matcher;
pub mod notifier;
pub mod process;
pub mod state;
pub mod watcher;
