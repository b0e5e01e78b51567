//! Codex CLI rollout JSONL.
//!
//! Rollout lines wrap an item in `{"type": ..., "payload": {...}}`; older
//! versions wrote the item directly. Both shapes are accepted.

use serde_json::Value;

use super::{is_blank, parse_object, MatchSignal, Matcher, SignalKind};

/// Matcher for Codex session rollouts.
#[derive(Debug, Clone)]
pub struct CodexMatcher {
    agent: String,
}

impl CodexMatcher {
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
        }
    }

    fn signal(&self, kind: SignalKind, reason: impl Into<String>, line: &str) -> MatchSignal {
        MatchSignal::new(kind, &self.agent, reason, line)
    }

    fn classify(&self, item: &Value, line: &str) -> Option<MatchSignal> {
        let item_type = item.get("type").and_then(Value::as_str)?;

        match item_type {
            "task_complete" | "turn_complete" => {
                Some(self.signal(SignalKind::Complete, "task complete", line))
            }
            "exec_approval_request" => {
                let tool = item
                    .get("command")
                    .and_then(Value::as_array)
                    .and_then(|argv| argv.first())
                    .and_then(Value::as_str)
                    .unwrap_or("shell");
                Some(
                    self.signal(
                        SignalKind::Holding,
                        format!("command approval requested: {tool}"),
                        line,
                    )
                    .with_tool(Some(tool)),
                )
            }
            "apply_patch_approval_request" => Some(
                self.signal(SignalKind::Holding, "patch approval requested", line)
                    .with_tool(Some("apply_patch")),
            ),
            "function_call" | "custom_tool_call" | "local_shell_call" => {
                let tool = item.get("name").and_then(Value::as_str).unwrap_or("shell");
                Some(
                    self.signal(SignalKind::Holding, format!("tool call: {tool}"), line)
                        .with_tool(Some(tool)),
                )
            }
            "message" => match item.get("role").and_then(Value::as_str) {
                Some("assistant") => {
                    Some(self.signal(SignalKind::Activity, "assistant message", line))
                }
                _ => None,
            },
            "agent_message" | "agent_reasoning" | "reasoning" | "function_call_output"
            | "exec_command_begin" | "exec_command_end" | "task_started" => Some(self.signal(
                SignalKind::Activity,
                format!("agent event: {item_type}"),
                line,
            )),
            _ => None,
        }
    }
}

impl Matcher for CodexMatcher {
    fn name(&self) -> &str {
        "codex"
    }

    fn match_line(&self, line: &str) -> Option<MatchSignal> {
        if is_blank(line) {
            return None;
        }

        let value = parse_object(line)?;
        let item = value
            .get("payload")
            .filter(|payload| payload.is_object())
            .unwrap_or(&value);

        self.classify(item, line)
    }
}
