//! Fallback matcher for formats without a dedicated strategy.
//!
//! Tries well-known JSON fields first, then scans the lowercased line for
//! keywords. Priority: Holding > Awaiting > Complete > Activity.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{is_blank, parse_object, MatchSignal, Matcher, SignalKind};

/// JSON fields inspected, in order.
const FIELDS: &[&str] = &["status", "type", "role", "finish_reason", "stop_reason"];

static RE_HOLDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\b(waiting for (confirmation|approval|permission)|awaiting (approval|confirmation)|requires? approval|permission (required|requested)|do you want to (proceed|run|allow|make this edit)|allow (this|once|always))\b|\[y/n\]|\(y/n\))",
    )
    .expect("valid holding regex")
});

static RE_AWAITING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(waiting for (input|your (input|reply|response))|awaiting (input|your (input|reply|response))|ready for (input|next (task|prompt|message)))\b",
    )
    .expect("valid awaiting regex")
});

static RE_COMPLETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(done|complete|completed|finished|task complete|all set|end_turn)\b")
        .expect("valid complete regex")
});

static RE_ACTIVITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(thinking|running|executing|reading|writing|editing|searching|processing|generating|working|assistant|tool call|calling)\b",
    )
    .expect("valid activity regex")
});

/// Rank used to pick the strongest classification among several fields.
fn rank(kind: SignalKind) -> u8 {
    match kind {
        SignalKind::Holding => 3,
        SignalKind::Awaiting => 2,
        SignalKind::Complete => 1,
        SignalKind::Activity => 0,
    }
}

/// Classify a single field value.
fn classify_value(field: &str, value: &str) -> Option<SignalKind> {
    let value = value.to_ascii_lowercase();
    match value.as_str() {
        "tool_use" | "tool_calls" | "function_call" | "waiting" | "waiting_for_approval"
        | "awaiting_approval" | "awaiting_confirmation" | "requires_action" | "permission"
        | "pending_approval" | "blocked" => Some(SignalKind::Holding),
        "awaiting_input" | "waiting_for_input" | "ready" | "idle" | "input_required" => {
            Some(SignalKind::Awaiting)
        }
        "end_turn" | "stop" | "stop_sequence" | "done" | "complete" | "completed" | "finished"
        | "success" | "succeeded" => Some(SignalKind::Complete),
        "assistant" if field == "role" || field == "type" => Some(SignalKind::Activity),
        "running" | "in_progress" | "working" | "thinking" | "streaming" | "progress"
        | "message" => Some(SignalKind::Activity),
        _ => None,
    }
}

/// Matcher combining field inspection and keyword scanning.
#[derive(Debug, Clone)]
pub struct GenericMatcher {
    agent: String,
}

impl GenericMatcher {
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
        }
    }

    fn from_fields(&self, value: &Value, line: &str) -> Option<MatchSignal> {
        let (field, kind) = FIELDS
            .iter()
            .filter_map(|field| {
                let text = value.get(*field).and_then(Value::as_str)?;
                classify_value(field, text).map(|kind| (*field, kind))
            })
            .max_by_key(|(_, kind)| rank(*kind))?;

        let tool = ["tool", "tool_name", "name"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str));
        let signal = MatchSignal::new(kind, &self.agent, format!("{field} field"), line);
        Some(if kind == SignalKind::Holding {
            signal.with_tool(tool)
        } else {
            signal
        })
    }

    fn from_keywords(&self, line: &str) -> Option<MatchSignal> {
        let lower = line.to_lowercase();
        let (kind, reason) = if RE_HOLDING.is_match(&lower) {
            (SignalKind::Holding, "approval keyword")
        } else if RE_AWAITING.is_match(&lower) {
            (SignalKind::Awaiting, "input keyword")
        } else if RE_COMPLETE.is_match(&lower) {
            (SignalKind::Complete, "completion keyword")
        } else if RE_ACTIVITY.is_match(&lower) {
            (SignalKind::Activity, "activity keyword")
        } else {
            return None;
        };
        Some(MatchSignal::new(kind, &self.agent, reason, line))
    }
}

impl Matcher for GenericMatcher {
    fn name(&self) -> &str {
        "generic"
    }

    fn match_line(&self, line: &str) -> Option<MatchSignal> {
        if is_blank(line) {
            return None;
        }

        parse_object(line)
            .and_then(|value| self.from_fields(&value, line))
            .or_else(|| self.from_keywords(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(line: &str) -> Option<SignalKind> {
        GenericMatcher::new("x").match_line(line).map(|s| s.kind)
    }

    #[test]
    fn test_field_values() {
        assert_eq!(kind_of(r#"{"status":"completed"}"#), Some(SignalKind::Complete));
        assert_eq!(kind_of(r#"{"finish_reason":"stop"}"#), Some(SignalKind::Complete));
        assert_eq!(kind_of(r#"{"role":"assistant","content":"hi"}"#), Some(SignalKind::Activity));
        assert_eq!(kind_of(r#"{"status":"waiting_for_input"}"#), Some(SignalKind::Awaiting));
    }

    #[test]
    fn test_strongest_field_wins() {
        let line = r#"{"role":"assistant","stop_reason":"tool_use","tool":"Bash"}"#;
        let signal = GenericMatcher::new("x").match_line(line).unwrap();
        assert_eq!(signal.kind, SignalKind::Holding);
        assert_eq!(signal.tool(), Some("Bash"));
        assert_eq!(signal.reason, "stop_reason field");
    }

    #[test]
    fn test_json_without_known_fields_falls_back_to_keywords() {
        assert_eq!(
            kind_of(r#"{"msg":"Task complete, all tests pass"}"#),
            Some(SignalKind::Complete)
        );
        assert_eq!(kind_of(r#"{"level":"debug","msg":"tick"}"#), None);
    }

    #[test]
    fn test_keyword_priority_holding_over_complete() {
        assert_eq!(
            kind_of("Done editing. Waiting for confirmation before running tests"),
            Some(SignalKind::Holding)
        );
    }

    #[test]
    fn test_keyword_classes() {
        assert_eq!(kind_of("Apply these changes? [Y/n]"), Some(SignalKind::Holding));
        assert_eq!(kind_of("Ready for input"), Some(SignalKind::Awaiting));
        assert_eq!(kind_of("Finished in 3.2s"), Some(SignalKind::Complete));
        assert_eq!(kind_of("Thinking about the problem"), Some(SignalKind::Activity));
        assert_eq!(kind_of("INFO server started on :8080"), None);
    }

    #[test]
    fn test_keywords_respect_word_boundaries() {
        assert_eq!(kind_of("abandoned branch"), None);
        assert_eq!(kind_of("incompleteness theorem"), None);
    }
}
