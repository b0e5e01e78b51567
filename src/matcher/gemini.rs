//! Gemini CLI chat files.
//!
//! Gemini writes its sessions as pretty-printed JSON documents, so a tailed
//! line is usually a fragment like `"type": "gemini",`. Whole objects on a
//! single line are parsed structurally; fragments fall back to key/value
//! patterns.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{is_blank, parse_object, MatchSignal, Matcher, SignalKind};

static RE_FINISH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""finishReason"\s*:\s*"(STOP|MAX_TOKENS)""#).expect("valid finish regex")
});

static RE_AWAITING_APPROVAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""status"\s*:\s*"(awaiting_approval|validating)""#)
        .expect("valid approval regex")
});

static RE_TOOL_CALLS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(toolCalls|functionCall)"\s*:\s*[\[{]"#).expect("valid tool regex")
});

static RE_GEMINI_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(type|role)"\s*:\s*"(gemini|model)""#).expect("valid message regex")
});

/// Matcher for Gemini CLI session JSON.
#[derive(Debug, Clone)]
pub struct GeminiMatcher {
    agent: String,
}

impl GeminiMatcher {
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
        }
    }

    fn signal(&self, kind: SignalKind, reason: &str, line: &str) -> MatchSignal {
        MatchSignal::new(kind, &self.agent, reason, line)
    }

    fn classify_object(&self, value: &Value, line: &str) -> Option<MatchSignal> {
        // Chat record: {"type": "gemini", "content": ..., "toolCalls": [...]}
        if value.get("type").and_then(Value::as_str) == Some("gemini") {
            let tool = value
                .get("toolCalls")
                .and_then(Value::as_array)
                .and_then(|calls| calls.first())
                .and_then(|call| call.get("name"))
                .and_then(Value::as_str);
            return Some(match tool {
                Some(name) => self
                    .signal(SignalKind::Holding, "tool call requested", line)
                    .with_tool(Some(name)),
                None => self.signal(SignalKind::Activity, "gemini message", line),
            });
        }

        // API response: {"candidates": [{"content": {"parts": [...]}, "finishReason": "STOP"}]}
        let candidate = value
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|c| c.first())?;
        let function = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .and_then(|parts| {
                parts
                    .iter()
                    .find_map(|part| part.pointer("/functionCall/name").and_then(Value::as_str))
            });

        if let Some(name) = function {
            return Some(
                self.signal(SignalKind::Holding, "function call requested", line)
                    .with_tool(Some(name)),
            );
        }
        match candidate.get("finishReason").and_then(Value::as_str) {
            Some("STOP" | "MAX_TOKENS") => {
                Some(self.signal(SignalKind::Complete, "generation finished", line))
            }
            _ => Some(self.signal(SignalKind::Activity, "generation chunk", line)),
        }
    }

    fn classify_fragment(&self, line: &str) -> Option<MatchSignal> {
        if RE_AWAITING_APPROVAL.is_match(line) {
            return Some(self.signal(SignalKind::Holding, "tool awaiting approval", line));
        }
        if RE_TOOL_CALLS.is_match(line) {
            return Some(self.signal(SignalKind::Holding, "tool call requested", line));
        }
        if RE_FINISH.is_match(line) {
            return Some(self.signal(SignalKind::Complete, "generation finished", line));
        }
        if RE_GEMINI_MESSAGE.is_match(line) {
            return Some(self.signal(SignalKind::Activity, "gemini message", line));
        }
        None
    }
}

impl Matcher for GeminiMatcher {
    fn name(&self) -> &str {
        "gemini"
    }

    fn match_line(&self, line: &str) -> Option<MatchSignal> {
        if is_blank(line) {
            return None;
        }

        match parse_object(line) {
            Some(value) => self.classify_object(&value, line),
            None => self.classify_fragment(line),
        }
    }
}
