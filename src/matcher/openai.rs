//! OpenAI-style chat completion payloads (`choices` arrays).

use serde_json::Value;

use super::{is_blank, parse_object, MatchSignal, Matcher, SignalKind};

/// Matcher for logged chat-completion responses and stream chunks.
#[derive(Debug, Clone)]
pub struct OpenAiMatcher {
    agent: String,
}

impl OpenAiMatcher {
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
        }
    }
}

/// First tool name in a `message` or `delta` object.
fn tool_name(body: &Value) -> Option<&str> {
    body.get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .and_then(|call| call.pointer("/function/name"))
        .or_else(|| body.pointer("/function_call/name"))
        .and_then(Value::as_str)
}

impl Matcher for OpenAiMatcher {
    fn name(&self) -> &str {
        "openai"
    }

    fn match_line(&self, line: &str) -> Option<MatchSignal> {
        if is_blank(line) {
            return None;
        }

        // Server-sent event framing.
        let payload = line.trim().strip_prefix("data:").unwrap_or(line).trim();
        let value = parse_object(payload)?;

        if value.get("type").and_then(Value::as_str) == Some("response.completed") {
            return Some(MatchSignal::new(
                SignalKind::Complete,
                &self.agent,
                "response completed",
                line,
            ));
        }

        let choice = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())?;
        let body = choice.get("message").or_else(|| choice.get("delta"));
        let tool = body.and_then(tool_name);

        match choice.get("finish_reason").and_then(Value::as_str) {
            Some("tool_calls" | "function_call") => Some(
                MatchSignal::new(SignalKind::Holding, &self.agent, "tool call requested", line)
                    .with_tool(tool),
            ),
            Some("stop" | "length" | "content_filter") => Some(MatchSignal::new(
                SignalKind::Complete,
                &self.agent,
                "completion finished",
                line,
            )),
            _ if tool.is_some() => Some(
                MatchSignal::new(SignalKind::Holding, &self.agent, "tool call streaming", line)
                    .with_tool(tool),
            ),
            _ if body.is_some() => Some(MatchSignal::new(
                SignalKind::Activity,
                &self.agent,
                "completion chunk",
                line,
            )),
            _ => None,
        }
    }
}
