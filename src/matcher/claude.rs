//! Claude Code session JSONL.
//!
//! Parses `~/.claude/projects/<hash>/*.jsonl` lines. Only the fields needed
//! for classification are modeled, and all of them are optional so partial
//! or newer-version entries still deserialize.

use serde::de::IgnoredAny;
use serde::Deserialize;

use super::{is_blank, MatchSignal, Matcher, SignalKind};

/// A single line in a Claude Code conversation file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClaudeLine {
    Assistant {
        #[serde(default)]
        message: AssistantMessage,
    },
    User {
        #[serde(default)]
        message: Option<UserMessage>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    content: MessageContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct UserMessage {
    #[serde(default)]
    content: MessageContent,
}

/// Message content - structured blocks, or anything else (plain text).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Blocks(Vec<ContentBlock>),
    Other(IgnoredAny),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Blocks(Vec::new())
    }
}

impl MessageContent {
    fn blocks(&self) -> &[ContentBlock] {
        match self {
            Self::Other(_) => &[],
            Self::Blocks(blocks) => blocks,
        }
    }

    fn first_tool_use(&self) -> Option<&str> {
        self.blocks().iter().find_map(|block| match block {
            ContentBlock::ToolUse { name } => Some(name.as_str()),
            _ => None,
        })
    }

    fn has_tool_result(&self) -> bool {
        self.blocks()
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolResult))
    }
}

/// A content block within a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse {
        #[serde(default)]
        name: String,
    },
    ToolResult,
    #[serde(other)]
    Unknown,
}

/// Matcher for Claude Code conversation logs.
#[derive(Debug, Clone)]
pub struct ClaudeMatcher {
    agent: String,
}

impl ClaudeMatcher {
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
        }
    }

    fn classify_assistant(&self, message: &AssistantMessage, line: &str) -> MatchSignal {
        let stop_reason = message.stop_reason.as_deref();
        let tool = message.content.first_tool_use();

        match (stop_reason, tool) {
            (Some("end_turn" | "stop_sequence"), _) => {
                MatchSignal::new(SignalKind::Complete, &self.agent, "turn finished", line)
            }
            (Some("tool_use"), _) | (_, Some(_)) => {
                let reason = tool.map_or_else(
                    || "tool use requested".to_string(),
                    |name| format!("tool use requested: {name}"),
                );
                MatchSignal::new(SignalKind::Holding, &self.agent, reason, line).with_tool(tool)
            }
            (Some("max_tokens"), _) => MatchSignal::new(
                SignalKind::Complete,
                &self.agent,
                "response hit token limit",
                line,
            ),
            _ => MatchSignal::new(SignalKind::Activity, &self.agent, "assistant output", line),
        }
    }
}

impl Matcher for ClaudeMatcher {
    fn name(&self) -> &str {
        "claude"
    }

    fn match_line(&self, line: &str) -> Option<MatchSignal> {
        if is_blank(line) {
            return None;
        }

        let parsed = match serde_json::from_str::<ClaudeLine>(line.trim()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::trace!(error = %e, "Line is not a Claude entry");
                return None;
            }
        };

        match parsed {
            ClaudeLine::Assistant { message } => Some(self.classify_assistant(&message, line)),
            ClaudeLine::User {
                message: Some(message),
            } if message.content.has_tool_result() => Some(MatchSignal::new(
                SignalKind::Activity,
                &self.agent,
                "tool result received",
                line,
            )),
            ClaudeLine::User { .. } | ClaudeLine::Other => None,
        }
    }
}
