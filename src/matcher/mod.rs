//! Per-format log line classification.
//!
//! Each supported assistant writes a different log shape, so each gets its
//! own [`Matcher`]. All of them follow the same policy: blank lines never
//! match, structured (JSON) parsing is tried before keyword heuristics,
//! completion markers map to [`SignalKind::Complete`], tool invocations to
//! [`SignalKind::Holding`], and other assistant output to
//! [`SignalKind::Activity`].

mod chain;
mod claude;
mod codex;
mod gemini;
mod generic;
mod openai;
mod signal;

pub use chain::ChainMatcher;
pub use claude::ClaudeMatcher;
pub use codex::CodexMatcher;
pub use gemini::GeminiMatcher;
pub use generic::GenericMatcher;
pub use openai::OpenAiMatcher;
pub use signal::{MatchSignal, SignalKind, META_TOOL};

use crate::agents::Agent;

/// Classifies single log lines into lifecycle signals.
pub trait Matcher: Send + Sync {
    /// Short name of the strategy, for logging.
    fn name(&self) -> &str;

    /// Classify one line. Returns `None` when the line carries no cue.
    fn match_line(&self, line: &str) -> Option<MatchSignal>;
}

type MatcherCtor = fn(&str) -> Box<dyn Matcher>;

/// Format name to constructor. Unlisted formats get [`GenericMatcher`].
const REGISTRY: &[(&str, MatcherCtor)] = &[
    ("claude", claude_matcher),
    ("codex", codex_matcher),
    ("openai", openai_matcher),
    ("gemini", gemini_matcher),
    ("generic", generic_matcher),
    ("auto", auto_matcher),
];

fn claude_matcher(agent: &str) -> Box<dyn Matcher> {
    Box::new(ClaudeMatcher::new(agent))
}

// Codex writes its own rollout events but may also log raw API responses.
fn codex_matcher(agent: &str) -> Box<dyn Matcher> {
    Box::new(ChainMatcher::new(vec![
        Box::new(CodexMatcher::new(agent)),
        Box::new(OpenAiMatcher::new(agent)),
    ]))
}

fn openai_matcher(agent: &str) -> Box<dyn Matcher> {
    Box::new(OpenAiMatcher::new(agent))
}

fn gemini_matcher(agent: &str) -> Box<dyn Matcher> {
    Box::new(GeminiMatcher::new(agent))
}

fn generic_matcher(agent: &str) -> Box<dyn Matcher> {
    Box::new(GenericMatcher::new(agent))
}

// Output of an arbitrary wrapped command.
fn auto_matcher(agent: &str) -> Box<dyn Matcher> {
    Box::new(ChainMatcher::new(vec![
        Box::new(OpenAiMatcher::new(agent)),
        Box::new(GenericMatcher::new(agent)),
    ]))
}

/// Build the matcher for a format name, attributing signals to `agent_name`.
#[must_use]
pub fn for_format(format: &str, agent_name: &str) -> Box<dyn Matcher> {
    let ctor = REGISTRY
        .iter()
        .find(|(name, _)| *name == format)
        .map_or(generic_matcher as MatcherCtor, |&(_, ctor)| ctor);
    ctor(agent_name)
}

/// Build the matcher for an agent descriptor.
#[must_use]
pub fn for_agent(agent: &Agent) -> Box<dyn Matcher> {
    for_format(&agent.format, &agent.name)
}

/// Whether a line is empty or whitespace only.
pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Parse a line as a JSON object, if it looks like one.
pub(crate) fn parse_object(line: &str) -> Option<serde_json::Value> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .filter(serde_json::Value::is_object)
}
