//! Combinator trying several matchers in order.

use super::{MatchSignal, Matcher};

/// Returns the first non-empty result of its inner matchers.
pub struct ChainMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl ChainMatcher {
    #[must_use]
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// Number of chained matchers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl std::fmt::Debug for ChainMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.matchers.iter().map(|m| m.name()).collect();
        f.debug_struct("ChainMatcher").field("matchers", &names).finish()
    }
}

impl Matcher for ChainMatcher {
    fn name(&self) -> &str {
        "chain"
    }

    fn match_line(&self, line: &str) -> Option<MatchSignal> {
        self.matchers.iter().find_map(|m| m.match_line(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{GenericMatcher, OpenAiMatcher, SignalKind};

    #[test]
    fn test_first_match_wins() {
        let chain = ChainMatcher::new(vec![
            Box::new(OpenAiMatcher::new("bot")),
            Box::new(GenericMatcher::new("bot")),
        ]);
        assert_eq!(chain.len(), 2);

        // OpenAI shape handled by the first matcher.
        let signal = chain
            .match_line(r#"{"choices":[{"finish_reason":"tool_calls","message":{}}]}"#)
            .unwrap();
        assert_eq!(signal.kind, SignalKind::Holding);
        assert_eq!(signal.reason, "tool call requested");

        // Freeform text falls through to the generic matcher.
        let signal = chain.match_line("all done").unwrap();
        assert_eq!(signal.kind, SignalKind::Complete);
        assert_eq!(signal.reason, "completion keyword");
    }

    #[test]
    fn test_empty_chain_matches_nothing() {
        let chain = ChainMatcher::new(Vec::new());
        assert!(chain.is_empty());
        assert!(chain.match_line("done").is_none());
    }
}
