//! Built-in agent registry.

use crate::config::{ConfigError, WatchConfig};

use super::Agent;

/// Static description of a supported assistant.
#[derive(Debug, Clone, Copy)]
pub struct AgentSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub log_path: &'static str,
    pub patterns: &'static [&'static str],
    pub process_names: &'static [&'static str],
}

/// Assistants known out of the box.
pub static BUILTIN_AGENTS: &[AgentSpec] = &[
    AgentSpec {
        name: "claude",
        display_name: "Claude Code",
        log_path: "~/.claude/projects",
        patterns: &["*.jsonl"],
        process_names: &["claude"],
    },
    AgentSpec {
        name: "codex",
        display_name: "Codex",
        log_path: "~/.codex/sessions",
        patterns: &["rollout-*.jsonl"],
        process_names: &["codex"],
    },
    AgentSpec {
        name: "gemini",
        display_name: "Gemini CLI",
        log_path: "~/.gemini/tmp",
        patterns: &["*.json"],
        process_names: &["gemini"],
    },
    AgentSpec {
        name: "aider",
        display_name: "Aider",
        log_path: "~/.aider",
        patterns: &["*.log", "*.txt"],
        process_names: &["aider"],
    },
    AgentSpec {
        name: "opencode",
        display_name: "OpenCode",
        log_path: "~/.local/share/opencode/log",
        patterns: &["*.log"],
        process_names: &["opencode"],
    },
];

/// Look up a built-in agent by name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static AgentSpec> {
    BUILTIN_AGENTS.iter().find(|spec| spec.name == name)
}

/// All built-in agents with their default locations resolved.
#[must_use]
pub fn builtin_agents() -> Vec<Agent> {
    BUILTIN_AGENTS.iter().map(Agent::from_spec).collect()
}

/// Resolve the agents selected by a config into descriptors.
///
/// Built-in names pick up any `[paths]` override; custom agents are
/// matched by name as well. Duplicate names are collapsed.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownAgent`] if a selected name is neither
/// built in nor defined under `custom_agents`.
pub fn resolve_agents(config: &WatchConfig) -> Result<Vec<Agent>, ConfigError> {
    let mut agents: Vec<Agent> = Vec::new();

    for name in &config.agents {
        if agents.iter().any(|a| &a.name == name) {
            continue;
        }

        let agent = if let Some(custom) = config.custom_agents.iter().find(|c| &c.name == name) {
            custom.to_agent()
        } else if let Some(spec) = lookup(name) {
            let agent = Agent::from_spec(spec);
            match config.paths.get(name) {
                Some(path) => agent.with_log_path(path),
                None => agent,
            }
        } else {
            return Err(ConfigError::UnknownAgent(name.clone()));
        };

        tracing::debug!(
            agent = %agent.name,
            path = %agent.log_path.display(),
            "Resolved agent"
        );
        agents.push(agent);
    }

    Ok(agents)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::CustomAgent;

    #[test]
    fn test_builtin_names_unique() {
        let mut names: Vec<_> = BUILTIN_AGENTS.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), BUILTIN_AGENTS.len());
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(lookup("codex").unwrap().display_name, "Codex");
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_resolve_default_config() {
        let agents = resolve_agents(&WatchConfig::default()).unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "claude");
    }

    #[test]
    fn test_resolve_with_path_override() {
        let mut config = WatchConfig {
            agents: vec!["codex".to_string(), "codex".to_string()],
            ..Default::default()
        };
        config
            .paths
            .insert("codex".to_string(), "/tmp/codex-logs".to_string());

        let agents = resolve_agents(&config).unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].log_path, PathBuf::from("/tmp/codex-logs"));
    }

    #[test]
    fn test_resolve_custom_agent() {
        let config = WatchConfig {
            agents: vec!["mybot".to_string()],
            custom_agents: vec![CustomAgent {
                name: "mybot".to_string(),
                display_name: Some("My Bot".to_string()),
                path: "/tmp/mybot".to_string(),
                patterns: vec!["*.log".to_string()],
                process_names: vec!["mybot".to_string()],
                format: "auto".to_string(),
            }],
            ..Default::default()
        };

        let agents = resolve_agents(&config).unwrap();
        assert_eq!(agents[0].display_name, "My Bot");
        assert_eq!(agents[0].format, "auto");
    }

    #[test]
    fn test_resolve_unknown_agent_errors() {
        let config = WatchConfig {
            agents: vec!["ghost".to_string()],
            ..Default::default()
        };
        let err = resolve_agents(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAgent(ref n) if n == "ghost"));
    }
}
