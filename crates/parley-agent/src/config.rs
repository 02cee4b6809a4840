use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::orchestrator::OrchestratorConfig;

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f64 {
    0.8
}

fn default_turn_timeout_secs() -> u64 {
    30
}

fn default_history_limit() -> usize {
    12
}

fn default_max_tool_rounds() -> usize {
    6
}

fn default_min_transcript_chars() -> usize {
    4
}

fn default_assistant_name() -> String {
    "Jarvis".to_string()
}

fn default_weather_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_ipinfo_base_url() -> String {
    "https://ipinfo.io".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

/// Language model and turn-loop settings (`[agent]` in the server config).
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Wall-clock bound on one whole turn, model and tool calls included.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
    /// Messages kept in session history after each turn.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Finals shorter than this (after trimming) never reach the model.
    #[serde(default = "default_min_transcript_chars")]
    pub min_transcript_chars: usize,
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: String::new(),
            temperature: default_temperature(),
            turn_timeout_secs: default_turn_timeout_secs(),
            history_limit: default_history_limit(),
            max_tool_rounds: default_max_tool_rounds(),
            min_transcript_chars: default_min_transcript_chars(),
            assistant_name: default_assistant_name(),
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("temperature", &self.temperature)
            .field("turn_timeout_secs", &self.turn_timeout_secs)
            .field("history_limit", &self.history_limit)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("min_transcript_chars", &self.min_transcript_chars)
            .field("assistant_name", &self.assistant_name)
            .finish()
    }
}

impl AgentConfig {
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            turn_timeout: Duration::from_secs(self.turn_timeout_secs),
            history_limit: self.history_limit,
            max_tool_rounds: self.max_tool_rounds,
            assistant_name: self.assistant_name.clone(),
        }
    }
}

/// External endpoints used by the built-in tools (`[tools]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,
    #[serde(default = "default_ipinfo_base_url")]
    pub ipinfo_base_url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            weather_base_url: default_weather_base_url(),
            ipinfo_base_url: default_ipinfo_base_url(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_defaults_from_empty_table() {
        let config: AgentConfig = toml::from_str("").unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.history_limit, 12);
        assert_eq!(config.min_transcript_chars, 4);

        let orchestrator = config.orchestrator();
        assert_eq!(orchestrator.turn_timeout, Duration::from_secs(30));
        assert_eq!(orchestrator.max_tool_rounds, 6);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AgentConfig {
            api_key: "sk-live-123".into(),
            ..AgentConfig::default()
        };
        assert!(!format!("{config:?}").contains("sk-live-123"));
    }
}
