//! Configuration types.
//!
//! Every field is optional in the file; accessors fill in defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default weather API key variable.
pub const WEATHER_API_KEY_ENV: &str = "WEATHER_API_KEY";

/// Root configuration, one optional table per section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AriaConfig {
    /// Language model settings (`[llm]`).
    pub llm: Option<LlmConfig>,
    /// Agent loop settings (`[agent]`).
    pub agent: Option<AgentConfig>,
    /// Weather tool settings (`[weather]`).
    pub weather: Option<WeatherConfig>,
    /// External tool servers (`[mcp]` / `[[mcp.servers]]`).
    pub mcp: Option<McpConfig>,
}

impl AriaConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole; MCP servers are merged by name.
    pub fn merge(&mut self, other: AriaConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.agent.is_some() {
            self.agent = other.agent;
        }
        if other.weather.is_some() {
            self.weather = other.weather;
        }
        if let Some(other_mcp) = other.mcp {
            let mcp = self.mcp.get_or_insert_with(McpConfig::default);
            for server in other_mcp.servers {
                match mcp.servers.iter_mut().find(|s| s.name == server.name) {
                    Some(existing) => *existing = server,
                    None => mcp.servers.push(server),
                }
            }
        }
    }

    /// The `[llm]` section, or defaults.
    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    /// The `[agent]` section, or defaults.
    pub fn agent(&self) -> AgentConfig {
        self.agent.clone().unwrap_or_default()
    }

    /// The `[weather]` section, or defaults.
    pub fn weather(&self) -> WeatherConfig {
        self.weather.clone().unwrap_or_default()
    }

    /// Configured external tool servers.
    pub fn mcp_servers(&self) -> &[McpServerEntry] {
        self.mcp.as_ref().map(|m| m.servers.as_slice()).unwrap_or(&[])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM
// ─────────────────────────────────────────────────────────────────────────────

/// Chat-completion provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// GitHub Models (OpenAI-compatible).
    #[default]
    Github,
    /// OpenAI.
    Openai,
    /// Local Ollama server.
    Ollama,
}

impl Provider {
    /// Environment variable holding this provider's key, if it needs one.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Provider::Github => Some("GITHUB_TOKEN"),
            Provider::Openai => Some("OPENAI_API_KEY"),
            Provider::Ollama => None,
        }
    }

    /// Model used when `[llm] model` is unset.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Github | Provider::Openai => "gpt-4o-mini",
            Provider::Ollama => "llama3.2",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Github => "GitHub Models",
            Provider::Openai => "OpenAI",
            Provider::Ollama => "Ollama",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// `[llm]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend provider.
    pub provider: Option<Provider>,
    /// Custom API base URL.
    pub base_url: Option<String>,
    /// Model identifier.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Override for the key's environment variable.
    pub api_key_env: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl LlmConfig {
    /// Provider, defaulting to GitHub Models.
    pub fn provider(&self) -> Provider {
        self.provider.unwrap_or_default()
    }

    /// Variable to read the API key from.
    pub fn api_key_env(&self) -> Option<String> {
        self.api_key_env
            .clone()
            .or_else(|| self.provider().env_var().map(str::to_string))
    }

    /// Configured model, or the provider's default.
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    /// Request timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// `[agent]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool dispatch rounds per turn.
    pub max_iterations: Option<u32>,
    /// Run one round's tool calls concurrently.
    pub parallel_tools: Option<bool>,
    /// Retries when opening a model stream fails transiently.
    pub remote_retries: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Weather
// ─────────────────────────────────────────────────────────────────────────────

/// `[weather]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// API base URL.
    pub base_url: Option<String>,
    /// Override for the key's environment variable.
    pub api_key_env: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl WeatherConfig {
    /// Variable to read the API key from.
    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(WEATHER_API_KEY_ENV)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MCP
// ─────────────────────────────────────────────────────────────────────────────

/// `[mcp]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpConfig {
    /// Configured servers.
    #[serde(default)]
    pub servers: Vec<McpServerEntry>,
}

/// One `[[mcp.servers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerEntry {
    /// Unique name for this server.
    pub name: String,
    /// Command to spawn.
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables as `[key, value]` pairs.
    #[serde(default)]
    pub env: Vec<[String; 2]>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl McpServerEntry {
    /// Create an entry with no arguments.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout_secs: None,
        }
    }

    /// Environment variables as tuples.
    pub fn env_tuples(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|[k, v]| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = AriaConfig::from_toml("").unwrap();
        assert_eq!(config, AriaConfig::new());
        assert_eq!(config.llm().provider(), Provider::Github);
        assert_eq!(config.llm().model(), "gpt-4o-mini");
        assert_eq!(config.llm().api_key_env().as_deref(), Some("GITHUB_TOKEN"));
        assert_eq!(config.weather().api_key_env(), "WEATHER_API_KEY");
        assert!(config.mcp_servers().is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = AriaConfig::from_toml(
            r#"
[llm]
provider = "ollama"
base_url = "http://localhost:11434/v1"
model = "llama3.2"
temperature = 0.2
timeout_secs = 120

[agent]
max_iterations = 5
parallel_tools = false

[weather]
api_key_env = "MY_WEATHER_KEY"

[[mcp.servers]]
name = "weather"
command = "aria"
args = ["mcp-server"]
env = [["RUST_LOG", "debug"]]
"#,
        )
        .unwrap();

        let llm = config.llm();
        assert_eq!(llm.provider(), Provider::Ollama);
        assert_eq!(llm.api_key_env(), None);
        assert_eq!(llm.model(), "llama3.2");
        assert_eq!(llm.timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.agent().max_iterations, Some(5));
        assert_eq!(config.agent().parallel_tools, Some(false));
        assert_eq!(config.weather().api_key_env(), "MY_WEATHER_KEY");

        let servers = config.mcp_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].args, vec!["mcp-server"]);
        assert_eq!(
            servers[0].env_tuples(),
            vec![("RUST_LOG".to_string(), "debug".to_string())]
        );
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = AriaConfig::from_toml("[llm]\nprovider = \"carrier-pigeon\"\n").unwrap_err();
        assert!(matches!(err, crate::ConfigError::Parse(_)));
    }

    #[test]
    fn test_merge_replaces_sections_and_merges_servers() {
        let mut base = AriaConfig::from_toml(
            r#"
[llm]
model = "gpt-4o-mini"
temperature = 0.7

[agent]
max_iterations = 10

[[mcp.servers]]
name = "weather"
command = "old"

[[mcp.servers]]
name = "files"
command = "files-server"
"#,
        )
        .unwrap();

        let overlay = AriaConfig::from_toml(
            r#"
[llm]
model = "gpt-4o"

[[mcp.servers]]
name = "weather"
command = "new"
"#,
        )
        .unwrap();

        base.merge(overlay);

        assert_eq!(base.llm().model.as_deref(), Some("gpt-4o"));
        assert_eq!(base.llm().temperature, None);
        assert_eq!(base.agent().max_iterations, Some(10));

        let servers = base.mcp_servers();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].command, "new");
        assert_eq!(servers[1].name, "files");
    }
}
