//! CLI command handlers.

pub mod ask;
pub mod chat;
pub mod mcp_server;
pub mod repl;
pub mod tools;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};

use aria_agent::{Agent, ToolRegistry, register_mcp_tools, register_weather_tools};
use aria_config::{AriaConfig, McpServerEntry, Provider};
use aria_llm::{OpenAiBackend, OpenAiConfig, SharedBackend};
use aria_mcp::{McpClient, McpServerConfig};

/// Name of the built-in MCP server entry used by `--mcp`.
const BUILTIN_SERVER: &str = "weather";

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: AriaConfig,
    /// Explicit config directory from the command line.
    pub config_dir: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Per-command overrides for the agent.
#[derive(Debug, Clone, Default)]
pub struct AgentOverrides {
    pub model: Option<String>,
    pub max_iterations: Option<u32>,
}

/// A tool registry plus the MCP connections backing it.
pub struct Toolset {
    pub registry: ToolRegistry,
    clients: Vec<Arc<McpClient>>,
}

impl Toolset {
    /// Stop any spawned MCP servers.
    pub async fn shutdown(self) {
        for client in self.clients {
            if let Err(e) = client.shutdown().await {
                tracing::debug!(server = %client.name(), error = %e, "MCP shutdown failed");
            }
        }
    }
}

impl Context {
    /// Load `.env` and the layered config files.
    pub fn load(config_dir: Option<&Path>, verbose: bool) -> Result<Self> {
        aria_config::load_dotenv();

        let loaded = aria_config::load_config_with_options(None, config_dir)
            .context("failed to load configuration")?;
        for path in loaded.loaded_from() {
            tracing::debug!(path = %path.display(), "Using config file");
        }

        Ok(Self {
            config: loaded.config,
            config_dir: config_dir.map(Path::to_path_buf),
            verbose,
        })
    }

    /// Weather tool settings with the key resolved from the environment.
    pub fn weather_config(&self) -> aria_agent::WeatherConfig {
        let section = self.config.weather();
        let mut config =
            aria_agent::WeatherConfig::new(aria_config::optional_secret(section.api_key_env()));
        if let Some(url) = section.base_url {
            config = config.with_base_url(url);
        }
        if let Some(secs) = section.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }

    /// Build the tools, either in-process or discovered over MCP.
    pub async fn toolset(&self, mcp: bool) -> Result<Toolset> {
        let mut registry = ToolRegistry::new();

        if !mcp {
            register_weather_tools(&mut registry, self.weather_config())
                .context("failed to set up weather tools")?;
            return Ok(Toolset {
                registry,
                clients: Vec::new(),
            });
        }

        let mut clients = Vec::new();
        for entry in self.mcp_entries()? {
            let client = connect(&entry)
                .await
                .with_context(|| format!("failed to start MCP server '{}'", entry.name))?;
            register_mcp_tools(&mut registry, Arc::clone(&client)).await?;
            clients.push(client);
        }

        Ok(Toolset { registry, clients })
    }

    /// Configured MCP servers, or this executable's own `mcp-server`.
    fn mcp_entries(&self) -> Result<Vec<McpServerEntry>> {
        let configured = self.config.mcp_servers();
        if !configured.is_empty() {
            return Ok(configured.to_vec());
        }

        let exe = std::env::current_exe().context("cannot locate the aria executable")?;
        let mut entry = McpServerEntry::new(BUILTIN_SERVER, exe.display().to_string());
        entry.args.push("mcp-server".to_string());
        if let Some(ref dir) = self.config_dir {
            entry.args.push("--config-dir".to_string());
            entry.args.push(dir.display().to_string());
        }
        Ok(vec![entry])
    }

    /// Build the chat-completion backend from `[llm]`.
    pub fn backend(&self) -> Result<SharedBackend> {
        let llm = self.config.llm();
        let provider = llm.provider();

        let key = match llm.api_key_env() {
            Some(var) => Some(aria_config::resolve_secret(&var)?),
            None => None,
        };

        let mut config = match provider {
            Provider::Github => OpenAiConfig::github_models(String::new()),
            Provider::Openai => OpenAiConfig::openai(String::new()),
            Provider::Ollama => OpenAiConfig::ollama(),
        };
        config.api_key = key;
        // The agent names the model in every request.
        config.model = None;
        if let Some(ref url) = llm.base_url {
            config = config.with_base_url(url.clone());
        }
        if let Some(timeout) = llm.timeout() {
            config = config.with_timeout(timeout);
        }

        tracing::debug!(provider = %provider, base_url = %config.base_url, "Using LLM backend");
        Ok(Arc::new(OpenAiBackend::new(config)?))
    }

    /// Build an agent over `registry`.
    pub fn agent(&self, registry: ToolRegistry, overrides: &AgentOverrides) -> Result<Agent> {
        let backend = self.backend()?;
        let llm = self.config.llm();
        let section = self.config.agent();

        let model = overrides.model.clone().unwrap_or_else(|| llm.model());
        let mut builder = Agent::builder()
            .with_shared_backend(backend)
            .with_tools(registry)
            .with_model(model);

        if let Some(temperature) = llm.temperature {
            builder = builder.with_temperature(temperature);
        }
        if let Some(max) = overrides.max_iterations.or(section.max_iterations) {
            builder = builder.with_max_iterations(max);
        }
        if let Some(parallel) = section.parallel_tools {
            builder = builder.with_parallel_tools(parallel);
        }
        if let Some(retries) = section.remote_retries {
            builder = builder.with_remote_retries(retries);
        }

        Ok(builder.build()?)
    }
}

async fn connect(entry: &McpServerEntry) -> Result<Arc<McpClient>> {
    let mut config =
        McpServerConfig::new(entry.name.clone(), entry.command.clone()).with_args(entry.args.clone());
    for (key, value) in entry.env_tuples() {
        config = config.with_env_var(key, value);
    }
    if let Some(secs) = entry.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let mut client = McpClient::connect_stdio(config)?;
    let info = client.initialize().await?;
    tracing::info!(server = %entry.name, name = %info.name, version = %info.version, "Connected to MCP server");
    Ok(Arc::new(client))
}
