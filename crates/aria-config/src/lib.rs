//! Configuration for Aria.
//!
//! Settings are layered from TOML files (user config, then `./aria.toml`)
//! and credentials come from environment variables, optionally seeded from
//! a `.env` file.
//!
//! ```toml
//! [llm]
//! provider = "github"
//! model = "gpt-4o-mini"
//! temperature = 0.7
//!
//! [agent]
//! max_iterations = 10
//!
//! [[mcp.servers]]
//! name = "weather"
//! command = "aria"
//! args = ["mcp-server"]
//! ```

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    CONFIG_DIR_ENV, ConfigSource, LoadedConfig, load_config, load_config_file,
    load_config_with_options, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{is_placeholder, load_dotenv, load_dotenv_from, optional_secret, resolve_secret};
pub use types::{
    AgentConfig, AriaConfig, LlmConfig, McpConfig, McpServerEntry, Provider, WEATHER_API_KEY_ENV,
    WeatherConfig,
};
