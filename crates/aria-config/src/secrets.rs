//! Credential resolution from the environment.
//!
//! Keys come from environment variables, optionally seeded from a `.env`
//! file. Values still holding a template placeholder such as
//! `your_api_key_here` count as unset.

use std::path::Path;
use std::sync::Once;

use crate::{ConfigError, Result};

static DOTENV: Once = Once::new();

/// Load `./.env` once per process. Variables already set are never overridden.
pub fn load_dotenv() {
    DOTENV.call_once(|| match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env"),
    });
}

/// Load a specific `.env`-style file. Variables already set are kept.
pub fn load_dotenv_from(path: &Path) -> Result<()> {
    dotenvy::from_path(path).map_err(|e| ConfigError::DotEnv {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// True for empty values and `your_..._here` templates.
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || (value.starts_with("your_") && value.ends_with("_here"))
}

/// Read `env_var`, treating unset, empty, and placeholder values as missing.
pub fn optional_secret(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .filter(|v| !is_placeholder(v))
}

/// Read a credential that must be present.
pub fn resolve_secret(env_var: &str) -> Result<String> {
    optional_secret(env_var).ok_or_else(|| ConfigError::MissingCredential {
        env_var: env_var.to_string(),
    })
}
