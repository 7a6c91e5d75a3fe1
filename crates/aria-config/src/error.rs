//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required credential is unset, empty, or still a template value.
    #[error("{env_var} is not configured. Set it in your environment or a .env file")]
    MissingCredential { env_var: String },

    /// Failed to read a `.env` file.
    #[error("failed to load {path}: {message}")]
    DotEnv { path: String, message: String },
}

impl ConfigError {
    /// Returns true if this error is a missing credential.
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, Self::MissingCredential { .. })
    }
}
