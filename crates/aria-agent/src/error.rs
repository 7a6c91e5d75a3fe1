//! Error types for the agent crate.

use thiserror::Error;

use crate::tool::ArgumentError;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] aria_llm::LlmError),

    /// Tool registration error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Remote tool server error.
    #[error("MCP error: {0}")]
    Mcp(#[from] aria_mcp::McpError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this error stems from missing or invalid configuration.
    pub fn is_config(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Llm(e) => e.is_config(),
            _ => false,
        }
    }
}

/// Error returned when registering a tool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    #[error("tool '{0}' is already registered")]
    DuplicateName(String),
}

/// Error returned when a tool call cannot be dispatched to an executor.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    /// No tool with the requested name exists.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The arguments do not satisfy the tool's parameter schema.
    #[error("Invalid arguments for tool '{tool}': {source}")]
    Argument {
        /// Tool that was requested.
        tool: String,
        /// What was wrong with the arguments.
        #[source]
        source: ArgumentError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::tool("city lookup failed");
        assert!(err.to_string().contains("Tool error"));
        assert!(err.to_string().contains("city lookup failed"));
    }

    #[test]
    fn test_duplicate_name_display() {
        let err = AgentError::from(RegistryError::DuplicateName("get_weather".to_string()));
        assert!(err.to_string().contains("'get_weather' is already registered"));
    }

    #[test]
    fn test_invoke_error_display() {
        let err = InvokeError::UnknownTool("teleport".to_string());
        assert_eq!(err.to_string(), "Unknown tool: teleport");

        let err = InvokeError::Argument {
            tool: "get_weather".to_string(),
            source: ArgumentError::MissingRequired {
                name: "city".to_string(),
            },
        };
        assert!(err.to_string().contains("get_weather"));
        assert!(err.to_string().contains("city"));
    }

    #[test]
    fn test_is_config() {
        assert!(AgentError::config("no backend").is_config());
        assert!(AgentError::Llm(aria_llm::LlmError::Auth("bad".to_string())).is_config());
        assert!(!AgentError::tool("x").is_config());
    }
}
