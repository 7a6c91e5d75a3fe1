//! System prompt builder.
//!
//! Provides a fluent builder for assembling the assistant's system prompt
//! from small sections. Sections are joined with double newlines.

use chrono::{Local, NaiveDate};

use crate::tool::ToolRegistry;

/// Assistant name used by the default prompt.
pub const ASSISTANT_NAME: &str = "Aria";

const DEFAULT_TRAITS: &[&str] = &[
    "Friendly and conversational tone",
    "Concise but thorough answers",
    "You admit when you don't know something",
    "You can help with coding, writing, analysis, and general questions",
];

const DEFAULT_GUIDELINES: &[&str] = &[
    "When using tools, explain what you're doing",
    "If a tool returns an error, explain the issue to the user",
    "For non-tool questions, answer directly from your knowledge",
];

/// A tool summary for prompt generation.
#[derive(Debug, Clone)]
pub struct ToolSummary {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
}

/// Builder for generating system prompts.
///
/// # Example
///
/// ```rust,ignore
/// let prompt = SystemPromptBuilder::new()
///     .with_identity("Aria", "a helpful AI assistant")
///     .with_tools(&registry)
///     .with_date()
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemPromptBuilder {
    identity: Option<(String, String)>,
    traits: Vec<String>,
    tools: Option<Vec<ToolSummary>>,
    guidelines: Vec<String>,
    date: Option<NaiveDate>,
}

impl SystemPromptBuilder {
    /// Create a new builder with no sections.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default Aria prompt for the tools in `registry`.
    pub fn aria(registry: &ToolRegistry) -> Self {
        let builder = Self::new()
            .with_identity(ASSISTANT_NAME, "a helpful AI assistant")
            .with_traits(DEFAULT_TRAITS.iter().copied())
            .with_date();

        if registry.is_empty() {
            builder
        } else {
            builder
                .with_tools(registry)
                .with_guidelines(DEFAULT_GUIDELINES.iter().copied())
        }
    }

    /// Set the agent identity.
    pub fn with_identity(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.identity = Some((name.into(), description.into()));
        self
    }

    /// Add personality traits.
    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits.extend(traits.into_iter().map(Into::into));
        self
    }

    /// Summarize the tools in a registry.
    pub fn with_tools(mut self, registry: &ToolRegistry) -> Self {
        self.tools = Some(
            registry
                .list_specs()
                .iter()
                .map(|spec| ToolSummary {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                })
                .collect(),
        );
        self
    }

    /// Set tool summaries directly.
    pub fn with_tool_summaries(mut self, summaries: Vec<ToolSummary>) -> Self {
        self.tools = Some(summaries);
        self
    }

    /// Add tool usage guidelines.
    pub fn with_guidelines<I, S>(mut self, guidelines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guidelines
            .extend(guidelines.into_iter().map(Into::into));
        self
    }

    /// Include today's local date.
    pub fn with_date(self) -> Self {
        self.with_fixed_date(Local::now().date_naive())
    }

    /// Include a specific date.
    pub fn with_fixed_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Build the final prompt.
    pub fn build(self) -> String {
        let sections: Vec<String> = [
            self.build_identity_section(),
            self.build_traits_section(),
            self.build_tools_section(),
            self.build_guidelines_section(),
            self.build_date_section(),
        ]
        .into_iter()
        .flatten()
        .collect();

        sections.join("\n\n")
    }

    fn build_identity_section(&self) -> Option<String> {
        self.identity
            .as_ref()
            .map(|(name, description)| format!("You are {}, {}.", name, description))
    }

    fn build_traits_section(&self) -> Option<String> {
        if self.traits.is_empty() {
            return None;
        }
        let mut lines = vec!["Your personality:".to_string()];
        lines.extend(self.traits.iter().map(|t| format!("- {}", t)));
        Some(lines.join("\n"))
    }

    fn build_tools_section(&self) -> Option<String> {
        let tools = self.tools.as_ref().filter(|t| !t.is_empty())?;
        let mut lines = vec!["Available tools:".to_string()];
        lines.extend(
            tools
                .iter()
                .map(|t| format!("- {}: {}", t.name, t.description)),
        );
        Some(lines.join("\n"))
    }

    fn build_guidelines_section(&self) -> Option<String> {
        if self.guidelines.is_empty() {
            return None;
        }
        let mut lines = vec!["Guidelines:".to_string()];
        lines.extend(self.guidelines.iter().map(|g| format!("- {}", g)));
        Some(lines.join("\n"))
    }

    fn build_date_section(&self) -> Option<String> {
        self.date
            .map(|d| format!("Current date: {}", d.format("%B %d, %Y")))
    }
}
