//! Turn lifecycle notifications.
//!
//! The agent loop reports what happens during a turn to an [`EventSink`]:
//! streamed tokens, tool start/end, and the final answer. Calls are made
//! synchronously and in order, so implementations must return promptly.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use aria_llm::Message;

use crate::tool::ToolResult;

/// Consumer of turn lifecycle events.
pub trait EventSink: Send + Sync {
    /// Incremental assistant text.
    fn on_token(&self, _text: &str) {}

    /// A tool call is about to run.
    fn on_tool_start(&self, _name: &str, _input: &Value) {}

    /// A tool call finished.
    fn on_tool_end(&self, _name: &str, _result: &ToolResult) {}

    /// The turn produced its final assistant message.
    fn on_turn_complete(&self, _message: &Message) {}
}

/// A sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {}

// ─────────────────────────────────────────────────────────────────────────────
// Sink Events
// ─────────────────────────────────────────────────────────────────────────────

/// An owned record of one sink callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkEvent {
    /// Text delta.
    Token {
        /// The text.
        text: String,
    },
    /// A tool call is starting.
    ToolStart {
        /// Tool name.
        name: String,
        /// Arguments as requested by the model.
        input: Value,
    },
    /// A tool call has finished.
    ToolEnd {
        /// Tool name.
        name: String,
        /// The call's result.
        result: ToolResult,
    },
    /// The turn is complete.
    TurnComplete {
        /// Final assistant message.
        message: Message,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording Sink
// ─────────────────────────────────────────────────────────────────────────────

/// A sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// All token text concatenated.
    pub fn text(&self) -> String {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Token { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().push(event);
    }
}

impl EventSink for RecordingSink {
    fn on_token(&self, text: &str) {
        self.push(SinkEvent::Token {
            text: text.to_string(),
        });
    }

    fn on_tool_start(&self, name: &str, input: &Value) {
        self.push(SinkEvent::ToolStart {
            name: name.to_string(),
            input: input.clone(),
        });
    }

    fn on_tool_end(&self, name: &str, result: &ToolResult) {
        self.push(SinkEvent::ToolEnd {
            name: name.to_string(),
            result: result.clone(),
        });
    }

    fn on_turn_complete(&self, message: &Message) {
        self.push(SinkEvent::TurnComplete {
            message: message.clone(),
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channel Sink
// ─────────────────────────────────────────────────────────────────────────────

/// A sink that forwards events over an unbounded channel.
///
/// Sending never blocks. Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Sink receiver dropped, discarding event");
        }
    }
}

impl EventSink for ChannelSink {
    fn on_token(&self, text: &str) {
        self.send(SinkEvent::Token {
            text: text.to_string(),
        });
    }

    fn on_tool_start(&self, name: &str, input: &Value) {
        self.send(SinkEvent::ToolStart {
            name: name.to_string(),
            input: input.clone(),
        });
    }

    fn on_tool_end(&self, name: &str, result: &ToolResult) {
        self.send(SinkEvent::ToolEnd {
            name: name.to_string(),
            result: result.clone(),
        });
    }

    fn on_turn_complete(&self, message: &Message) {
        self.send(SinkEvent::TurnComplete {
            message: message.clone(),
        });
    }
}
