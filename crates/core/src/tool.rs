//! Tool contract: what the LLM may ask the assistant to do.
//!
//! The orchestrator only sees this dispatch-by-name surface. The concrete
//! capabilities (reminders, notes, ...) live in `thriftbot-tools`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_use id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Structured arguments as produced by the model
    pub input: serde_json::Value,
}

impl From<&MessageToolCall> for ToolCall {
    fn from(call: &MessageToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        }
    }
}

/// An injected set of capabilities the LLM can invoke by name.
///
/// `execute` returns the tool result as plain text. Implementations must
/// turn every failure (unknown tool, malformed input, collaborator error)
/// into a textual result; nothing is allowed to escape to the orchestrator.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions for every enabled tool, sent to the LLM each round.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Run one tool call on behalf of `chat_id`.
    async fn execute(&self, chat_id: &str, call: &ToolCall) -> String;
}

/// An executor with no tools. Used when tools are disabled.
pub struct NoTools;

#[async_trait]
impl ToolExecutor for NoTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn execute(&self, _chat_id: &str, call: &ToolCall) -> String {
        format!("Error: tool '{}' is not available", call.name)
    }
}
