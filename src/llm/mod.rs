//! Chat model abstraction.
//!
//! Defines the minimal contract the agent loop needs from a language model:
//! ordered conversation turns, tool definitions, and a response carrying a
//! stop reason plus ordered content blocks. Tool-use blocks carry the call
//! id the provider expects to see echoed back with each result.

mod openai;

pub use openai::OpenAiChatModel;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One content block within a turn.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },
    /// A tool invocation requested by the model.
    ToolUse { id: String, name: String, input: Value },
    /// The result of a tool invocation, keyed by the originating call id.
    ToolResult { tool_use_id: String, content: String },
}

/// A single conversation turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Turn {
    /// A user turn containing plain text.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// An assistant turn with the model's content blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// A user turn carrying one tool result per executed call, in order.
    pub fn tool_results(results: Vec<(String, String)>) -> Self {
        Self {
            role: Role::User,
            content: results
                .into_iter()
                .map(|(tool_use_id, content)| ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                })
                .collect(),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model produced a complete text answer.
    EndTurn,
    /// The model requested one or more tool invocations.
    ToolUse,
}

/// A model response: stop reason plus ordered content blocks.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
}

impl ModelResponse {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the response requests tool use.
    pub fn requests_tools(&self) -> bool {
        self.stop_reason == StopReason::ToolUse
    }
}

/// A callable tool as declared to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Globally unique tool name.
    pub name: String,
    /// What the tool does and when to use it.
    pub description: String,
    /// JSON schema for the tool's parameters (required vs optional).
    pub input_schema: Value,
}

/// Trait for chat model implementations.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a response to the conversation so far.
    ///
    /// When `tools` is `None` the model cannot request tool use, forcing a
    /// text-only response.
    async fn generate(
        &self,
        system: &str,
        turns: &[Turn],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelResponse>;
}
