//! Provider-agnostic request/response types. Every translation module
//! converts to and from these rather than any single provider's wire shape.

use serde::{Deserialize, Serialize};

/// Who produced a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// A single turn in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Only meaningful when `role` is `Assistant`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Required when `role` is `Tool`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// A plain user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A tool the model may call, described JSON-schema-style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One invocation of a tool, as emitted by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(default = "default_tool_call_type")]
    pub r#type: String,
    pub function_name: String,
    /// Raw JSON string, not a parsed `Value` — providers disagree on shape
    /// and the caller owns how to interpret it.
    pub arguments: String,
}

fn default_tool_call_type() -> String {
    "function".to_string()
}

/// A request to the chat pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub force_json_output: bool,
    #[serde(default)]
    pub stream: bool,
    /// Opaque; used only for logging and cache scoping, never sent upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Why a chat call stopped producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    StreamEnd,
}

/// A completed, non-streaming chat result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformChatResponse {
    pub finish_reason: FinishReason,
    pub message: ChatMessage,
}

/// One fragment of a streaming chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformChatChunk {
    pub content_delta: String,
    /// Set only on the terminal chunk of the sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl UniformChatChunk {
    /// A terminal chunk carrying no further content, just the finish reason.
    pub fn terminal(finish_reason: FinishReason) -> Self {
        Self {
            content_delta: String::new(),
            finish_reason: Some(finish_reason),
            tool_calls: None,
        }
    }
}

/// A request to the embedding pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformEmbeddingRequest {
    pub input: Vec<String>,
}

/// A single embedding vector, tagged with its position in the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    /// Matches the index of the corresponding input string in the request.
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// The full result of an embedding call, ordered to match the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformEmbeddingResponse {
    pub results: Vec<EmbeddingResult>,
}
