use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::{Error, header::HeaderRule};

/// HTTP-level configuration shared by chat and embedding templates: which
/// header carries the credential, its scheme prefix, and any static/forwarded
/// extra headers.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Name of the header that carries the API key, e.g. `"Authorization"`.
    pub auth_header: String,
    /// Scheme prefix placed before the key, e.g. `"Bearer"`.
    pub auth_scheme: String,
    /// Additional header rules applied before user overrides.
    #[serde(default)]
    pub headers: Vec<HeaderRule>,
}

/// JSON-pointer-like path descriptors for building a chat request body.
///
/// A `None` path means "omit this field" rather than "use a default path" —
/// see the Request Translator's edge policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestPaths {
    /// Path at which to write the resolved model string.
    pub model: String,
    /// Path at which to write the messages array.
    pub messages: String,
    /// Path for `temperature`, or `None` to never set it.
    #[serde(default)]
    pub temperature: Option<String>,
    /// Path for `top_p`, or `None` to never set it.
    #[serde(default)]
    pub top_p: Option<String>,
    /// Path for `typical_p`, or `None` to never set it.
    #[serde(default)]
    pub typical_p: Option<String>,
    /// Path for `max_tokens`, or `None` to never set it.
    #[serde(default)]
    pub max_tokens: Option<String>,
    /// Path at which to write `true` when the caller requested streaming.
    pub stream: String,
    /// Path for the tools array, or `None` if the provider has no tool path.
    #[serde(default)]
    pub tools: Option<String>,
    /// Path for the tool_choice field, set to `"auto"` when tools are present.
    #[serde(default)]
    pub tool_choice: Option<String>,
}

/// JSON-pointer-like path descriptors for reading a chat response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponsePaths {
    /// Path to the choices array; the first element is selected.
    pub choices: String,
    /// Path (relative to the selected choice) to the message content string.
    pub content: String,
    /// Path (relative to the selected choice) to the tool calls array.
    #[serde(default)]
    pub tool_calls: Option<String>,
    /// Path (relative to the selected choice) to the finish reason string.
    pub finish_reason: String,
}

/// Path descriptors for reading/writing a single tool definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolPaths {
    /// Path (relative to one tool entry) to the tool's name.
    pub name: String,
    /// Path (relative to one tool entry) to the tool's description.
    pub description: String,
    /// Path (relative to one tool entry) to the tool's JSON-schema parameters.
    pub parameters: String,
}

/// Describes how to force JSON-mode output when the caller requests it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonModeConfig {
    /// Path at which to write `value` when JSON mode is requested.
    pub path: String,
    /// The literal value to write, e.g. `"json_object"`.
    pub value: Value,
}

/// The chat-specific portion of a provider template.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatApiConfig {
    /// Request URL, with `{apiKey}` substituted at translation time.
    pub endpoint: String,
    /// Model used when neither the user config nor the request specifies one.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Default dynamic parameters (temperature, top_p, ...), deep-merged
    /// under the user's static parameter overrides.
    #[serde(default)]
    pub default_parameters: Value,
    /// Where to read/write each field of the uniform chat request.
    pub request_paths: RequestPaths,
    /// Where to read each field of the provider's chat response.
    pub response_paths: ResponsePaths,
    /// Where to read/write each field of a single tool definition.
    #[serde(default)]
    pub tool_paths: Option<ToolPaths>,
    /// How to force JSON-mode output, if the provider supports it.
    #[serde(default)]
    pub json_mode: Option<JsonModeConfig>,
}

/// Path descriptors for building an embedding request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestPathsEmbedding {
    /// Path at which to write the resolved model string.
    pub model: String,
    /// Path at which to write the array of input strings.
    pub input: String,
}

/// Path descriptors for reading an embedding response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponsePathsEmbedding {
    /// Path to the array of embedding result objects.
    pub data_list: String,
    /// Path (relative to one result entry) to the embedding float array.
    pub embedding: String,
    /// Path (relative to one result entry) to the input's original index.
    pub index: String,
}

/// The embedding-specific portion of a provider template.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingApiConfig {
    /// Request URL, with `{apiKey}` substituted at translation time.
    pub endpoint: String,
    /// Model used when neither the user config nor the request specifies one.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Maximum number of inputs per outbound request; larger batches are
    /// split by the embedding pipeline.
    #[serde(default)]
    pub max_batch_size: Option<usize>,
    /// Where to read/write each field of the uniform embedding request.
    pub request_paths: RequestPathsEmbedding,
    /// Where to read each field of the provider's embedding response.
    pub response_paths: ResponsePathsEmbedding,
}

/// A complete chat provider template as loaded from
/// `provider_template_chat_<id>.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderTemplateChat {
    /// Human-readable provider name (distinct from the provider id used in
    /// file names and lookups).
    pub provider_name: String,
    /// HTTP auth header/scheme and static headers.
    pub http: HttpConfig,
    /// Chat endpoint, default model/parameters and path descriptors.
    pub chat_api: ChatApiConfig,
    /// Opaque parameters merged into every request body before dynamic
    /// fields are applied.
    #[serde(default)]
    pub static_parameters: Value,
}

impl ProviderTemplateChat {
    /// Schema-validates the template, returning
    /// [`Error::InvalidTemplate`] describing the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |reason: &str| Error::InvalidTemplate {
            provider_id: self.provider_name.clone(),
            reason: reason.to_string(),
        };

        if self.chat_api.endpoint.trim().is_empty() {
            return Err(invalid("chat_api.endpoint must not be empty"));
        }
        if self.chat_api.request_paths.model.trim().is_empty() {
            return Err(invalid("chat_api.request_paths.model must not be empty"));
        }
        if self.chat_api.request_paths.messages.trim().is_empty() {
            return Err(invalid("chat_api.request_paths.messages must not be empty"));
        }
        if self.chat_api.request_paths.stream.trim().is_empty() {
            return Err(invalid("chat_api.request_paths.stream must not be empty"));
        }
        if self.chat_api.response_paths.choices.trim().is_empty() {
            return Err(invalid("chat_api.response_paths.choices must not be empty"));
        }
        if self.chat_api.response_paths.content.trim().is_empty() {
            return Err(invalid("chat_api.response_paths.content must not be empty"));
        }
        if self.chat_api.response_paths.finish_reason.trim().is_empty() {
            return Err(invalid("chat_api.response_paths.finish_reason must not be empty"));
        }
        if self.http.auth_header.trim().is_empty() {
            return Err(invalid("http.auth_header must not be empty"));
        }

        Ok(())
    }
}

/// A complete embedding provider template as loaded from
/// `provider_template_embedding_<id>.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderTemplateEmbedding {
    /// Human-readable provider name.
    pub provider_name: String,
    /// HTTP auth header/scheme and static headers.
    pub http: HttpConfig,
    /// Embedding endpoint, default model/batch size and path descriptors.
    pub embedding_api: EmbeddingApiConfig,
    /// Opaque parameters merged into every request body.
    #[serde(default)]
    pub static_parameters: Value,
}

impl ProviderTemplateEmbedding {
    /// Schema-validates the template, returning
    /// [`Error::InvalidTemplate`] describing the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |reason: &str| Error::InvalidTemplate {
            provider_id: self.provider_name.clone(),
            reason: reason.to_string(),
        };

        if self.embedding_api.endpoint.trim().is_empty() {
            return Err(invalid("embedding_api.endpoint must not be empty"));
        }
        if self.embedding_api.request_paths.model.trim().is_empty() {
            return Err(invalid("embedding_api.request_paths.model must not be empty"));
        }
        if self.embedding_api.request_paths.input.trim().is_empty() {
            return Err(invalid("embedding_api.request_paths.input must not be empty"));
        }
        if self.embedding_api.response_paths.data_list.trim().is_empty() {
            return Err(invalid("embedding_api.response_paths.data_list must not be empty"));
        }
        if self.embedding_api.response_paths.embedding.trim().is_empty() {
            return Err(invalid("embedding_api.response_paths.embedding must not be empty"));
        }
        if self.embedding_api.response_paths.index.trim().is_empty() {
            return Err(invalid("embedding_api.response_paths.index must not be empty"));
        }
        if self.http.auth_header.trim().is_empty() {
            return Err(invalid("http.auth_header must not be empty"));
        }

        Ok(())
    }
}

/// Umbrella over the two template kinds, used where callers need to accept
/// either without caring which.
#[derive(Debug, Clone)]
pub enum ProviderTemplate {
    /// A chat template.
    Chat(ProviderTemplateChat),
    /// An embedding template.
    Embedding(ProviderTemplateEmbedding),
}

/// Map of extra, provider-specific headers resolved at request time. Kept as
/// an ordered `Vec` rather than a `HashMap` so duplicate-insensitive callers
/// can reason about declaration order; built from [`HeaderRule`] evaluation.
pub type ResolvedHeaders = HashMap<String, String>;
