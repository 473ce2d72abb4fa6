//! On-disk schema for LLM provider templates and per-provider user configs,
//! plus the merge rules that combine them into a [`MergedChatConfig`] or
//! [`MergedEmbeddingConfig`] for a single call.
//!
//! This crate owns only the *shape* of the configuration and the pure
//! merging logic. Listing known provider ids, swapping snapshots on reload,
//! and wiring in a concrete [`TemplateFilePort`] are the job of the
//! `llm-gateway` crate's template store.

#![deny(missing_docs)]

mod error;
mod file_port;
mod header;
mod merge;
mod template;
mod user_config;

pub use error::Error;
pub use file_port::{StdFsTemplateFilePort, TemplateFilePort};
pub use header::HeaderRule;
pub use merge::{MergedChatConfig, MergedEmbeddingConfig};
pub use template::{
    ChatApiConfig, EmbeddingApiConfig, HttpConfig, JsonModeConfig, ProviderTemplate,
    ProviderTemplateChat, ProviderTemplateEmbedding, RequestPaths, RequestPathsEmbedding,
    ResponsePaths, ResponsePathsEmbedding, ToolPaths,
};
pub use user_config::UserConfig;

/// Default per-provider concurrency limit for chat requests when neither the
/// user config nor the template specifies one.
pub const DEFAULT_CHAT_CONCURRENCY_LIMIT: usize = 5;

/// Default per-provider concurrency limit for embedding requests when neither
/// the user config nor the template specifies one.
pub const DEFAULT_EMBEDDING_CONCURRENCY_LIMIT: usize = 4;

/// Default max_tokens applied when nothing in the template or user config
/// specifies one.
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// Default embedding batch size when the template does not specify one.
pub const DEFAULT_EMBEDDING_MAX_BATCH_SIZE: usize = 1;

/// Reads, parses and schema-validates the chat template for `provider_id`.
pub fn load_chat_template(
    port: &dyn TemplateFilePort,
    provider_id: &str,
) -> Result<ProviderTemplateChat, Error> {
    let raw = port.read_chat_template(provider_id)?;
    let template: ProviderTemplateChat =
        serde_json::from_str(&raw).map_err(|source| Error::TemplateParse {
            provider_id: provider_id.to_string(),
            source,
        })?;
    template.validate()?;
    Ok(template)
}

/// Reads, parses and schema-validates the embedding template for `provider_id`.
pub fn load_embedding_template(
    port: &dyn TemplateFilePort,
    provider_id: &str,
) -> Result<ProviderTemplateEmbedding, Error> {
    let raw = port.read_embedding_template(provider_id)?;
    let template: ProviderTemplateEmbedding =
        serde_json::from_str(&raw).map_err(|source| Error::TemplateParse {
            provider_id: provider_id.to_string(),
            source,
        })?;
    template.validate()?;
    Ok(template)
}

/// Reads and parses the chat user config for `provider_id`, if present.
pub fn load_chat_user_config(
    port: &dyn TemplateFilePort,
    provider_id: &str,
) -> Result<Option<UserConfig>, Error> {
    match port.read_chat_user_config(provider_id)? {
        Some(raw) => {
            let config = serde_json::from_str(&raw).map_err(|source| Error::UserConfigParse {
                provider_id: provider_id.to_string(),
                source,
            })?;
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

/// Reads and parses the embedding user config for `provider_id`, if present.
pub fn load_embedding_user_config(
    port: &dyn TemplateFilePort,
    provider_id: &str,
) -> Result<Option<UserConfig>, Error> {
    match port.read_embedding_user_config(provider_id)? {
        Some(raw) => {
            let config = serde_json::from_str(&raw).map_err(|source| Error::UserConfigParse {
                provider_id: provider_id.to_string(),
                source,
            })?;
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    struct InMemoryPort {
        chat_template: Option<String>,
    }

    impl TemplateFilePort for InMemoryPort {
        fn read_chat_template(&self, _provider_id: &str) -> Result<String, Error> {
            self.chat_template
                .clone()
                .ok_or_else(|| Error::TemplateNotFound("missing".to_string()))
        }

        fn read_embedding_template(&self, provider_id: &str) -> Result<String, Error> {
            Err(Error::TemplateNotFound(provider_id.to_string()))
        }

        fn read_chat_user_config(&self, _provider_id: &str) -> Result<Option<String>, Error> {
            Ok(None)
        }

        fn read_embedding_user_config(&self, _provider_id: &str) -> Result<Option<String>, Error> {
            Ok(None)
        }

        fn write_chat_user_config(&self, _provider_id: &str, _content: &str) -> Result<(), Error> {
            unimplemented!()
        }

        fn write_embedding_user_config(&self, _provider_id: &str, _content: &str) -> Result<(), Error> {
            unimplemented!()
        }
    }

    #[test]
    fn loads_valid_chat_template() {
        let json = indoc! {r#"
            {
              "provider_name": "openai",
              "http": { "auth_header": "Authorization", "auth_scheme": "Bearer", "headers": [] },
              "chat_api": {
                "endpoint": "https://api.openai.com/v1/chat/completions?key={apiKey}",
                "default_model": "gpt-4o-mini",
                "default_parameters": {},
                "request_paths": {
                  "model": "model",
                  "messages": "messages",
                  "temperature": "temperature",
                  "top_p": "top_p",
                  "typical_p": null,
                  "max_tokens": "max_tokens",
                  "stream": "stream",
                  "tools": "tools",
                  "tool_choice": "tool_choice"
                },
                "response_paths": {
                  "choices": "choices",
                  "content": "message.content",
                  "tool_calls": "message.tool_calls",
                  "finish_reason": "finish_reason"
                },
                "tool_paths": { "name": "function.name", "description": "function.description", "parameters": "function.parameters" },
                "json_mode": { "path": "response_format.type", "value": "json_object" }
              },
              "static_parameters": {}
            }
        "#};

        let port = InMemoryPort {
            chat_template: Some(json.to_string()),
        };

        let template = load_chat_template(&port, "openai").unwrap();
        assert_eq!(template.provider_name, "openai");
        assert_eq!(template.chat_api.default_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn rejects_template_missing_endpoint() {
        let json = indoc! {r#"
            {
              "provider_name": "broken",
              "http": { "auth_header": "Authorization", "auth_scheme": "Bearer", "headers": [] },
              "chat_api": {
                "endpoint": "",
                "default_model": null,
                "default_parameters": {},
                "request_paths": {
                  "model": "model", "messages": "messages", "temperature": null,
                  "top_p": null, "typical_p": null, "max_tokens": null,
                  "stream": "stream", "tools": null, "tool_choice": null
                },
                "response_paths": {
                  "choices": "choices", "content": "message.content",
                  "tool_calls": null, "finish_reason": "finish_reason"
                },
                "tool_paths": null,
                "json_mode": null
              },
              "static_parameters": {}
            }
        "#};

        let port = InMemoryPort {
            chat_template: Some(json.to_string()),
        };

        let err = load_chat_template(&port, "broken").unwrap_err();
        assert!(matches!(err, Error::InvalidTemplate { .. }));
    }
}
