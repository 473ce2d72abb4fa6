use secrecy::SecretString;
use serde_json::Value;

use crate::{
    DEFAULT_CHAT_CONCURRENCY_LIMIT, DEFAULT_EMBEDDING_CONCURRENCY_LIMIT,
    DEFAULT_EMBEDDING_MAX_BATCH_SIZE, DEFAULT_MAX_TOKENS, ProviderTemplateChat,
    ProviderTemplateEmbedding, UserConfig,
};

/// Deep-merges `overlay` on top of `base`: matching object keys recurse,
/// matching array/scalar keys are replaced wholesale by `overlay`'s value,
/// and keys only present in one side are carried through unchanged.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let merged_value = match merged.get(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

/// A template and a user config merged for a single chat call. Exclusively
/// owns references to both; immutable for the call's duration.
#[derive(Debug, Clone)]
pub struct MergedChatConfig {
    /// The provider id this merge was produced for.
    pub provider_id: String,
    template: ProviderTemplateChat,
    user: UserConfig,
}

impl MergedChatConfig {
    /// Merges `template` and `user` per spec's "user overrides template,
    /// otherwise a documented default" rule.
    pub fn new(provider_id: impl Into<String>, template: ProviderTemplateChat, user: UserConfig) -> Self {
        Self {
            provider_id: provider_id.into(),
            template,
            user,
        }
    }

    /// API key, sourced only from the user config, never the template.
    pub fn api_key(&self) -> &SecretString {
        &self.user.api_key
    }

    /// Effective endpoint: user override, or the template default.
    pub fn endpoint(&self) -> &str {
        self.user
            .endpoint_override
            .as_deref()
            .unwrap_or(&self.template.chat_api.endpoint)
    }

    /// Effective model: user override, or the template default, or empty.
    pub fn model(&self) -> &str {
        self.user
            .model_override
            .as_deref()
            .or(self.template.chat_api.default_model.as_deref())
            .unwrap_or_default()
    }

    /// Effective concurrency limit: user override, or the template/doc
    /// default of [`DEFAULT_CHAT_CONCURRENCY_LIMIT`].
    pub fn concurrency_limit(&self) -> usize {
        self.user.concurrency_limit.unwrap_or(DEFAULT_CHAT_CONCURRENCY_LIMIT)
    }

    /// Effective temperature: user, then template default parameters, else unset.
    pub fn temperature(&self) -> Option<f32> {
        let from_template = self.template.chat_api.default_parameters.get("temperature").and_then(Value::as_f64);
        self.user.temperature.map(f64::from).or(from_template).map(|v| v as f32)
    }

    /// Effective top_p: user, then template default parameters, else unset.
    pub fn top_p(&self) -> Option<f32> {
        let from_template = self.template.chat_api.default_parameters.get("top_p").and_then(Value::as_f64);
        self.user.top_p.map(f64::from).or(from_template).map(|v| v as f32)
    }

    /// Effective typical_p: user, then template default parameters, else unset.
    pub fn typical_p(&self) -> Option<f32> {
        let from_template = self.template.chat_api.default_parameters.get("typical_p").and_then(Value::as_f64);
        self.user.typical_p.map(f64::from).or(from_template).map(|v| v as f32)
    }

    /// Effective max_tokens: user, then template default parameters, else the
    /// documented default of [`DEFAULT_MAX_TOKENS`].
    pub fn max_tokens(&self) -> u32 {
        let from_template = self
            .template
            .chat_api
            .default_parameters
            .get("max_tokens")
            .and_then(Value::as_u64);
        self.user
            .max_tokens
            .map(u64::from)
            .or(from_template)
            .map(|v| v as u32)
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    /// The template half of this merge.
    pub fn template(&self) -> &ProviderTemplateChat {
        &self.template
    }

    /// The user-config half of this merge.
    pub fn user(&self) -> &UserConfig {
        &self.user
    }

    /// `template.static_parameters` deep-merged with
    /// `user.static_parameters_override`; a key present in both has the
    /// user's value, recursively for nested objects.
    pub fn static_parameters(&self) -> Value {
        match &self.user.static_parameters_override {
            Some(overlay) => deep_merge(&self.template.static_parameters, overlay),
            None => self.template.static_parameters.clone(),
        }
    }
}

/// A template and a user config merged for a single embedding call.
#[derive(Debug, Clone)]
pub struct MergedEmbeddingConfig {
    /// The provider id this merge was produced for.
    pub provider_id: String,
    template: ProviderTemplateEmbedding,
    user: UserConfig,
}

impl MergedEmbeddingConfig {
    /// Merges `template` and `user`.
    pub fn new(provider_id: impl Into<String>, template: ProviderTemplateEmbedding, user: UserConfig) -> Self {
        Self {
            provider_id: provider_id.into(),
            template,
            user,
        }
    }

    /// API key, sourced only from the user config.
    pub fn api_key(&self) -> &SecretString {
        &self.user.api_key
    }

    /// Effective endpoint: user override, or the template default.
    pub fn endpoint(&self) -> &str {
        self.user
            .endpoint_override
            .as_deref()
            .unwrap_or(&self.template.embedding_api.endpoint)
    }

    /// Effective model: user override, or the template default, or empty.
    pub fn model(&self) -> &str {
        self.user
            .model_override
            .as_deref()
            .or(self.template.embedding_api.default_model.as_deref())
            .unwrap_or_default()
    }

    /// Effective concurrency limit: user override, or the documented default
    /// of [`DEFAULT_EMBEDDING_CONCURRENCY_LIMIT`].
    pub fn concurrency_limit(&self) -> usize {
        self.user
            .concurrency_limit
            .unwrap_or(DEFAULT_EMBEDDING_CONCURRENCY_LIMIT)
    }

    /// Max inputs per outbound request: template value, or
    /// [`DEFAULT_EMBEDDING_MAX_BATCH_SIZE`] if absent.
    pub fn max_batch_size(&self) -> usize {
        self.template
            .embedding_api
            .max_batch_size
            .unwrap_or(DEFAULT_EMBEDDING_MAX_BATCH_SIZE)
    }

    /// The template half of this merge.
    pub fn template(&self) -> &ProviderTemplateEmbedding {
        &self.template
    }

    /// The user-config half of this merge.
    pub fn user(&self) -> &UserConfig {
        &self.user
    }

    /// `template.static_parameters` deep-merged with the user's override.
    pub fn static_parameters(&self) -> Value {
        match &self.user.static_parameters_override {
            Some(overlay) => deep_merge(&self.template.static_parameters, overlay),
            None => self.template.static_parameters.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatApiConfig, HttpConfig, RequestPaths, ResponsePaths};
    use serde_json::json;

    fn mock_chat_template() -> ProviderTemplateChat {
        ProviderTemplateChat {
            provider_name: "mock".to_string(),
            http: HttpConfig {
                auth_header: "Authorization".to_string(),
                auth_scheme: "Bearer".to_string(),
                headers: vec![],
            },
            chat_api: ChatApiConfig {
                endpoint: "https://api.mock/v1/chat".to_string(),
                default_model: Some("mock-chat".to_string()),
                default_parameters: json!({ "temperature": 0.7 }),
                request_paths: RequestPaths {
                    model: "model".to_string(),
                    messages: "messages".to_string(),
                    temperature: Some("temperature".to_string()),
                    top_p: None,
                    typical_p: None,
                    max_tokens: Some("max_tokens".to_string()),
                    stream: "stream".to_string(),
                    tools: None,
                    tool_choice: None,
                },
                response_paths: ResponsePaths {
                    choices: "choices".to_string(),
                    content: "message.content".to_string(),
                    tool_calls: None,
                    finish_reason: "finish_reason".to_string(),
                },
                tool_paths: None,
                json_mode: None,
            },
            static_parameters: json!({ "top_level": { "a": 1, "b": 2 }, "unchanged": true }),
        }
    }

    #[test]
    fn static_parameters_merge_is_snapshot_stable() {
        let template = mock_chat_template();
        let user = UserConfig {
            static_parameters_override: Some(json!({ "top_level": { "b": 99, "c": 3 } })),
            ..UserConfig::default()
        };

        let merged = MergedChatConfig::new("mock", template, user);

        insta::assert_json_snapshot!(merged.static_parameters(), @r###"
        {
          "top_level": {
            "a": 1,
            "b": 99,
            "c": 3
          },
          "unchanged": true
        }
        "###);
    }

    #[test]
    fn user_overrides_win_model_but_template_fills_the_rest() {
        let template = mock_chat_template();
        let user = UserConfig {
            model_override: Some("user-chosen-model".to_string()),
            ..UserConfig::default()
        };

        let merged = MergedChatConfig::new("mock", template, user);

        let summary = format!(
            "model={} endpoint={} temperature={:?} max_tokens={}",
            merged.model(),
            merged.endpoint(),
            merged.temperature(),
            merged.max_tokens()
        );

        insta::assert_snapshot!(summary, @"model=user-chosen-model endpoint=https://api.mock/v1/chat temperature=Some(0.7) max_tokens=300");
    }

    #[test]
    fn deep_merge_replaces_arrays_and_recurses_objects() {
        let base = json!({ "a": 1, "nested": { "x": 1, "y": 2 }, "list": [1, 2, 3] });
        let overlay = json!({ "nested": { "y": 99 }, "list": [9] });

        let merged = deep_merge(&base, &overlay);

        assert_eq!(
            merged,
            json!({ "a": 1, "nested": { "x": 1, "y": 99 }, "list": [9] })
        );
    }

    #[test]
    fn deep_merge_key_ordering_does_not_affect_result() {
        let base = json!({ "a": 1, "b": 2 });
        let overlay_one = json!({ "b": 3, "c": 4 });
        let overlay_two = json!({ "c": 4, "b": 3 });

        assert_eq!(deep_merge(&base, &overlay_one), deep_merge(&base, &overlay_two));
    }
}
