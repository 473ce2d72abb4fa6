//! Test harness for the gateway: an in-memory settings/logger port pair plus
//! helpers that write provider templates and user configs into a temp dir and
//! wire up a [`llm_gateway::Gateway`] pointed at a mock HTTP provider.

pub mod mock_provider;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use config::UserConfig;
use llm_gateway::logger::{Level, Logger};
use llm_gateway::settings::{SettingsProvider, UserConfigKind};
use tempfile::TempDir;

/// Minimal chat template pointed at `base_url`, with every response path a
/// conventional OpenAI-shaped mock provider understands.
pub fn chat_template_json(base_url: &str, model: &str, _max_batch_size: Option<usize>) -> String {
    indoc::formatdoc! {r#"
        {{
          "provider_name": "mock",
          "http": {{ "auth_header": "Authorization", "auth_scheme": "Bearer", "headers": [] }},
          "chat_api": {{
            "endpoint": "{base_url}/v1/chat/completions?key={{apiKey}}",
            "default_model": "{model}",
            "default_parameters": {{}},
            "request_paths": {{
              "model": "model", "messages": "messages", "temperature": "temperature",
              "top_p": null, "typical_p": null, "max_tokens": "max_tokens",
              "stream": "stream", "tools": "tools", "tool_choice": "tool_choice"
            }},
            "response_paths": {{
              "choices": "choices", "content": "message.content",
              "tool_calls": "message.tool_calls", "finish_reason": "finish_reason"
            }},
            "tool_paths": {{ "name": "name", "description": "description", "parameters": "parameters" }},
            "json_mode": {{ "path": "response_format.type", "value": "json_object" }}
          }},
          "static_parameters": {{}}
        }}
    "#}
}

/// Minimal embedding template pointed at `base_url`.
pub fn embedding_template_json(base_url: &str, model: &str, max_batch_size: usize) -> String {
    indoc::formatdoc! {r#"
        {{
          "provider_name": "mock",
          "http": {{ "auth_header": "Authorization", "auth_scheme": "Bearer", "headers": [] }},
          "embedding_api": {{
            "endpoint": "{base_url}/v1/embeddings",
            "default_model": "{model}",
            "max_batch_size": {max_batch_size},
            "request_paths": {{ "model": "model", "input": "input" }},
            "response_paths": {{ "data_list": "data", "embedding": "embedding", "index": "index" }}
          }},
          "static_parameters": {{}}
        }}
    "#}
}

/// Writes `provider_template_chat_<id>.json` and a user config with
/// `api_key` set, so the provider is immediately active.
pub fn write_chat_provider(dir: &TempDir, provider_id: &str, base_url: &str, model: &str) {
    std::fs::write(
        dir.path().join(format!("provider_template_chat_{provider_id}.json")),
        chat_template_json(base_url, model, None),
    )
    .unwrap();

    let user = indoc::formatdoc! {r#"
        {{ "api_key": "test-key" }}
    "#};
    std::fs::write(dir.path().join(format!("chat_config_{provider_id}.json")), user).unwrap();
}

/// Writes `provider_template_embedding_<id>.json` and an active user config.
pub fn write_embedding_provider(dir: &TempDir, provider_id: &str, base_url: &str, model: &str, max_batch_size: usize) {
    std::fs::write(
        dir.path().join(format!("provider_template_embedding_{provider_id}.json")),
        embedding_template_json(base_url, model, max_batch_size),
    )
    .unwrap();

    let user = indoc::formatdoc! {r#"
        {{ "api_key": "test-key" }}
    "#};
    std::fs::write(dir.path().join(format!("embedding_config_{provider_id}.json")), user).unwrap();
}

/// An in-memory [`SettingsProvider`] whose fields tests mutate directly.
pub struct TestSettings {
    pub chat_provider_id: Mutex<Option<String>>,
    pub embedding_provider_id: Mutex<Option<String>>,
    pub embedding_enabled: Mutex<bool>,
    pub http_timeout_seconds: Mutex<u64>,
    pub cache_enabled: Mutex<bool>,
    pub cache_ttl_seconds: Mutex<u64>,
    pub persisted: Mutex<Vec<(UserConfigKind, String)>>,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            chat_provider_id: Mutex::new(None),
            embedding_provider_id: Mutex::new(None),
            embedding_enabled: Mutex::new(true),
            http_timeout_seconds: Mutex::new(30),
            cache_enabled: Mutex::new(true),
            cache_ttl_seconds: Mutex::new(300),
            persisted: Mutex::new(Vec::new()),
        }
    }
}

impl TestSettings {
    pub fn with_chat_provider(provider_id: impl Into<String>) -> Self {
        let settings = Self::default();
        *settings.chat_provider_id.lock().unwrap() = Some(provider_id.into());
        settings
    }
}

impl SettingsProvider for TestSettings {
    fn active_chat_provider_id(&self) -> Option<String> {
        self.chat_provider_id.lock().unwrap().clone()
    }

    fn active_embedding_provider_id(&self) -> Option<String> {
        self.embedding_provider_id.lock().unwrap().clone()
    }

    fn is_embedding_config_enabled(&self) -> bool {
        *self.embedding_enabled.lock().unwrap()
    }

    fn http_timeout_seconds(&self) -> u64 {
        *self.http_timeout_seconds.lock().unwrap()
    }

    fn is_cache_enabled(&self) -> bool {
        *self.cache_enabled.lock().unwrap()
    }

    fn cache_ttl_seconds(&self) -> u64 {
        *self.cache_ttl_seconds.lock().unwrap()
    }

    fn persist_user_config(&self, kind: UserConfigKind, provider_id: &str, _config: &UserConfig) -> llm_gateway::Result<()> {
        self.persisted.lock().unwrap().push((kind, provider_id.to_string()));
        Ok(())
    }
}

/// Collects every log line emitted during a test for later assertions.
#[derive(Default, Clone)]
pub struct TestLogger {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl TestLogger {
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().unwrap().clone()
    }
}

impl Logger for TestLogger {
    fn log(&self, level: Level, message: &str) {
        self.lines.lock().unwrap().push((level, message.to_string()));
    }
}

/// Counts distinct values seen, used by single-flight/cache tests to assert
/// how many times the mock provider was actually hit.
#[derive(Default, Clone)]
pub struct SeenKeys {
    inner: Arc<Mutex<HashMap<String, usize>>>,
}

impl SeenKeys {
    pub fn record(&self, key: impl Into<String>) {
        *self.inner.lock().unwrap().entry(key.into()).or_insert(0) += 1;
    }

    pub fn count(&self, key: &str) -> usize {
        *self.inner.lock().unwrap().get(key).unwrap_or(&0)
    }

    pub fn total(&self) -> usize {
        self.inner.lock().unwrap().values().sum()
    }
}
