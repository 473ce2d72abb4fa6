//! Holds the process's provider templates and user configs, reloadable
//! without downtime.

use std::sync::{Arc, RwLock};

use config::{
    MergedChatConfig, MergedEmbeddingConfig, TemplateFilePort, UserConfig, load_chat_template,
    load_chat_user_config, load_embedding_template, load_embedding_user_config,
};

use crate::error::{ErrorKind, Result};
use crate::settings::{SettingsProvider, UserConfigKind};

struct Snapshot {
    chat: Vec<MergedChatConfig>,
    embedding: Vec<MergedEmbeddingConfig>,
}

/// C2: reads are served from an immutable snapshot behind a short-lived read
/// lock (just long enough to clone the `Arc`); `reload` builds a whole new
/// snapshot and swaps the pointer, so in-flight reads never observe a
/// half-updated config.
pub struct TemplateStore {
    file_port: Arc<dyn TemplateFilePort>,
    settings: Arc<dyn SettingsProvider>,
    chat_provider_ids: Vec<String>,
    embedding_provider_ids: Vec<String>,
    snapshot: RwLock<Arc<Snapshot>>,
    /// Serializes `put_*_user_config` calls so concurrent writers can't
    /// interleave a file-port write with a settings-port write for the same
    /// provider. Reads never take this lock.
    write_lock: tokio::sync::Mutex<()>,
}

impl TemplateStore {
    /// Loads templates and user configs for every id in `chat_provider_ids`
    /// and `embedding_provider_ids` up front; a provider id with no
    /// corresponding template file fails the whole load.
    pub fn load(
        file_port: Arc<dyn TemplateFilePort>,
        chat_provider_ids: Vec<String>,
        embedding_provider_ids: Vec<String>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Result<Self> {
        let snapshot = Self::build_snapshot(file_port.as_ref(), &chat_provider_ids, &embedding_provider_ids)?;

        Ok(Self {
            file_port,
            settings,
            chat_provider_ids,
            embedding_provider_ids,
            snapshot: RwLock::new(Arc::new(snapshot)),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn build_snapshot(
        file_port: &dyn TemplateFilePort,
        chat_provider_ids: &[String],
        embedding_provider_ids: &[String],
    ) -> Result<Snapshot> {
        let mut chat = Vec::with_capacity(chat_provider_ids.len());
        for provider_id in chat_provider_ids {
            let template = load_chat_template(file_port, provider_id).map_err(map_config_err)?;
            let user = load_chat_user_config(file_port, provider_id)
                .map_err(map_config_err)?
                .unwrap_or_default();
            chat.push(MergedChatConfig::new(provider_id.clone(), template, user));
        }

        let mut embedding = Vec::with_capacity(embedding_provider_ids.len());
        for provider_id in embedding_provider_ids {
            let template = load_embedding_template(file_port, provider_id).map_err(map_config_err)?;
            let user = load_embedding_user_config(file_port, provider_id)
                .map_err(map_config_err)?
                .unwrap_or_default();
            embedding.push(MergedEmbeddingConfig::new(provider_id.clone(), template, user));
        }

        Ok(Snapshot { chat, embedding })
    }

    /// Atomically re-reads every template and user config from the file port.
    pub fn reload(&self) -> Result<()> {
        let snapshot = Self::build_snapshot(self.file_port.as_ref(), &self.chat_provider_ids, &self.embedding_provider_ids)?;
        *self.snapshot.write().expect("snapshot lock poisoned") = Arc::new(snapshot);
        Ok(())
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().expect("snapshot lock poisoned").clone()
    }

    pub fn list_chat_provider_ids(&self) -> Vec<String> {
        self.chat_provider_ids.clone()
    }

    pub fn list_embedding_provider_ids(&self) -> Vec<String> {
        self.embedding_provider_ids.clone()
    }

    pub fn get_merged_chat(&self, provider_id: &str) -> Result<MergedChatConfig> {
        self.current()
            .chat
            .iter()
            .find(|config| config.provider_id == provider_id)
            .cloned()
            .ok_or_else(|| ErrorKind::TemplateNotFound(provider_id.to_string()))
    }

    pub fn get_merged_embedding(&self, provider_id: &str) -> Result<MergedEmbeddingConfig> {
        self.current()
            .embedding
            .iter()
            .find(|config| config.provider_id == provider_id)
            .cloned()
            .ok_or_else(|| ErrorKind::TemplateNotFound(provider_id.to_string()))
    }

    /// True iff at least one configured chat provider has a non-empty api key.
    pub fn is_chat_active(&self) -> bool {
        self.current().chat.iter().any(|config| config.user().has_api_key())
    }

    /// True iff at least one configured embedding provider has a non-empty api key.
    pub fn is_embedding_active(&self) -> bool {
        self.current().embedding.iter().any(|config| config.user().has_api_key())
    }

    /// Persists `user` for `provider_id`'s chat config through the
    /// settings-sink port, mirrors it to the file port so the store's own
    /// snapshot sees it on reload, then reloads. Single-writer locked so two
    /// concurrent puts for the same or different providers can't interleave
    /// their file-port and settings-port halves.
    pub async fn put_chat_user_config(&self, provider_id: &str, user: &UserConfig) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.settings.persist_user_config(UserConfigKind::Chat, provider_id, user)?;

        let content = serde_json::to_string_pretty(user).map_err(|e| ErrorKind::InvalidTemplate(e.to_string()))?;
        self.file_port
            .write_chat_user_config(provider_id, &content)
            .map_err(map_config_err)?;
        self.reload()
    }

    /// Persists `user` for `provider_id`'s embedding config through the
    /// settings-sink port, mirrors it to the file port, then reloads. See
    /// [`Self::put_chat_user_config`] for the locking rationale.
    pub async fn put_embedding_user_config(&self, provider_id: &str, user: &UserConfig) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.settings.persist_user_config(UserConfigKind::Embedding, provider_id, user)?;

        let content = serde_json::to_string_pretty(user).map_err(|e| ErrorKind::InvalidTemplate(e.to_string()))?;
        self.file_port
            .write_embedding_user_config(provider_id, &content)
            .map_err(map_config_err)?;
        self.reload()
    }
}

fn map_config_err(err: config::Error) -> ErrorKind {
    match err {
        config::Error::TemplateNotFound(id) => ErrorKind::TemplateNotFound(id),
        config::Error::InvalidTemplate { reason, .. } => ErrorKind::InvalidTemplate(reason),
        other => ErrorKind::InvalidTemplate(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::StdFsTemplateFilePort;
    use indoc::indoc;
    use tempfile::TempDir;

    fn write_minimal_chat_template(dir: &TempDir, provider_id: &str) {
        let json = indoc! {r#"
            {
              "provider_name": "test",
              "http": { "auth_header": "Authorization", "auth_scheme": "Bearer", "headers": [] },
              "chat_api": {
                "endpoint": "https://example.test/{apiKey}",
                "default_model": "test-model",
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

        std::fs::write(dir.path().join(format!("provider_template_chat_{provider_id}.json")), json).unwrap();
    }

    struct NoopSettings;

    impl SettingsProvider for NoopSettings {
        fn active_chat_provider_id(&self) -> Option<String> {
            None
        }

        fn active_embedding_provider_id(&self) -> Option<String> {
            None
        }

        fn is_embedding_config_enabled(&self) -> bool {
            false
        }

        fn http_timeout_seconds(&self) -> u64 {
            30
        }

        fn is_cache_enabled(&self) -> bool {
            true
        }

        fn cache_ttl_seconds(&self) -> u64 {
            60
        }

        fn persist_user_config(&self, _kind: UserConfigKind, _provider_id: &str, _config: &UserConfig) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn reload_picks_up_user_config_written_after_load() {
        let dir = TempDir::new().unwrap();
        write_minimal_chat_template(&dir, "p1");

        let port = Arc::new(StdFsTemplateFilePort::new(dir.path().to_path_buf()));
        let store = TemplateStore::load(port, vec!["p1".to_string()], vec![], Arc::new(NoopSettings)).unwrap();

        assert!(!store.is_chat_active());

        let mut user = UserConfig::default();
        user.api_key = "sk-test".to_string().into();
        store.put_chat_user_config("p1", &user).await.unwrap();

        assert!(store.is_chat_active());
        assert_eq!(store.get_merged_chat("p1").unwrap().model(), "test-model");
    }

    #[tokio::test]
    async fn put_chat_user_config_invokes_the_settings_sink() {
        use std::sync::Mutex;

        struct RecordingSettings {
            calls: Mutex<Vec<(UserConfigKind, String)>>,
        }

        impl SettingsProvider for RecordingSettings {
            fn active_chat_provider_id(&self) -> Option<String> {
                None
            }

            fn active_embedding_provider_id(&self) -> Option<String> {
                None
            }

            fn is_embedding_config_enabled(&self) -> bool {
                false
            }

            fn http_timeout_seconds(&self) -> u64 {
                30
            }

            fn is_cache_enabled(&self) -> bool {
                true
            }

            fn cache_ttl_seconds(&self) -> u64 {
                60
            }

            fn persist_user_config(&self, kind: UserConfigKind, provider_id: &str, _config: &UserConfig) -> Result<()> {
                self.calls.lock().unwrap().push((kind, provider_id.to_string()));
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        write_minimal_chat_template(&dir, "p1");

        let port = Arc::new(StdFsTemplateFilePort::new(dir.path().to_path_buf()));
        let settings = Arc::new(RecordingSettings { calls: Mutex::new(Vec::new()) });
        let store = TemplateStore::load(port, vec!["p1".to_string()], vec![], settings.clone()).unwrap();

        let mut user = UserConfig::default();
        user.api_key = "sk-test".to_string().into();
        store.put_chat_user_config("p1", &user).await.unwrap();

        let calls = settings.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), [(UserConfigKind::Chat, "p1".to_string())]);
    }

    #[test]
    fn unknown_provider_id_is_template_not_found() {
        let dir = TempDir::new().unwrap();
        write_minimal_chat_template(&dir, "p1");

        let port = Arc::new(StdFsTemplateFilePort::new(dir.path().to_path_buf()));
        let store = TemplateStore::load(port, vec!["p1".to_string()], vec![], Arc::new(NoopSettings)).unwrap();

        let err = store.get_merged_chat("missing").unwrap_err();
        assert!(matches!(err, ErrorKind::TemplateNotFound(_)));
    }
}
