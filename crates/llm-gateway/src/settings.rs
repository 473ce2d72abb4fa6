//! Host-provided settings port: the bits of configuration that live outside
//! the template store (which provider is active, whether caching is on) and
//! the sink a [`crate::template::TemplateStore`] writes user config edits
//! through.

use config::UserConfig;

/// Which half of a provider's config a [`SettingsProvider`] write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserConfigKind {
    Chat,
    Embedding,
}

/// Host-wide settings the gateway reads but does not own the lifecycle of.
pub trait SettingsProvider: Send + Sync {
    /// The provider id to route chat calls to, if one is configured active.
    fn active_chat_provider_id(&self) -> Option<String>;

    /// The provider id to route embedding calls to, if one is configured active.
    fn active_embedding_provider_id(&self) -> Option<String>;

    /// Whether embedding support is enabled at all for this deployment.
    fn is_embedding_config_enabled(&self) -> bool;

    /// The HTTP request timeout, already clamped to `[5, 3600]` seconds.
    fn http_timeout_seconds(&self) -> u64;

    /// Whether the response cache is enabled.
    fn is_cache_enabled(&self) -> bool;

    /// Cache entry time-to-live, in seconds.
    fn cache_ttl_seconds(&self) -> u64;

    /// Persists a user config edit for `provider_id` back to durable storage.
    fn persist_user_config(&self, kind: UserConfigKind, provider_id: &str, config: &UserConfig) -> crate::error::Result<()>;
}
