//! Provider-agnostic LLM gateway: uniform chat-completion and embedding
//! requests, translated into each configured provider's wire format via
//! declarative templates, executed with retries and streaming support, and
//! deduplicated/cached across identical calls.

pub mod admission;
pub mod cache;
pub mod error;
pub mod http;
pub mod json_path;
pub mod logger;
pub mod model;
pub mod pipeline;
pub mod settings;
pub mod template;
pub mod translate;

use std::sync::Arc;

use config::TemplateFilePort;
use tokio_util::sync::CancellationToken;

pub use error::{ErrorKind, Result};
pub use model::{
    ChatMessage, EmbeddingResult, FinishReason, Role, ToolCall, ToolDefinition, UniformChatChunk, UniformChatRequest, UniformChatResponse,
    UniformEmbeddingRequest, UniformEmbeddingResponse,
};

use admission::AdmissionController;
use cache::GatewayCache;
use http::{HttpClientHolder, RetryPolicy};
use logger::Logger;
use pipeline::chat::StreamingCall;
use pipeline::Deps;
use settings::SettingsProvider;
use template::TemplateStore;

/// C9: the single entry point the host process holds on to. Wires C1-C8
/// together and validates provider activation before dispatching.
pub struct Gateway {
    templates: TemplateStore,
    settings: Arc<dyn SettingsProvider>,
    deps: Deps,
}

impl Gateway {
    /// Loads templates and user configs for every configured provider id and
    /// wires up the HTTP client, cache and admission controller.
    pub fn new(
        file_port: Arc<dyn TemplateFilePort>,
        chat_provider_ids: Vec<String>,
        embedding_provider_ids: Vec<String>,
        settings: Arc<dyn SettingsProvider>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        let templates = TemplateStore::load(file_port, chat_provider_ids, embedding_provider_ids, settings.clone())?;
        let http_client = Arc::new(HttpClientHolder::new(settings.http_timeout_seconds()));

        let deps = Deps {
            cache: Arc::new(GatewayCache::default()),
            admission: Arc::new(AdmissionController::default()),
            http_client,
            settings: settings.clone(),
            logger,
            retry_policy: RetryPolicy::default(),
        };

        Ok(Self { templates, settings, deps })
    }

    /// Re-reads every template and user config from the file port.
    pub fn reload_templates(&self) -> Result<()> {
        self.templates.reload()
    }

    /// Applies the settings port's current HTTP timeout to the shared client.
    pub fn apply_configured_timeout(&self) {
        self.deps.http_client.apply_timeout(self.settings.http_timeout_seconds());
    }

    fn active_chat_provider(&self) -> Result<config::MergedChatConfig> {
        let provider_id = self.settings.active_chat_provider_id().ok_or(ErrorKind::NotConfigured)?;
        let merged = self.templates.get_merged_chat(&provider_id)?;

        if !merged.user().has_api_key() {
            return Err(ErrorKind::NotConfigured);
        }

        Ok(merged)
    }

    /// Embedding falls back to the chat provider when embedding support is
    /// disabled or unconfigured, per the facade's activation rule.
    fn active_embedding_provider(&self) -> Result<config::MergedEmbeddingConfig> {
        if self.settings.is_embedding_config_enabled() {
            if let Some(provider_id) = self.settings.active_embedding_provider_id() {
                let merged = self.templates.get_merged_embedding(&provider_id)?;
                if merged.user().has_api_key() {
                    return Ok(merged);
                }
            }
        }

        let chat = self.active_chat_provider()?;
        self.templates.get_merged_embedding(&chat.provider_id)
    }

    /// A single chat completion call, consulting the cache and single-flight
    /// coordination before dispatching to the active chat provider.
    pub async fn get_completion(&self, request: UniformChatRequest, ctx: &CancellationToken) -> Result<UniformChatResponse> {
        let merged = self.active_chat_provider()?;
        pipeline::chat::single_call(&self.deps, ctx, merged, request).await
    }

    /// Bounded fan-out over `requests`; preserves input order, each element
    /// independently carries success or failure.
    pub async fn get_completions(&self, requests: Vec<UniformChatRequest>, ctx: &CancellationToken) -> Result<Vec<Result<UniformChatResponse>>> {
        let merged = self.active_chat_provider()?;
        let concurrency_limit = merged.concurrency_limit();
        Ok(pipeline::chat::process_batch(&self.deps, ctx, merged, requests, concurrency_limit).await)
    }

    /// Starts a streaming chat completion call. Returns immediately with a
    /// chunk channel and a join handle for the aggregated final result.
    pub fn get_completion_stream(&self, request: UniformChatRequest, ctx: CancellationToken) -> Result<StreamingCall> {
        let merged = self.active_chat_provider()?;
        Ok(pipeline::chat::streaming_call(self.deps.clone(), ctx, merged, request))
    }

    /// Splits inputs into provider-sized batches, serves cache hits directly,
    /// and restores original order across cached and freshly fetched results.
    pub async fn get_embeddings(&self, request: UniformEmbeddingRequest, ctx: &CancellationToken) -> Result<UniformEmbeddingResponse> {
        let merged = self.active_embedding_provider()?;
        pipeline::embedding::get_embeddings(&self.deps, ctx, merged, request).await
    }
}
