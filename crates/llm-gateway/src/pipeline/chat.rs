//! C7: single, batch and streaming chat calls.

use config::MergedChatConfig;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::cache::fingerprint;
use crate::cache::ttl_from_seconds;
use crate::error::{ErrorKind, Result};
use crate::error::redact_and_truncate;
use crate::http;
use crate::model::{UniformChatChunk, UniformChatRequest, UniformChatResponse};
use crate::translate;

use super::Deps;

fn compute_cache_key(merged: &MergedChatConfig, request: &UniformChatRequest) -> String {
    let body = fingerprint::fingerprint_body(
        &request.messages,
        &request.tools,
        merged.temperature(),
        merged.top_p(),
        merged.typical_p(),
        merged.max_tokens(),
        &merged.static_parameters(),
        request.force_json_output,
        merged
            .template()
            .chat_api
            .json_mode
            .as_ref()
            .filter(|_| request.force_json_output)
            .map(|j| &j.value),
    );

    fingerprint::chat_key(
        &merged.provider_id,
        &fingerprint::endpoint_with_key_placeholder(merged.endpoint()),
        merged.model(),
        &body,
    )
}

/// Runs the actual provider call: admission, translate, execute, translate
/// back. Does not consult or populate the cache; callers do that.
async fn dispatch(deps: &Deps, ctx: &CancellationToken, merged: &MergedChatConfig, request: &UniformChatRequest) -> Result<UniformChatResponse> {
    let _lease = deps
        .admission
        .acquire(&merged.provider_id, merged.concurrency_limit(), ctx)
        .await?;

    let http_request = translate::request::build_chat_request(merged, request);
    let client = deps.http_client.client();
    let timeout = deps.http_client.timeout();
    let response = http::execute(&client, http_request, deps.retry_policy, ctx, deps.logger.as_ref(), timeout, false).await?;

    let status = response.status();

    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        let text = String::from_utf8_lossy(&body).to_string();
        deps.logger.error(&format!(
            "provider '{}' returned HTTP {status}: {}",
            merged.provider_id,
            redact_and_truncate(&text, 500)
        ));
        return Err(ErrorKind::ProviderHttpError {
            status: status.as_u16(),
            body: redact_and_truncate(&text, 2000),
        });
    }

    let response_paths = merged.template().chat_api.response_paths.clone();

    if translate::response::is_event_stream(response.headers()) {
        let chunks: Vec<UniformChatChunk> = translate::response::translate_streaming_chat(response, response_paths).collect().await;
        Ok(translate::response::aggregate_chunks(&chunks))
    } else {
        let body = response.bytes().await.map_err(|e| ErrorKind::TransportError(e.to_string()))?;
        Ok(translate::response::translate_non_streaming_chat(&body, &response_paths))
    }
}

/// A single, possibly-cached, possibly-coalesced chat call.
pub async fn single_call(deps: &Deps, ctx: &CancellationToken, merged: MergedChatConfig, request: UniformChatRequest) -> Result<UniformChatResponse> {
    let key = compute_cache_key(&merged, &request);

    if deps.settings.is_cache_enabled() {
        if let Some(cached) = deps.cache.chat.try_get(&key) {
            return Ok(cached);
        }
    }

    let deps_owned = deps.clone();
    let ctx_owned = ctx.clone();
    let key_owned = key.clone();

    deps.cache
        .chat_single_flight
        .get_or_join(&key, move || async move {
            let response = dispatch(&deps_owned, &ctx_owned, &merged, &request).await?;

            if deps_owned.settings.is_cache_enabled() && !matches!(response.finish_reason, crate::model::FinishReason::Error) {
                let ttl = ttl_from_seconds(deps_owned.settings.cache_ttl_seconds());
                deps_owned.cache.chat.set(key_owned, response.clone(), ttl);
            }

            Ok(response)
        })
        .await
}

/// Bounded fan-out over `requests`: at most `concurrency_limit` single calls
/// run at once; the result list preserves input order and each element
/// independently carries success or failure.
pub async fn process_batch(
    deps: &Deps,
    ctx: &CancellationToken,
    merged: MergedChatConfig,
    requests: Vec<UniformChatRequest>,
    concurrency_limit: usize,
) -> Vec<Result<UniformChatResponse>> {
    use futures::stream;

    stream::iter(requests.into_iter().map(|request| {
        let deps = deps.clone();
        let ctx = ctx.clone();
        let merged = merged.clone();
        async move { single_call(&deps, &ctx, merged, request).await }
    }))
    .buffered(concurrency_limit.max(1))
    .collect()
    .await
}

/// Result of a streaming call: a channel of chunks the caller drains live,
/// plus a handle that resolves to the aggregated final result once the
/// stream (or its cache replay) completes.
pub struct StreamingCall {
    pub chunks: tokio::sync::mpsc::Receiver<UniformChatChunk>,
    final_result: tokio::task::JoinHandle<Result<UniformChatResponse>>,
}

impl StreamingCall {
    /// Awaits the aggregated final result, flattening a task panic or abort
    /// into `ErrorKind::Internal` rather than exposing `JoinError`.
    pub async fn final_result(self) -> Result<UniformChatResponse> {
        match self.final_result.await {
            Ok(result) => result,
            Err(join_error) => Err(ErrorKind::Internal(join_error.to_string())),
        }
    }
}

/// Starts a streaming chat call. If the cache has a fresh entry, replays it
/// as a single content chunk followed by a terminal chunk instead of
/// dispatching a new HTTP request.
pub fn streaming_call(deps: Deps, ctx: CancellationToken, merged: MergedChatConfig, mut request: UniformChatRequest) -> StreamingCall {
    request.stream = true;

    let (tx, rx) = tokio::sync::mpsc::channel(32);
    let key = compute_cache_key(&merged, &request);

    let final_result = tokio::spawn(async move {
        if deps.settings.is_cache_enabled() {
            if let Some(cached) = deps.cache.chat.try_get(&key) {
                let content_chunk = UniformChatChunk {
                    content_delta: cached.message.content.clone(),
                    finish_reason: None,
                    tool_calls: if cached.message.tool_calls.is_empty() {
                        None
                    } else {
                        Some(cached.message.tool_calls.clone())
                    },
                };
                let terminal_chunk = UniformChatChunk {
                    content_delta: String::new(),
                    finish_reason: Some(cached.finish_reason),
                    tool_calls: None,
                };

                let _ = tx.send(content_chunk).await;
                let _ = tx.send(terminal_chunk).await;
                return Ok(cached);
            }
        }

        let deps_owned = deps.clone();
        let ctx_owned = ctx.clone();
        let key_owned = key.clone();

        let result = deps
            .cache
            .chat_single_flight
            .get_or_join(&key, move || async move {
                let _lease = deps_owned
                    .admission
                    .acquire(&merged.provider_id, merged.concurrency_limit(), &ctx_owned)
                    .await?;

                let http_request = translate::request::build_chat_request(&merged, &request);
                let client = deps_owned.http_client.client();
                let timeout = deps_owned.http_client.timeout();
                let response = http::execute(&client, http_request, deps_owned.retry_policy, &ctx_owned, deps_owned.logger.as_ref(), timeout, true).await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.bytes().await.unwrap_or_default();
                    let text = String::from_utf8_lossy(&body).to_string();
                    return Err(ErrorKind::ProviderHttpError {
                        status: status.as_u16(),
                        body: redact_and_truncate(&text, 2000),
                    });
                }

                let response_paths = merged.template().chat_api.response_paths.clone();
                let mut chunk_stream = Box::pin(translate::response::translate_streaming_chat(response, response_paths));
                let mut collected = Vec::new();

                while let Some(chunk) = chunk_stream.next().await {
                    if ctx_owned.is_cancelled() {
                        return Err(ErrorKind::Cancelled);
                    }
                    let _ = tx.send(chunk.clone()).await;
                    collected.push(chunk);
                }

                let aggregated = translate::response::aggregate_chunks(&collected);

                if deps_owned.settings.is_cache_enabled() && !matches!(aggregated.finish_reason, crate::model::FinishReason::Error) {
                    let ttl = ttl_from_seconds(deps_owned.settings.cache_ttl_seconds());
                    deps_owned.cache.chat.set(key_owned, aggregated.clone(), ttl);
                }

                Ok(aggregated)
            })
            .await;

        result
    });

    StreamingCall { chunks: rx, final_result }
}
