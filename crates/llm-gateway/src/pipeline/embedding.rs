//! C8: batched, cache-aware embedding calls.

use config::MergedEmbeddingConfig;
use tokio_util::sync::CancellationToken;

use crate::cache::{fingerprint, ttl_from_seconds};
use crate::error::{ErrorKind, Result};
use crate::error::redact_and_truncate;
use crate::http;
use crate::model::{EmbeddingResult, UniformEmbeddingRequest, UniformEmbeddingResponse};
use crate::translate;

use super::Deps;

async fn fetch_batch(deps: &Deps, ctx: &CancellationToken, merged: &MergedEmbeddingConfig, inputs: Vec<String>) -> Result<Vec<(String, Vec<f32>)>> {
    let _lease = deps
        .admission
        .acquire(&merged.provider_id, merged.concurrency_limit(), ctx)
        .await?;

    let http_request = translate::request::build_embedding_request(merged, &inputs);
    let client = deps.http_client.client();
    let timeout = deps.http_client.timeout();
    let response = http::execute(&client, http_request, deps.retry_policy, ctx, deps.logger.as_ref(), timeout, false).await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        let text = String::from_utf8_lossy(&body).to_string();
        return Err(ErrorKind::ProviderHttpError {
            status: status.as_u16(),
            body: redact_and_truncate(&text, 2000),
        });
    }

    let body = response.bytes().await.map_err(|e| ErrorKind::TransportError(e.to_string()))?;
    let parsed = translate::response::translate_embedding_response(&body, &merged.template().embedding_api.response_paths, inputs.len())?;

    let mut by_index: Vec<Option<Vec<f32>>> = vec![None; inputs.len()];
    for EmbeddingResult { index, embedding } in parsed.results {
        if let Some(slot) = by_index.get_mut(index) {
            *slot = Some(embedding);
        }
    }

    inputs
        .into_iter()
        .zip(by_index)
        .map(|(input, embedding)| {
            embedding
                .map(|e| (input, e))
                .ok_or_else(|| ErrorKind::ProviderProtocolMismatch("embedding response missing an input's index".to_string()))
        })
        .collect()
}

/// Splits `request.input` by `MaxBatchSize`, serves cached inputs directly,
/// fetches the rest in bounded-size batches, then restores original order.
pub async fn get_embeddings(
    deps: &Deps,
    ctx: &CancellationToken,
    merged: MergedEmbeddingConfig,
    request: UniformEmbeddingRequest,
) -> Result<UniformEmbeddingResponse> {
    let cache_enabled = deps.settings.is_cache_enabled();
    let mut results: Vec<Option<Vec<f32>>> = vec![None; request.input.len()];
    let mut residual_indices = Vec::new();
    let mut residual_inputs = Vec::new();

    for (index, input) in request.input.iter().enumerate() {
        let key = fingerprint::embedding_key(&merged.provider_id, merged.model(), input);

        match cache_enabled.then(|| deps.cache.embedding.try_get(&key)).flatten() {
            Some(cached) => results[index] = Some(cached),
            None => {
                residual_indices.push(index);
                residual_inputs.push(input.clone());
            }
        }
    }

    let max_batch_size = merged.max_batch_size().max(1);

    for (chunk_indices, chunk_inputs) in residual_indices.chunks(max_batch_size).zip(residual_inputs.chunks(max_batch_size)) {
        let fetched = fetch_batch(deps, ctx, &merged, chunk_inputs.to_vec()).await?;

        for (&index, (input, embedding)) in chunk_indices.iter().zip(fetched.iter()) {
            if cache_enabled {
                let key = fingerprint::embedding_key(&merged.provider_id, merged.model(), input);
                let ttl = ttl_from_seconds(deps.settings.cache_ttl_seconds());
                deps.cache.embedding.set(key, embedding.clone(), ttl);
            }
            results[index] = Some(embedding.clone());
        }
    }

    let results = results
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| EmbeddingResult {
            index,
            embedding: embedding.expect("every index is filled from cache or a fetched batch"),
        })
        .collect();

    Ok(UniformEmbeddingResponse { results })
}
