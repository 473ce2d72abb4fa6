//! C1: the single place that sends an outbound HTTP request, with retries.

use std::time::Duration;

use reqwest::{Client, Method, Response};
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, Result};
use crate::logger::Logger;

use super::retry::{RetryPolicy, should_retry_status};

/// A fully-formed outbound request: URI, method, headers and body are all
/// decided by the caller before `execute` sees it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Sends `request`, retrying transport failures and 429/5xx responses per
/// `policy`. Returns the last response even if unsuccessful; only transport
/// failures surviving all retries, or cancellation, produce `Err`.
///
/// `timeout` bounds the full request lifecycle (connect, headers, body read)
/// when `streaming` is `false`. When `streaming` is `true` it bounds only the
/// wait for response headers — `send_once` resolves as soon as headers
/// arrive, before the body is read — so a slow-to-start provider is still
/// caught, but a long-running SSE body is not aborted mid-stream; that body
/// is bounded only by `ctx`.
pub async fn execute(
    client: &Client,
    request: HttpRequest,
    policy: RetryPolicy,
    ctx: &CancellationToken,
    logger: &dyn Logger,
    timeout: Duration,
    streaming: bool,
) -> Result<Response> {
    let mut attempt = 0u32;

    loop {
        if ctx.is_cancelled() {
            return Err(ErrorKind::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ErrorKind::Cancelled),
            result = send_once(client, &request, timeout, streaming) => result,
        };

        match outcome {
            Ok(response) if should_retry_status(response.status().as_u16()) && attempt < policy.max_retries => {
                logger.warning(&format!(
                    "provider responded {} on attempt {attempt}, retrying",
                    response.status()
                ));
                sleep_before_retry(&policy, attempt, ctx).await?;
                attempt += 1;
            }
            Ok(response) => return Ok(response),
            Err(SendError::TimedOut) if attempt < policy.max_retries => {
                logger.warning(&format!("attempt {attempt} timed out waiting for response headers, retrying"));
                sleep_before_retry(&policy, attempt, ctx).await?;
                attempt += 1;
            }
            Err(SendError::TimedOut) => return Err(ErrorKind::Timeout),
            Err(transport_err) if attempt < policy.max_retries => {
                logger.warning(&format!("transport error on attempt {attempt}: {transport_err}, retrying"));
                sleep_before_retry(&policy, attempt, ctx).await?;
                attempt += 1;
            }
            Err(transport_err) => return Err(ErrorKind::TransportError(transport_err.to_string())),
        }
    }
}

/// Transport outcome of a single send attempt, distinguishing a headers
/// timeout (streaming path only) from any other `reqwest` failure so
/// `execute` can map it to [`ErrorKind::Timeout`] instead of
/// [`ErrorKind::TransportError`].
enum SendError {
    Reqwest(reqwest::Error),
    TimedOut,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Reqwest(err) => write!(f, "{err}"),
            SendError::TimedOut => write!(f, "timed out waiting for response headers"),
        }
    }
}

async fn send_once(client: &Client, request: &HttpRequest, timeout: Duration, streaming: bool) -> std::result::Result<Response, SendError> {
    let mut builder = client.request(request.method.clone(), &request.url);

    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }

    let builder = builder.body(request.body.clone());

    if streaming {
        // `.send()` resolves once headers are in; the body is a lazy stream
        // the caller reads afterwards, outside this timeout.
        match tokio::time::timeout(timeout, builder.send()).await {
            Ok(result) => result.map_err(SendError::Reqwest),
            Err(_elapsed) => Err(SendError::TimedOut),
        }
    } else {
        builder.timeout(timeout).send().await.map_err(SendError::Reqwest)
    }
}

async fn sleep_before_retry(policy: &RetryPolicy, attempt: u32, ctx: &CancellationToken) -> Result<()> {
    let delay = policy.jittered(policy.delay_for_attempt(attempt), u64::from(attempt) * 104_729 + 7);

    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(ErrorKind::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
