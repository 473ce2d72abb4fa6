//! Process-wide `reqwest::Client`, plus the host-configurable request
//! timeout applied per-request by the executor.

use std::{
    sync::RwLock,
    time::Duration,
};

use reqwest::{Client, header};

// No blanket `.timeout()` here: that would bound a streaming response's
// entire body read, killing long-lived SSE streams at the deadline. The
// configured timeout is instead applied per-request by the executor, which
// knows whether a given call is streaming.
fn builder() -> reqwest::ClientBuilder {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::CONNECTION, header::HeaderValue::from_static("keep-alive"));

    Client::builder()
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .pool_max_idle_per_host(64)
        .default_headers(headers)
}

/// Holds the single `reqwest::Client` used for all outbound provider calls,
/// and the currently configured request timeout the executor applies
/// per-request. Swappable so [`HttpClientHolder::apply_timeout`] can take
/// effect without a process restart.
pub struct HttpClientHolder {
    client: Client,
    timeout: RwLock<Duration>,
}

impl HttpClientHolder {
    /// Builds a holder with `timeout_seconds` clamped to `[5, 3600]`.
    pub fn new(timeout_seconds: u64) -> Self {
        let timeout = clamp_timeout(timeout_seconds);
        let client = builder().build().expect("default reqwest client config is valid");

        Self {
            client,
            timeout: RwLock::new(timeout),
        }
    }

    /// Returns a cheap clone of the current client.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// The currently configured request timeout, clamped to `[5, 3600]`
    /// seconds.
    pub fn timeout(&self) -> Duration {
        *self.timeout.read().expect("timeout lock poisoned")
    }

    /// Updates the timeout applied to future requests, clamped to `[5,
    /// 3600]`. The underlying client is not timeout-configured itself (see
    /// [`builder`]), so this only needs to swap the stored duration; requests
    /// already in flight keep whatever timeout they started with.
    pub fn apply_timeout(&self, timeout_seconds: u64) {
        let timeout = clamp_timeout(timeout_seconds);
        *self.timeout.write().expect("timeout lock poisoned") = timeout;
    }
}

fn clamp_timeout(seconds: u64) -> Duration {
    Duration::from_secs(seconds.clamp(5, 3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_timeout_into_range() {
        assert_eq!(clamp_timeout(1), Duration::from_secs(5));
        assert_eq!(clamp_timeout(999_999), Duration::from_secs(3600));
        assert_eq!(clamp_timeout(30), Duration::from_secs(30));
    }
}
