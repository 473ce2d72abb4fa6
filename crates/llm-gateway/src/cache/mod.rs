//! C5: fingerprinting, TTL storage, and single-flight coordination.

pub mod fingerprint;
pub mod single_flight;
pub mod store;

pub use single_flight::SingleFlight;
pub use store::CacheStore;

use std::time::Duration;

use crate::model::UniformChatResponse;

/// Default size cap (entry count) before LRU eviction kicks in.
pub const DEFAULT_CACHE_CAPACITY: u64 = 200;

/// The two caches + single-flight coordinators the gateway needs: one for
/// whole chat responses, one for individual embedding vectors. Kept
/// separate because their keys and values have nothing in common.
pub struct GatewayCache {
    pub chat: CacheStore<UniformChatResponse>,
    pub chat_single_flight: SingleFlight<UniformChatResponse>,
    pub embedding: CacheStore<Vec<f32>>,
    pub embedding_single_flight: SingleFlight<Vec<f32>>,
}

impl GatewayCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            chat: CacheStore::new(capacity),
            chat_single_flight: SingleFlight::new(),
            embedding: CacheStore::new(capacity),
            embedding_single_flight: SingleFlight::new(),
        }
    }

    /// Removes every chat and embedding entry for `provider_id`, used when a
    /// provider's user config changes so stale responses can't leak through.
    pub fn invalidate_provider(&self, provider_id: &str) {
        self.chat.invalidate_by_prefix(&format!("chat:{provider_id}:"));
        self.embedding.invalidate_by_prefix(&format!("embed:{provider_id}:"));
    }
}

impl Default for GatewayCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Converts a configured TTL in seconds into a [`Duration`].
pub fn ttl_from_seconds(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}
