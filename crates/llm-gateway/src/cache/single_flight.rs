//! C5's de-duplication half: at most one producing call in flight per key.

use std::future::Future;
use std::pin::Pin;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{FutureExt, Shared};

use crate::error::{ErrorKind, Result};

type BoxedFuture<V> = Pin<Box<dyn Future<Output = std::result::Result<V, ErrorKind>> + Send>>;

/// Coalesces concurrent callers asking for the same key onto a single
/// producing future. Keyed state transitions `Absent -> Running ->
/// Completed -> Absent`; `Completed` is immediately removed so the next call
/// for the same key produces fresh (the cache, checked before this is ever
/// reached, is what actually serves post-completion hits).
pub struct SingleFlight<V: Clone + Send + Sync + 'static> {
    inflight: DashMap<String, Shared<BoxedFuture<V>>>,
}

impl<V: Clone + Send + Sync + 'static> Default for SingleFlight<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync + 'static> SingleFlight<V> {
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Runs `factory` for `key` if nothing else is already running for it;
    /// otherwise awaits the in-flight producer's result.
    pub async fn get_or_join<F, Fut>(&self, key: &str, factory: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let shared = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(vacant) => {
                let boxed: BoxedFuture<V> = Box::pin(factory());
                let shared = boxed.shared();
                vacant.insert(shared.clone());
                shared
            }
        };

        let result = shared.await;
        self.inflight.remove(key);
        result
    }

    /// Number of keys currently being produced. Test/diagnostic use only.
    pub fn in_flight_count(&self) -> usize {
        self.inflight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_a_single_producer() {
        let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let flight = flight.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .get_or_join("k", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(7)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_later_call_after_completion_runs_again() {
        let flight: SingleFlight<u32> = SingleFlight::new();

        let first = flight.get_or_join("k", || async { Ok(1) }).await.unwrap();
        let second = flight.get_or_join("k", || async { Ok(2) }).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn failure_is_shared_and_not_retained() {
        let flight: SingleFlight<u32> = SingleFlight::new();

        let result = flight
            .get_or_join("k", || async { Err(ErrorKind::Timeout) })
            .await;

        assert!(result.is_err());
        assert_eq!(flight.in_flight_count(), 0);
    }
}
