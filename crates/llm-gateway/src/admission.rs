//! C6: per-provider concurrency limiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, Result};

/// One counting semaphore per provider id, sized at the provider's
/// `ConcurrencyLimit`. Semaphores are created lazily on first use and then
/// reused for the life of the process.
#[derive(Default)]
pub struct AdmissionController {
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    fn semaphore_for(&self, provider_id: &str, concurrency_limit: usize) -> Arc<Semaphore> {
        let mut semaphores = self.semaphores.lock().expect("admission lock poisoned");

        semaphores
            .entry(provider_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(concurrency_limit.max(1))))
            .clone()
    }

    /// Acquires an admission slot for `provider_id`, honoring `ctx`
    /// cancellation. Drop the returned [`OwnedLease`] to release the slot.
    pub async fn acquire(&self, provider_id: &str, concurrency_limit: usize, ctx: &CancellationToken) -> Result<OwnedLease> {
        let semaphore = self.semaphore_for(provider_id, concurrency_limit);

        let permit = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ErrorKind::Cancelled),
            permit = semaphore.clone().acquire_owned() => permit.map_err(|_| ErrorKind::Cancelled)?,
        };

        Ok(OwnedLease { _permit: permit })
    }
}

/// An admission slot held independently of the controller's lifetime, so it
/// can be moved into a spawned streaming task.
pub struct OwnedLease {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
