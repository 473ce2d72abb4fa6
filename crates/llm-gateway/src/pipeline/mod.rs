//! C7/C8: the chat and embedding call pipelines built on top of C1-C6.

pub mod chat;
pub mod embedding;

use std::sync::Arc;

use crate::admission::AdmissionController;
use crate::cache::GatewayCache;
use crate::http::{HttpClientHolder, RetryPolicy};
use crate::logger::Logger;
use crate::settings::SettingsProvider;

/// The cheaply-cloneable shared state a single call's producing closure
/// needs; every field is `Arc`-backed so it can outlive the call that
/// spawned it (required for single-flight's `'static` factory future).
#[derive(Clone)]
pub struct Deps {
    pub cache: Arc<GatewayCache>,
    pub admission: Arc<AdmissionController>,
    pub http_client: Arc<HttpClientHolder>,
    pub settings: Arc<dyn SettingsProvider>,
    pub logger: Arc<dyn Logger>,
    pub retry_policy: RetryPolicy,
}
