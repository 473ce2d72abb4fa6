//! HTTP transport: a process-wide client (C1's connection pool) and the
//! retrying executor built on top of it.

pub mod client;
pub mod executor;
pub mod retry;

pub use client::HttpClientHolder;
pub use executor::{HttpRequest, execute};
pub use retry::RetryPolicy;
