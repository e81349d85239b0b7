//! HTTP client module with retry policy and error classification.

mod client;
mod retry;

pub use client::HttpClient;
pub use retry::{HttpError, RETRY_DELAY_MS, RetryPolicy};
