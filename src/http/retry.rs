//! Retry policy and error classification for HTTP operations.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Delay between retry attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// How many times an HTTP operation is attempted and how long to wait between
/// attempts. The default issues exactly one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    /// One initial attempt plus `retries` extra attempts.
    pub fn with_retries(retries: usize) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..Self::none()
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Errors raised by [`HttpClient`](super::HttpClient).
#[derive(Debug, Error)]
pub enum HttpError {
    /// The server answered with a status the caller does not accept.
    #[error("HTTP status {}", .status.as_u16())]
    Status { status: StatusCode },
    /// Connection, DNS, TLS or body-read failure.
    #[error("{0}")]
    Transport(String),
    /// The body was received but is not valid JSON.
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),
    /// The body could not be written to its destination.
    #[error("{0:#}")]
    Output(anyhow::Error),
}

impl HttpError {
    pub(crate) fn transport(error: reqwest::Error) -> Self {
        HttpError::Transport(error_chain(&error))
    }

    /// Only server errors and transport failures can succeed on a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Status { status } => status.is_server_error(),
            HttpError::Transport(_) => true,
            HttpError::InvalidJson(_) | HttpError::Output(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

/// Renders an error together with its sources, e.g.
/// `error sending request: connection refused`.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}
