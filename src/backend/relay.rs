//! Backend relay trait for chatrelay.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend URL not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Forwards one message to the backend and returns its reply text.
///
/// Implementations make a single attempt; retrying is left to the caller.
#[async_trait]
pub trait BackendRelay: Send + Sync {
    async fn relay(&self, identifier: &str, body: &str) -> Result<String>;
}
