//! Error types for chatrelay.

use thiserror::Error;

use crate::backend::BackendError;
use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Web error: {0}")]
    Web(String),
}
