//! Backend text-processing service.

use std::sync::Arc;

pub mod http;
pub mod relay;

pub use http::HttpBackend;
pub use relay::{BackendError, BackendRelay, Result};

use crate::config::Settings;

/// Build the backend relay described by the settings.
pub fn create_backend(settings: &Settings) -> Result<Arc<dyn BackendRelay>> {
    let url = settings
        .backend
        .url
        .clone()
        .ok_or(BackendError::NotConfigured)?;

    let backend = HttpBackend::new(url, settings.backend.timeout())?
        .with_api_key(settings.backend.api_key.clone());
    tracing::info!(
        url = %backend.url(),
        timeout_secs = settings.backend.timeout_secs,
        "Using HTTP backend"
    );

    Ok(Arc::new(backend))
}
