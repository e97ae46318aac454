//! HTTP backend relay.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::relay::{BackendError, BackendRelay, Result};

/// Header carrying the backend API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

pub struct HttpBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    mensaje: &'a str,
    numero: &'a str,
}

#[derive(Deserialize)]
struct RelayResponse {
    respuesta: Option<String>,
}

impl HttpBackend {
    /// Create a backend client. `timeout` of `None` waits indefinitely.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: url.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn classify(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Network(e)
    }
}

#[async_trait]
impl BackendRelay for HttpBackend {
    async fn relay(&self, identifier: &str, body: &str) -> Result<String> {
        let mut request = self.client.post(&self.url).json(&RelayRequest {
            mensaje: body,
            numero: identifier,
        });
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(classify)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let text = response.text().await.map_err(classify)?;
        let parsed: RelayResponse = serde_json::from_str(&text)
            .map_err(|e| BackendError::MalformedPayload(e.to_string()))?;

        parsed
            .respuesta
            .ok_or_else(|| BackendError::MalformedPayload("missing 'respuesta' field".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_backend(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/chat", addr)
    }

    fn echo_router() -> Router {
        Router::new().route(
            "/api/chat",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let key = headers
                    .get(API_KEY_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(json!({
                    "respuesta": format!(
                        "{}|{}|{}",
                        body["numero"].as_str().unwrap_or(""),
                        body["mensaje"].as_str().unwrap_or(""),
                        key
                    )
                }))
            }),
        )
    }

    #[tokio::test]
    async fn relay_sends_message_identifier_and_key() {
        let url = spawn_backend(echo_router()).await;
        let backend = HttpBackend::new(url, Some(Duration::from_secs(5)))
            .unwrap()
            .with_api_key(Some("secret".to_string()));

        let reply = backend.relay("51977292965", "hola").await.unwrap();
        assert_eq!(reply, "51977292965|hola|secret");
    }

    #[tokio::test]
    async fn server_error_is_status_failure() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
        );
        let url = spawn_backend(app).await;
        let backend = HttpBackend::new(url, None).unwrap();

        match backend.relay("1", "x").await {
            Err(BackendError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_reply_field_is_malformed() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async { Json(json!({ "answer": "wrong field" })) }),
        );
        let url = spawn_backend(app).await;
        let backend = HttpBackend::new(url, None).unwrap();

        let err = backend.relay("1", "x").await.unwrap_err();
        assert!(matches!(err, BackendError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "respuesta": "late" }))
            }),
        );
        let url = spawn_backend(app).await;
        let backend = HttpBackend::new(url, Some(Duration::from_millis(100))).unwrap();

        let err = backend.relay("1", "x").await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout));
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackend::new(format!("http://{}/api/chat", addr), None).unwrap();
        let err = backend.relay("1", "x").await.unwrap_err();
        assert!(matches!(err, BackendError::Network(_)));
    }
}
