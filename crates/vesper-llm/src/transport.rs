//! The cloud transport port and its reqwest implementation.

use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error};
use vesper_core::CloudProviderKind;

use crate::error::{LlmError, LlmResult};

/// Type alias for boxed raw byte streams.
pub type ByteStreamBox = Pin<Box<dyn Stream<Item = LlmResult<Vec<u8>>> + Send>>;

/// One outbound streaming request, fully built and already redacted.
#[derive(Debug, Clone)]
pub struct CloudRequest {
    /// Provider being called.
    pub provider: CloudProviderKind,
    /// Endpoint URL.
    pub url: String,
    /// Bearer token.
    pub bearer: String,
    /// JSON body with `stream: true` set.
    pub body: Value,
    /// Per-request timeout (time to first response).
    pub request_timeout: Duration,
    /// Whole-transfer timeout.
    pub resource_timeout: Duration,
}

/// Port to the HTTPS transport.
///
/// Implementations return the raw body byte stream; SSE decoding and
/// provider chunk parsing happen in the caller.
#[async_trait]
pub trait CloudTransport: Send + Sync {
    /// POST the request and stream the response body.
    ///
    /// # Errors
    ///
    /// `RateLimited` on 429 (with any `Retry-After` delay), `Http` on
    /// other non-success statuses, `Transport` on connection failures.
    async fn post_stream(&self, request: &CloudRequest) -> LlmResult<ByteStreamBox>;
}

/// Production transport over reqwest with rustls.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the TLS backend cannot be
    /// initialized.
    pub fn new() -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CloudTransport for ReqwestTransport {
    async fn post_stream(&self, request: &CloudRequest) -> LlmResult<ByteStreamBox> {
        let mut bearer = reqwest::header::HeaderValue::try_from(format!(
            "Bearer {}",
            request.bearer
        ))
        .map_err(|e| LlmError::Config(format!("invalid credential characters: {e}")))?;
        bearer.set_sensitive(true);

        debug!(provider = %request.provider, url = %request.url, "dispatching cloud request");

        // The request timeout bounds time-to-response; the resource
        // timeout bounds the whole transfer including the body stream.
        let send = self
            .client
            .post(&request.url)
            .header(reqwest::header::AUTHORIZATION, bearer)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .timeout(request.resource_timeout)
            .json(&request.body)
            .send();
        let response = tokio::time::timeout(request.request_timeout, send)
            .await
            .map_err(|_| LlmError::Transport("request timed out".to_string()))?
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Transport("request timed out".to_string())
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "cloud request failed");

            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited { retry_after });
            }
            return Err(LlmError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| match chunk {
                Ok(bytes) => Ok(bytes.to_vec()),
                Err(e) => Err(LlmError::Transport(e.to_string())),
            });
        Ok(Box::pin(stream))
    }
}
