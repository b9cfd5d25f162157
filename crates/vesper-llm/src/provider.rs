//! Provider dispatch: request building and event streaming.
//!
//! Parsing is tagged-variant dispatch on [`CloudProviderKind`]; each
//! provider contributes a small parser module and the hot path never
//! goes through a virtual call.

use async_stream::try_stream;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use vesper_core::CloudProviderKind;

use crate::error::LlmResult;
use crate::sse::SseDecoder;
use crate::transport::{CloudRequest, CloudTransport};
use crate::types::{EventStreamBox, StreamEvent};
use crate::{claude, gemini, openai_compat};

/// Build the provider-specific streaming request.
#[must_use]
pub fn build_request(
    provider: CloudProviderKind,
    model: &str,
    prompt: &str,
    bearer: String,
    max_tokens: u32,
    request_timeout: Duration,
    resource_timeout: Duration,
) -> CloudRequest {
    let (url, body) = match provider {
        CloudProviderKind::Anthropic => (
            claude::API_URL.to_string(),
            claude::build_body(model, prompt, max_tokens),
        ),
        CloudProviderKind::OpenAi => (
            openai_compat::API_URL.to_string(),
            openai_compat::build_body(model, prompt, max_tokens),
        ),
        CloudProviderKind::Google => (gemini::api_url(model), gemini::build_body(prompt, max_tokens)),
    };
    CloudRequest {
        provider,
        url,
        bearer,
        body,
        request_timeout,
        resource_timeout,
    }
}

/// Parse one SSE data payload for the given provider.
///
/// The `[DONE]` sentinel is handled by the caller and never reaches
/// the per-provider parsers.
///
/// # Errors
///
/// `InvalidResponse` for undecodable chunks, `StreamError` for
/// provider-reported in-stream errors.
pub fn parse_provider_chunk(
    provider: CloudProviderKind,
    data: &str,
) -> LlmResult<Vec<StreamEvent>> {
    match provider {
        CloudProviderKind::Anthropic => claude::parse_chunk(data),
        CloudProviderKind::OpenAi => openai_compat::parse_chunk(data),
        CloudProviderKind::Google => gemini::parse_chunk(data),
    }
}

/// Streaming client over a transport port.
pub struct CloudClient {
    transport: Arc<dyn CloudTransport>,
}

impl CloudClient {
    /// Create a client over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn CloudTransport>) -> Self {
        Self { transport }
    }

    /// Dispatch the request and stream decoded events.
    ///
    /// The stream ends after the first `Finish` event; a `[DONE]`
    /// sentinel is surfaced as `Finish("stop")`.
    ///
    /// # Errors
    ///
    /// Transport and HTTP failures surface before any event; parse
    /// failures and provider stream errors end the stream early.
    pub async fn stream_events(&self, request: CloudRequest) -> LlmResult<EventStreamBox> {
        let byte_stream = self.transport.post_stream(&request).await?;
        let provider = request.provider;

        let stream = try_stream! {
            use futures::StreamExt;

            let mut byte_stream = byte_stream;
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                for payload in decoder.push(&chunk) {
                    if payload == "[DONE]" {
                        debug!(provider = %provider, "stream sentinel received");
                        yield StreamEvent::Finish {
                            reason: "stop".to_string(),
                        };
                        return;
                    }
                    for event in parse_provider_chunk(provider, &payload)? {
                        let finished = event.is_finish();
                        yield event;
                        if finished {
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
