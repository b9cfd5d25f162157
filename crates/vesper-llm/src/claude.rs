//! Anthropic-style messages API: request body and SSE chunk parsing.
//!
//! Text arrives as `content_block_delta` events carrying `delta.text`;
//! the stream ends on `message_stop` (or a `message_delta` with a stop
//! reason). Tool invocations open with a `tool_use` content block.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LlmError, LlmResult};
use crate::types::StreamEvent;

/// Endpoint for the messages API.
pub(crate) const API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Build the streaming request body.
pub(crate) fn build_body(model: &str, prompt: &str, max_tokens: u32) -> Value {
    serde_json::json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{"role": "user", "content": prompt}],
        "stream": true,
    })
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(dead_code)] // Fields required for deserialization
enum StreamingEvent {
    MessageStart {
        #[serde(default)]
        message: Value,
    },
    ContentBlockStart {
        #[serde(default)]
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: usize,
        delta: Delta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        delta: Value,
        #[serde(default)]
        usage: Option<DeltaUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: Value,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(dead_code)] // Fields required for deserialization
enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(dead_code)] // Fields required for deserialization
enum Delta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Deserialize)]
struct DeltaUsage {
    #[serde(default)]
    input_tokens: u64,
    output_tokens: u64,
}

/// Parse one SSE data payload into stream events.
///
/// Unknown event types are skipped; a provider `error` event fails the
/// stream.
pub(crate) fn parse_chunk(data: &str) -> LlmResult<Vec<StreamEvent>> {
    let event: StreamingEvent = serde_json::from_str(data)
        .map_err(|e| LlmError::InvalidResponse(format!("anthropic chunk: {e}")))?;

    let events = match event {
        StreamingEvent::ContentBlockDelta { delta, .. } => match delta {
            Delta::TextDelta { text } => vec![StreamEvent::Text(text)],
            Delta::InputJsonDelta { .. } => Vec::new(),
        },
        StreamingEvent::ContentBlockStart { content_block, .. } => match content_block {
            ContentBlock::ToolUse { name, input, .. } => {
                vec![StreamEvent::ToolUse { name, input }]
            },
            ContentBlock::Text { .. } => Vec::new(),
        },
        StreamingEvent::MessageDelta { delta, usage } => {
            let mut events = Vec::new();
            if let Some(usage) = usage {
                events.push(StreamEvent::Usage {
                    prompt_tokens: usage.input_tokens,
                    completion_tokens: usage.output_tokens,
                });
            }
            if let Some(reason) = delta.get("stop_reason").and_then(Value::as_str) {
                events.push(StreamEvent::Finish {
                    reason: reason.to_string(),
                });
            }
            events
        },
        StreamingEvent::MessageStop => vec![StreamEvent::Finish {
            reason: "stop".to_string(),
        }],
        StreamingEvent::Error { error } => {
            return Err(LlmError::StreamError(error.to_string()));
        },
        StreamingEvent::MessageStart { .. }
        | StreamingEvent::ContentBlockStop { .. }
        | StreamingEvent::Ping => Vec::new(),
    };
    Ok(events)
}
