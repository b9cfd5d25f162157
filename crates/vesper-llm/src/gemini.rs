//! Google-style generate-content API: request body and SSE chunk
//! parsing.
//!
//! Text arrives in `candidates[0].content.parts[].text`; the stream
//! ends on `candidates[0].finishReason`. Token accounting comes in
//! `usageMetadata`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LlmError, LlmResult};
use crate::types::StreamEvent;

/// Endpoint template; `{model}` is substituted at request build time.
pub(crate) const API_URL_TEMPLATE: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/{model}:streamGenerateContent?alt=sse";

/// Endpoint for a concrete model.
pub(crate) fn api_url(model: &str) -> String {
    API_URL_TEMPLATE.replace("{model}", model)
}

/// Build the streaming request body.
pub(crate) fn build_body(prompt: &str, max_tokens: u32) -> Value {
    serde_json::json!({
        "contents": [{"role": "user", "parts": [{"text": prompt}]}],
        "generationConfig": {"maxOutputTokens": max_tokens},
    })
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: u64,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: u64,
}

/// Parse one SSE data payload into stream events.
pub(crate) fn parse_chunk(data: &str) -> LlmResult<Vec<StreamEvent>> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| LlmError::InvalidResponse(format!("gemini chunk: {e}")))?;

    let mut events = Vec::new();
    if let Some(candidate) = chunk.candidates.into_iter().next() {
        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(text) = part.text
                    && !text.is_empty()
                {
                    events.push(StreamEvent::Text(text));
                }
                if let Some(call) = part.function_call {
                    events.push(StreamEvent::ToolUse {
                        name: call.name,
                        input: call.args,
                    });
                }
            }
        }
        if let Some(reason) = candidate.finish_reason {
            events.push(StreamEvent::Finish { reason });
        }
    }
    if let Some(usage) = chunk.usage_metadata {
        events.push(StreamEvent::Usage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_part() {
        let events = parse_chunk(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(events, vec![StreamEvent::Text("Hello".to_string())]);
    }

    #[test]
    fn test_finish_reason() {
        let events = parse_chunk(
            r#"{"candidates":[{"content":{"parts":[{"text":"!"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            StreamEvent::Finish {
                reason: "STOP".to_string()
            }
        );
    }

    #[test]
    fn test_usage_metadata() {
        let events = parse_chunk(
            r#"{"candidates":[],"usageMetadata":{"promptTokenCount":7,"candidatesTokenCount":13}}"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::Usage {
                prompt_tokens: 7,
                completion_tokens: 13
            }]
        );
    }

    #[test]
    fn test_function_call_part() {
        let events = parse_chunk(
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"get_weather","args":{"city":"Oslo"}}}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::ToolUse {
                name: "get_weather".to_string(),
                input: serde_json::json!({"city": "Oslo"}),
            }]
        );
    }

    #[test]
    fn test_url_substitution() {
        assert!(api_url("gemini-2.0-pro").contains("models/gemini-2.0-pro:streamGenerateContent"));
    }
}
