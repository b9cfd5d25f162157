//! OpenAI-style chat completions API: request body and SSE chunk
//! parsing.
//!
//! Text arrives in `choices[0].delta.content`; the stream ends on
//! `choices[0].finish_reason` or the `[DONE]` sentinel (handled by the
//! caller before chunks reach this parser).

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LlmError, LlmResult};
use crate::types::StreamEvent;

/// Endpoint for the chat completions API.
pub(crate) const API_URL: &str = "https://api.openai.com/v1/chat/completions";

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
struct StreamChunk {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Parse one SSE data payload into stream events.
pub(crate) fn parse_chunk(data: &str) -> LlmResult<Vec<StreamEvent>> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| LlmError::InvalidResponse(format!("openai chunk: {e}")))?;

    let mut events = Vec::new();
    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        });
    }
    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            events.push(StreamEvent::Text(content));
        }
        for call in choice.delta.tool_calls {
            if let Some(function) = call.function
                && let Some(name) = function.name
            {
                let input = function
                    .arguments
                    .as_deref()
                    .and_then(|args| serde_json::from_str(args).ok())
                    .unwrap_or(Value::Null);
                events.push(StreamEvent::ToolUse { name, input });
            }
        }
        if let Some(reason) = choice.finish_reason {
            events.push(StreamEvent::Finish { reason });
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_delta() {
        let events = parse_chunk(
            r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(events, vec![StreamEvent::Text("Hi".to_string())]);
    }

    #[test]
    fn test_finish_reason() {
        let events =
            parse_chunk(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::Finish {
                reason: "stop".to_string()
            }]
        );
    }

    #[test]
    fn test_usage_chunk() {
        let events = parse_chunk(
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":25}}"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::Usage {
                prompt_tokens: 10,
                completion_tokens: 25
            }]
        );
    }

    #[test]
    fn test_tool_call_delta() {
        let events = parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"function":{"name":"lookup","arguments":"{\"k\":1}"}}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::ToolUse {
                name: "lookup".to_string(),
                input: serde_json::json!({"k": 1}),
            }]
        );
    }

    #[test]
    fn test_content_and_finish_in_one_chunk() {
        let events = parse_chunk(
            r#"{"choices":[{"delta":{"content":"bye"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::Text("bye".to_string()));
        assert!(events[1].is_finish());
    }

    #[test]
    fn test_malformed_chunk_errors() {
        assert!(matches!(
            parse_chunk("not json"),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
