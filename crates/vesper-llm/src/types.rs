//! Streaming event vocabulary.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::LlmResult;

/// Type alias for boxed event streams.
pub type EventStreamBox = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// One event decoded from a provider stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// A text delta.
    Text(String),
    /// The model invoked a tool.
    ToolUse {
        /// Tool name.
        name: String,
        /// Tool input value.
        input: serde_json::Value,
    },
    /// Token accounting, possibly incremental.
    Usage {
        /// Prompt tokens.
        prompt_tokens: u64,
        /// Completion tokens.
        completion_tokens: u64,
    },
    /// Generation finished.
    Finish {
        /// Provider-reported finish reason; `stop` for the `[DONE]`
        /// sentinel.
        reason: String,
    },
}

impl StreamEvent {
    /// The text delta, if this is a text event.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(chunk) => Some(chunk),
            _ => None,
        }
    }

    /// Whether this event terminates the stream.
    #[must_use]
    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        assert_eq!(StreamEvent::Text("hi".to_string()).text(), Some("hi"));
        assert!(
            StreamEvent::Finish {
                reason: "stop".to_string()
            }
            .is_finish()
        );
        assert!(!StreamEvent::Text(String::new()).is_finish());
    }
}
