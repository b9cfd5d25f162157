//! Prelude module - commonly used types for convenient import.

pub use crate::{
    ByteStreamBox, CloudClient, CloudRequest, CloudTransport, EventStreamBox, LlmError, LlmResult,
    LocalRuntime, ReqwestTransport, ScriptedRuntime, SseDecoder, StreamEvent, TextStreamBox,
    build_request, parse_provider_chunk,
};
