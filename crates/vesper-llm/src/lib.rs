//! Vesper LLM - Inference backends behind narrow ports.
//!
//! The execution manager talks to two capability interfaces:
//!
//! - [`LocalRuntime`]: the on-device model runtime. Returns a lazy
//!   stream of text chunks; supports cooperative cancellation.
//! - [`CloudTransport`]: HTTPS POST returning a raw byte stream. The
//!   provider-specific request building and SSE chunk parsing live
//!   here, dispatched by [`CloudProviderKind`] tag; no virtual calls on
//!   the hot path.
//!
//! SSE framing is UTF-8, lines terminated by `\n`, records separated by
//! blank lines, data lines prefixed `data: `, sentinel `data: [DONE]`
//! (equivalent to a `stop` finish).
//!
//! [`CloudProviderKind`]: vesper_core::CloudProviderKind

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod claude;
mod error;
mod gemini;
mod openai_compat;
mod provider;
mod runtime;
mod sse;
mod transport;
mod types;

pub use error::{LlmError, LlmResult};
pub use provider::{CloudClient, build_request, parse_provider_chunk};
pub use runtime::{LocalRuntime, ScriptedRuntime, TextStreamBox};
pub use sse::SseDecoder;
pub use transport::{ByteStreamBox, CloudRequest, CloudTransport, ReqwestTransport};
pub use types::{EventStreamBox, StreamEvent};
