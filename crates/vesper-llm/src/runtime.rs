//! The local runtime port.
//!
//! The real backend loads model weights and generates tokens on the
//! accelerator; that lives outside the core. The port is narrow: start
//! a generation, get a lazy stream of text chunks, cancel
//! cooperatively. [`ScriptedRuntime`] ships for tests and dry runs.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use vesper_core::ModelClass;

use crate::error::{LlmError, LlmResult};

/// Type alias for boxed text-chunk streams.
pub type TextStreamBox = Pin<Box<dyn Stream<Item = LlmResult<String>> + Send>>;

/// Port to the on-device model runtime.
#[async_trait]
pub trait LocalRuntime: Send + Sync {
    /// Start generating for the prompt on the given model class.
    ///
    /// Returns a lazy stream of text chunks in generation order.
    ///
    /// # Errors
    ///
    /// `RuntimeBusy` when a generation is already running, `Config`
    /// when the model cannot be loaded.
    async fn generate(&self, model: ModelClass, prompt: &str) -> LlmResult<TextStreamBox>;

    /// Cancel the in-flight generation, if any. The active stream
    /// terminates with [`LlmError::Cancelled`].
    async fn cancel(&self);
}

/// Deterministic runtime for tests: replays scripted chunks with an
/// optional inter-chunk delay.
pub struct ScriptedRuntime {
    chunks: Vec<String>,
    chunk_delay: Duration,
    cancelled: Arc<AtomicBool>,
}

impl ScriptedRuntime {
    /// Replay the given chunks with no delay.
    #[must_use]
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            chunk_delay: Duration::ZERO,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replay with a fixed delay before each chunk.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

#[async_trait]
impl LocalRuntime for ScriptedRuntime {
    async fn generate(&self, _model: ModelClass, _prompt: &str) -> LlmResult<TextStreamBox> {
        self.cancelled.store(false, Ordering::SeqCst);
        let cancelled = Arc::clone(&self.cancelled);
        let delay = self.chunk_delay;
        let chunks = self.chunks.clone();

        let stream = async_stream::try_stream! {
            for chunk in chunks {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if cancelled.load(Ordering::SeqCst) {
                    Err(LlmError::Cancelled)?;
                }
                yield chunk;
            }
        };
        Ok(Box::pin(stream))
    }

    async fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_scripted_chunks_in_order() {
        let runtime = ScriptedRuntime::new(vec!["a".into(), "b".into(), "c".into()]);
        let mut stream = runtime.generate(ModelClass::Compact, "hi").await.unwrap();

        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            out.push_str(&chunk.unwrap());
        }
        assert_eq!(out, "abc");
    }

    #[tokio::test]
    async fn test_cancel_terminates_stream() {
        let runtime = ScriptedRuntime::new(vec!["a".into(), "b".into(), "c".into()])
            .with_delay(Duration::from_millis(20));
        let mut stream = runtime.generate(ModelClass::Compact, "hi").await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "a");
        runtime.cancel().await;

        let second = stream.next().await.unwrap();
        assert!(matches!(second, Err(LlmError::Cancelled)));
    }
}
