//! A stand-in local runtime for machines without a model backend.
//!
//! The real runtime loads weights and generates on the accelerator;
//! that integration lives outside this repository. The echo runtime
//! keeps the harness usable end to end: it streams the prompt back in
//! small chunks so routing, streaming, cancellation, and audit all
//! exercise the same paths they would with a real model.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use vesper_core::ModelClass;
use vesper_llm::{LlmError, LlmResult, LocalRuntime, TextStreamBox};

const CHUNK_CHARS: usize = 24;

pub(crate) struct EchoRuntime {
    cancelled: Arc<AtomicBool>,
}

impl EchoRuntime {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl LocalRuntime for EchoRuntime {
    async fn generate(&self, model: ModelClass, prompt: &str) -> LlmResult<TextStreamBox> {
        self.cancelled.store(false, Ordering::SeqCst);
        let cancelled = Arc::clone(&self.cancelled);
        let text = format!("[{model} echo] {prompt}");

        let chunks: Vec<String> = text
            .chars()
            .collect::<Vec<_>>()
            .chunks(CHUNK_CHARS)
            .map(|c| c.iter().collect())
            .collect();

        let stream = async_stream::try_stream! {
            for chunk in chunks {
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
