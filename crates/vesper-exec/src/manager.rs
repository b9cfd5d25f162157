//! The hybrid execution manager.
//!
//! Owns the accelerator lock, the cloud concurrency cap, the guards
//! (breaker, bucket, retry), the redaction gate, and result signing.
//! Immediately before dispatch it re-reads `(SystemState,
//! SecurityPolicy, NetworkReachability)` and re-applies the policy
//! gate, so a stale decision is revalidated or downgraded at the last
//! moment.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vesper_audit::{AuditLog, AuditPayload};
use vesper_config::RouterConfig;
use vesper_core::{
    ChannelId, CloudProviderKind, ComplexityLevel, ExecutionLocation, ExecutionResult, IntentId,
    ModelClass, NetworkReachability, Prompt, RouterDecision, RouterError, RouterResult,
    SecurityPolicy, SystemState, TaskKind, TokenUsage,
};
use vesper_creds::CredentialStore;
use vesper_crypto::{ResultSigner, SignatureVerdict, SigningKeystore};
use vesper_events::{EventBus, EventMetadata, RouterEvent};
use vesper_guard::{BreakerRegistry, RateLimiter, RetryPolicy};
use vesper_llm::{
    CloudClient, CloudTransport, LlmError, LocalRuntime, StreamEvent, build_request,
};
use vesper_probe::SystemProbe;
use vesper_router::{PolicyManager, RoutingEngine};
use vesper_sanitize::PrivacyEgressFilter;

use crate::admission::AcceleratorLock;

/// Rough character-per-token ratio used when a backend reports no
/// usage.
const CHARS_PER_TOKEN: u64 = 4;

/// The external ports the manager executes through.
pub struct ManagerPorts {
    /// On-device model runtime.
    pub runtime: Arc<dyn LocalRuntime>,
    /// HTTPS transport.
    pub transport: Arc<dyn CloudTransport>,
    /// Credential store keyed by provider.
    pub credentials: Arc<dyn CredentialStore>,
    /// Keystore holding the result-signing key.
    pub keystore: Arc<dyn SigningKeystore>,
}

/// One admitted request, sanitized and assessed.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Intent id covering the whole lifecycle.
    pub intent_id: IntentId,
    /// Submission channel; per-channel ordering is FIFO.
    pub channel: ChannelId,
    /// Sanitized prompt plus the caller's hint.
    pub prompt: Prompt,
    /// Assessed complexity.
    pub complexity: ComplexityLevel,
    /// Classified task kind.
    pub task: TaskKind,
    /// Whether the input gate already redacted PII from the prompt.
    /// Folded into `redaction_applied` for cloud-bound requests so the
    /// audit records that sensitive content never left the device,
    /// whichever gate caught it.
    pub input_pii_redacted: bool,
}

/// Sink for streaming events to a caller.
pub(crate) type EventSink = mpsc::Sender<RouterResult<StreamEvent>>;

/// The hybrid execution manager.
pub struct HybridExecutionManager {
    runtime: Arc<dyn LocalRuntime>,
    cloud: CloudClient,
    credentials: Arc<dyn CredentialStore>,
    egress: PrivacyEgressFilter,
    engine: Arc<RoutingEngine>,
    policy: Arc<PolicyManager>,
    probe: Arc<SystemProbe>,
    breakers: BreakerRegistry,
    limiter: RateLimiter,
    retry: RetryPolicy,
    audit: Arc<AuditLog>,
    signer: ResultSigner,
    accelerator: AcceleratorLock,
    cloud_slots: Arc<Semaphore>,
    memory_denied: Arc<AtomicBool>,
    version_counter: AtomicU64,
    bus: EventBus,
    config: RouterConfig,
}

impl HybridExecutionManager {
    /// Wire the manager together.
    #[must_use]
    pub fn new(
        ports: ManagerPorts,
        egress: PrivacyEgressFilter,
        engine: Arc<RoutingEngine>,
        policy: Arc<PolicyManager>,
        probe: Arc<SystemProbe>,
        audit: Arc<AuditLog>,
        bus: EventBus,
        config: RouterConfig,
    ) -> Self {
        Self {
            runtime: ports.runtime,
            cloud: CloudClient::new(ports.transport),
            credentials: ports.credentials,
            egress,
            engine,
            policy,
            probe,
            breakers: BreakerRegistry::new(config.circuit_breaker),
            limiter: RateLimiter::new(config.rate_limit),
            retry: RetryPolicy::new(config.retry),
            audit,
            signer: ResultSigner::new(ports.keystore),
            accelerator: AcceleratorLock::new(),
            cloud_slots: Arc::new(Semaphore::new(config.max_concurrent_cloud_streams)),
            memory_denied: Arc::new(AtomicBool::new(false)),
            version_counter: AtomicU64::new(0),
            bus,
            config,
        }
    }

    /// Whether a local inference currently holds the accelerator.
    #[must_use]
    pub fn is_inference_active(&self) -> bool {
        self.accelerator.is_active()
    }

    /// Whether memory pressure currently denies local admission.
    #[must_use]
    pub fn memory_pressure_denied(&self) -> bool {
        self.memory_denied.load(Ordering::Acquire)
    }

    /// Watch memory-pressure events: critical pressure denies local
    /// admission, and the denial clears on the next return to normal.
    pub fn spawn_pressure_watcher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let denied = Arc::clone(&self.memory_denied);
        let mut receiver = self.bus.subscribe();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let RouterEvent::MemoryPressureChanged { level, .. } = event.as_ref() {
                    match level {
                        vesper_core::MemoryPressureLevel::Critical => {
                            warn!("critical memory pressure, denying local admission");
                            denied.store(true, Ordering::Release);
                        },
                        vesper_core::MemoryPressureLevel::Normal => {
                            if denied.swap(false, Ordering::AcqRel) {
                                info!("memory pressure recovered, local admission restored");
                            }
                        },
                        vesper_core::MemoryPressureLevel::Warning => {},
                    }
                }
            }
        })
    }

    /// Execute one admitted request to a terminal state.
    ///
    /// Streaming callers pass a sink; chunks are forwarded in order as
    /// they arrive and the accumulated output is also returned. Every
    /// terminal state emits exactly one audit record.
    ///
    /// # Errors
    ///
    /// Any kind from the router taxonomy; see the crate docs for the
    /// admission rules.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
        sink: Option<&EventSink>,
    ) -> RouterResult<ExecutionResult> {
        let started = Instant::now();
        let mut chunks_delivered = 0usize;
        let mut buffer = String::new();

        let outcome = self
            .run(ctx, cancel, sink, &mut chunks_delivered, &mut buffer)
            .await;

        match outcome {
            Ok((location, mut usage, redaction_applied)) => {
                if usage == TokenUsage::default() {
                    usage = approximate_usage(ctx.prompt.text(), &buffer);
                }
                let version = self.version_counter.fetch_add(1, Ordering::SeqCst);
                let signature = self
                    .signer
                    .sign(version, buffer.as_bytes())
                    .map(|tag| format!("{version}:{tag}"));

                let result = ExecutionResult {
                    intent_id: ctx.intent_id.clone(),
                    output: buffer,
                    location,
                    tokens_used: usage,
                    duration: started.elapsed(),
                    redaction_applied,
                    signature,
                };

                self.audit_best_effort(&AuditPayload::ExecutionCompleted {
                    intent_id: ctx.intent_id.clone(),
                    location,
                    tokens_used: usage.total(),
                    duration_ms: u64::try_from(started.elapsed().as_millis())
                        .unwrap_or(u64::MAX),
                    redaction_applied,
                });
                self.publish_finished(ctx, "completed");
                Ok(result)
            },
            Err(RouterError::Cancelled) => {
                self.audit_best_effort(&AuditPayload::Cancelled {
                    intent_id: ctx.intent_id.clone(),
                    chunks_delivered,
                });
                self.publish_finished(ctx, "cancelled");
                Err(RouterError::Cancelled)
            },
            Err(err) => {
                self.audit_best_effort(&AuditPayload::ExecutionFailed {
                    intent_id: ctx.intent_id.clone(),
                    error_kind: err.kind().to_string(),
                    detail: err.to_string(),
                });
                self.publish_finished(ctx, "failed");
                Err(err)
            },
        }
    }

    /// Verify a result signature produced by this manager.
    #[must_use]
    pub fn verify_result(&self, result: &ExecutionResult) -> SignatureVerdict {
        let Some(signature) = result.signature.as_deref() else {
            return self.signer.verify(0, result.output.as_bytes(), None);
        };
        let Some((version, tag)) = signature.split_once(':') else {
            return SignatureVerdict::Unverified;
        };
        let Ok(version) = version.parse::<u64>() else {
            return SignatureVerdict::Unverified;
        };
        self.signer
            .verify(version, result.output.as_bytes(), Some(tag))
    }

    async fn run(
        &self,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
        sink: Option<&EventSink>,
        chunks_delivered: &mut usize,
        buffer: &mut String,
    ) -> RouterResult<(ExecutionLocation, TokenUsage, bool)> {
        // Fresh state at admission: the decision that got us here may
        // be milliseconds stale.
        let (state, reachability) = self.probe.settled_snapshot().await;
        let policy = self.policy.snapshot();
        let creds = self.providers_with_credentials();

        let request = vesper_router::RouteRequest {
            prompt: &ctx.prompt,
            complexity: ctx.complexity,
            task: ctx.task,
            state: &state,
            policy: &policy,
            reachability,
            providers_with_credentials: creds.clone(),
        };
        let (decision, reason) = self.engine.decide(&request)?;
        debug!(intent = %ctx.intent_id, decision = %decision, reason = %reason, "admission revalidated");

        match decision {
            RouterDecision::Local { model } => {
                self.dispatch_local(
                    ctx,
                    model,
                    &state,
                    &policy,
                    reachability,
                    &creds,
                    cancel,
                    sink,
                    chunks_delivered,
                    buffer,
                )
                .await
            },
            RouterDecision::Cloud { provider, model } => {
                let (usage, redacted) = self
                    .run_cloud(ctx, provider, &model, cancel, sink, chunks_delivered, buffer)
                    .await?;
                Ok((ExecutionLocation::Cloud, usage, redacted))
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_local(
        &self,
        ctx: &ExecutionContext,
        model: ModelClass,
        state: &SystemState,
        policy: &SecurityPolicy,
        reachability: NetworkReachability,
        creds: &BTreeSet<CloudProviderKind>,
        cancel: &CancellationToken,
        sink: Option<&EventSink>,
        chunks_delivered: &mut usize,
        buffer: &mut String,
    ) -> RouterResult<(ExecutionLocation, TokenUsage, bool)> {
        let guard = if self.memory_denied.load(Ordering::Acquire) {
            None
        } else {
            self.accelerator.try_acquire()
        };

        if let Some(guard) = guard {
            let usage = self
                .run_local(ctx, model, cancel, sink, chunks_delivered, buffer)
                .await;
            drop(guard);
            return usage.map(|usage| (ExecutionLocation::Local, usage, false));
        }

        // Accelerator busy (or memory pressure denies it). Fall back to
        // cloud when the caller and policy allow it.
        if ctx.prompt.hint().force_local {
            return Err(RouterError::SystemBusy);
        }
        let mut fallback_hint = ctx.prompt.hint().clone();
        fallback_hint.force_cloud = true;
        let fallback_prompt = Prompt::with_hint(ctx.prompt.text(), fallback_hint);
        let request = vesper_router::RouteRequest {
            prompt: &fallback_prompt,
            complexity: ctx.complexity,
            task: ctx.task,
            state,
            policy,
            reachability,
            providers_with_credentials: creds.clone(),
        };
        match self.engine.decide(&request) {
            Ok((RouterDecision::Cloud { provider, model }, reason)) => {
                debug!(intent = %ctx.intent_id, reason = %reason, "accelerator busy, downgraded to cloud");
                let (usage, redacted) = self
                    .run_cloud(ctx, provider, &model, cancel, sink, chunks_delivered, buffer)
                    .await?;
                Ok((ExecutionLocation::Cloud, usage, redacted))
            },
            _ => Err(RouterError::SystemBusy),
        }
    }

    async fn run_local(
        &self,
        ctx: &ExecutionContext,
        model: ModelClass,
        cancel: &CancellationToken,
        sink: Option<&EventSink>,
        chunks_delivered: &mut usize,
        buffer: &mut String,
    ) -> RouterResult<TokenUsage> {
        let ceiling = self.local_ceiling(model);
        let mut stream = self
            .runtime
            .generate(model, ctx.prompt.text())
            .await
            .map_err(classify_llm)?;

        let deadline = tokio::time::sleep(ceiling);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    self.runtime.cancel().await;
                    return Err(RouterError::Cancelled);
                },
                () = &mut deadline => {
                    self.runtime.cancel().await;
                    return Err(RouterError::Timeout);
                },
                chunk = stream.next() => match chunk {
                    Some(Ok(text)) => {
                        buffer.push_str(&text);
                        *chunks_delivered = chunks_delivered.saturating_add(1);
                        forward(sink, StreamEvent::Text(text)).await;
                    },
                    Some(Err(err)) => return Err(classify_llm(err)),
                    None => break,
                },
            }
        }

        forward(
            sink,
            StreamEvent::Finish {
                reason: "stop".to_string(),
            },
        )
        .await;
        Ok(TokenUsage::default())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_cloud(
        &self,
        ctx: &ExecutionContext,
        provider: CloudProviderKind,
        model: &str,
        cancel: &CancellationToken,
        sink: Option<&EventSink>,
        chunks_delivered: &mut usize,
        buffer: &mut String,
    ) -> RouterResult<(TokenUsage, bool)> {
        let _permit = self
            .cloud_slots
            .acquire()
            .await
            .map_err(|_| RouterError::Internal("cloud slot semaphore closed".to_string()))?;

        if !self.limiter.try_consume(&ctx.channel, Instant::now()) {
            return Err(RouterError::RateLimited { retry_after: None });
        }
        if !self.breakers.admit(provider, Instant::now()) {
            return Err(RouterError::CircuitOpen { provider });
        }

        let secret = self
            .credentials
            .get(provider)
            .map_err(|e| RouterError::Internal(e.to_string()))?
            .ok_or(RouterError::CredentialMissing { provider })?;

        // Redaction gate: nothing leaves the process unfiltered. The
        // input gate may have caught PII first; either way the payload
        // is reported as redacted.
        let report = self.egress.filter(ctx.prompt.text(), &self.config.egress);
        let redaction_applied = report.redaction_applied() || ctx.input_pii_redacted;
        let max_tokens = ctx
            .prompt
            .hint()
            .token_budget
            .unwrap_or_else(|| ctx.complexity.token_range_hint().1);

        let mut attempt = 0u32;
        loop {
            let request = build_request(
                provider,
                model,
                &report.filtered,
                secret.expose().to_string(),
                max_tokens,
                self.config.timeouts.cloud_request(),
                self.config.timeouts.cloud_resource(),
            );

            match self
                .consume_cloud_stream(request, cancel, sink, chunks_delivered, buffer)
                .await
            {
                Ok(usage) => {
                    self.breakers.record_success(provider);
                    return Ok((usage, redaction_applied));
                },
                Err(LlmError::Cancelled) => return Err(RouterError::Cancelled),
                Err(err) => {
                    self.breakers.record_failure(provider, Instant::now());

                    // Partial output already reached the caller; a
                    // retry would replay it.
                    let retryable =
                        err.is_retryable() && *chunks_delivered == 0 && attempt < self.retry.max_retries();
                    if !retryable {
                        return Err(classify_llm(err));
                    }

                    let retry_after = match &err {
                        LlmError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let delay = self.retry.delay_with_override(attempt, retry_after);
                    debug!(
                        provider = %provider,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying cloud dispatch"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(RouterError::Cancelled),
                        () = tokio::time::sleep(delay) => {},
                    }
                    attempt = attempt.saturating_add(1);
                },
            }
        }
    }

    /// Consume one streaming attempt to completion.
    async fn consume_cloud_stream(
        &self,
        request: vesper_llm::CloudRequest,
        cancel: &CancellationToken,
        sink: Option<&EventSink>,
        chunks_delivered: &mut usize,
        buffer: &mut String,
    ) -> Result<TokenUsage, LlmError> {
        let mut stream = self.cloud.stream_events(request).await?;
        let mut usage = TokenUsage::default();
        let stall = self.config.timeouts.stall();

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return Err(LlmError::Cancelled),
                next = tokio::time::timeout(stall, stream.next()) => next,
            };
            let Ok(next) = next else {
                return Err(LlmError::Stalled);
            };
            match next {
                Some(Ok(event)) => {
                    match &event {
                        StreamEvent::Text(chunk) => {
                            buffer.push_str(chunk);
                            *chunks_delivered = chunks_delivered.saturating_add(1);
                        },
                        StreamEvent::Usage {
                            prompt_tokens,
                            completion_tokens,
                        } => {
                            usage.absorb(TokenUsage {
                                prompt_tokens: *prompt_tokens,
                                completion_tokens: *completion_tokens,
                            });
                        },
                        StreamEvent::ToolUse { .. } | StreamEvent::Finish { .. } => {},
                    }
                    let finished = event.is_finish();
                    forward(sink, event).await;
                    if finished {
                        return Ok(usage);
                    }
                },
                Some(Err(err)) => return Err(err),
                // Stream ended without a finish event; treat the
                // accumulated output as complete.
                None => return Ok(usage),
            }
        }
    }

    fn providers_with_credentials(&self) -> BTreeSet<CloudProviderKind> {
        CloudProviderKind::ALL
            .into_iter()
            .filter(|p| self.credentials.has(*p).unwrap_or(false))
            .collect()
    }

    fn local_ceiling(&self, model: ModelClass) -> Duration {
        let base = match model {
            ModelClass::Compact => Duration::from_secs(30),
            ModelClass::Standard => Duration::from_secs(60),
            ModelClass::Large => Duration::from_secs(120),
        };
        base.max(self.config.timeouts.local_minimum())
    }

    fn audit_best_effort(&self, payload: &AuditPayload) {
        if let Err(err) = self.audit.append(payload) {
            warn!(error = %err, "audit append failed");
        }
    }

    fn publish_finished(&self, ctx: &ExecutionContext, outcome: &str) {
        self.bus.publish(RouterEvent::ExecutionFinished {
            metadata: EventMetadata::new("execution-manager"),
            intent_id: ctx.intent_id.clone(),
            outcome: outcome.to_string(),
        });
    }
}

async fn forward(sink: Option<&EventSink>, event: StreamEvent) {
    if let Some(sink) = sink {
        // A dropped receiver just means the caller stopped listening.
        let _ = sink.send(Ok(event)).await;
    }
}

fn approximate_usage(prompt: &str, output: &str) -> TokenUsage {
    TokenUsage {
        prompt_tokens: (prompt.len() as u64) / CHARS_PER_TOKEN,
        completion_tokens: (output.len() as u64) / CHARS_PER_TOKEN,
    }
}

/// Reclassify backend errors into the router taxonomy.
fn classify_llm(err: LlmError) -> RouterError {
    match err {
        LlmError::CredentialMissing { provider } => RouterError::CredentialMissing { provider },
        LlmError::RateLimited { retry_after } => RouterError::RateLimited { retry_after },
        LlmError::Http { status, message } => RouterError::ProviderError {
            code: status,
            message,
        },
        LlmError::Stalled => RouterError::Timeout,
        LlmError::Transport(message) => {
            if message.contains("timed out") {
                RouterError::Timeout
            } else {
                RouterError::ProviderError { code: 0, message }
            }
        },
        LlmError::InvalidResponse(message) | LlmError::StreamError(message) => {
            RouterError::ProviderError { code: 0, message }
        },
        LlmError::Config(message) => RouterError::Internal(message),
        LlmError::RuntimeBusy => RouterError::SystemBusy,
        LlmError::Cancelled => RouterError::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use vesper_audit::MemoryAuditStorage;
    use vesper_creds::MemoryCredentialStore;
    use vesper_crypto::MemoryKeystore;
    use vesper_llm::{ByteStreamBox, CloudRequest, LlmResult, ScriptedRuntime};
    use vesper_probe::{MonitorConfig, StaticSensors, SystemSensors};
    use vesper_router::ModelCatalog;
    use vesper_sanitize::PatternCatalog;

    /// One scripted transport response.
    #[derive(Debug, Clone)]
    enum Step {
        /// Serve the body as the response byte stream.
        Body(String),
        /// Fail with 429 and an optional `Retry-After`.
        RateLimited(Option<Duration>),
        /// Fail with an HTTP status.
        Http(u16, String),
    }

    /// Transport scripted with one response per attempt; the last step
    /// repeats for any further attempts.
    struct ScriptedTransport {
        script: Mutex<Vec<Step>>,
        requests_seen: Arc<Mutex<Vec<CloudRequest>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Step>) -> Self {
            Self {
                script: Mutex::new(script),
                requests_seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn always(body: &str) -> Self {
            Self::new(vec![Step::Body(body.to_string())])
        }

        fn requests(&self) -> Arc<Mutex<Vec<CloudRequest>>> {
            Arc::clone(&self.requests_seen)
        }
    }

    #[async_trait]
    impl CloudTransport for ScriptedTransport {
        async fn post_stream(&self, request: &CloudRequest) -> LlmResult<ByteStreamBox> {
            self.requests_seen.lock().unwrap().push(request.clone());
            let mut script = self.script.lock().unwrap();
            let step = if script.len() > 1 {
                script.remove(0)
            } else {
                script
                    .first()
                    .cloned()
                    .unwrap_or(Step::Http(500, "script exhausted".into()))
            };
            match step {
                Step::Body(body) => {
                    let bytes: LlmResult<Vec<u8>> = Ok(body.into_bytes());
                    Ok(Box::pin(futures::stream::iter(vec![bytes])))
                },
                Step::RateLimited(retry_after) => Err(LlmError::RateLimited { retry_after }),
                Step::Http(status, message) => Err(LlmError::Http { status, message }),
            }
        }
    }

    const ANTHROPIC_OK: &str = concat!(
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"cloud says hi\"}}\n\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );

    struct Harness {
        manager: Arc<HybridExecutionManager>,
        sensors: Arc<StaticSensors>,
        policy: Arc<PolicyManager>,
        audit: Arc<AuditLog>,
        probe: Arc<SystemProbe>,
        bus: EventBus,
    }

    struct HarnessSpec {
        runtime: Arc<dyn LocalRuntime>,
        transport: Arc<dyn CloudTransport>,
        creds: Arc<dyn CredentialStore>,
        config: RouterConfig,
    }

    impl Default for HarnessSpec {
        fn default() -> Self {
            Self {
                runtime: Arc::new(ScriptedRuntime::new(vec!["local ".into(), "reply".into()])),
                transport: Arc::new(ScriptedTransport::always(ANTHROPIC_OK)),
                creds: Arc::new(MemoryCredentialStore::new()),
                config: RouterConfig::default(),
            }
        }
    }

    fn quick_monitors() -> MonitorConfig {
        MonitorConfig {
            thermal_interval: Duration::from_secs(3600),
            memory_interval: Duration::from_secs(3600),
            battery_interval: Duration::from_secs(3600),
            gpu_interval: Duration::from_secs(3600),
            cpu_interval: Duration::from_secs(3600),
            apps_interval: Duration::from_secs(3600),
            network_interval: Duration::from_secs(3600),
        }
    }

    fn harness(spec: HarnessSpec) -> Harness {
        let sensors = Arc::new(StaticSensors::healthy());
        let bus = EventBus::new();
        let probe = Arc::new(SystemProbe::start(
            Arc::clone(&sensors) as Arc<dyn SystemSensors>,
            bus.clone(),
            quick_monitors(),
        ));
        let policy = Arc::new(PolicyManager::default());
        let audit = Arc::new(AuditLog::open(Box::new(MemoryAuditStorage::new())).unwrap());
        let catalog = Arc::new(PatternCatalog::compile());
        let engine = Arc::new(RoutingEngine::new(
            ModelCatalog::builtin(),
            spec.config.clone(),
        ));

        let manager = Arc::new(HybridExecutionManager::new(
            ManagerPorts {
                runtime: spec.runtime,
                transport: spec.transport,
                credentials: spec.creds,
                keystore: Arc::new(MemoryKeystore::default()),
            },
            PrivacyEgressFilter::new(catalog),
            engine,
            Arc::clone(&policy),
            Arc::clone(&probe),
            Arc::clone(&audit),
            bus.clone(),
            spec.config,
        ));
        manager.spawn_pressure_watcher();

        Harness {
            manager,
            sensors,
            policy,
            audit,
            probe,
            bus,
        }
    }

    fn ctx(text: &str) -> ExecutionContext {
        ctx_with_hint(text, vesper_core::ExecutionHint::default())
    }

    fn ctx_with_hint(text: &str, hint: vesper_core::ExecutionHint) -> ExecutionContext {
        ExecutionContext {
            intent_id: IntentId::new(),
            channel: ChannelId::interactive(),
            prompt: Prompt::with_hint(text, hint),
            complexity: ComplexityLevel::Low,
            task: TaskKind::General,
            input_pii_redacted: false,
        }
    }

    fn anthropic_creds() -> Arc<dyn CredentialStore> {
        Arc::new(MemoryCredentialStore::with(
            CloudProviderKind::Anthropic,
            "sk-ant-test",
        ))
    }

    #[tokio::test]
    async fn test_local_execution_streams_and_signs() {
        let h = harness(HarnessSpec::default());
        let cancel = CancellationToken::new();

        let before = h.audit.len().unwrap();
        let result = h
            .manager
            .execute(&ctx("What is 2+2?"), &cancel, None)
            .await
            .unwrap();

        assert_eq!(result.output, "local reply");
        assert_eq!(result.location, ExecutionLocation::Local);
        assert!(!result.redaction_applied);
        assert_eq!(
            h.manager.verify_result(&result),
            SignatureVerdict::Verified
        );
        // Exactly one audit entry for the terminal state.
        assert_eq!(h.audit.len().unwrap(), before + 1);
        assert!(h.audit.verify_chain().unwrap().valid);
    }

    #[tokio::test]
    async fn test_tampered_output_fails_verification() {
        let h = harness(HarnessSpec::default());
        let mut result = h
            .manager
            .execute(&ctx("What is 2+2?"), &CancellationToken::new(), None)
            .await
            .unwrap();

        result.output.push_str(" tampered");
        assert_eq!(
            h.manager.verify_result(&result),
            SignatureVerdict::Unverified
        );
    }

    #[tokio::test]
    async fn test_cloud_execution_redacts_outbound_payload() {
        let transport = Arc::new(ScriptedTransport::always(ANTHROPIC_OK));
        let requests = transport.requests();
        let h = harness(HarnessSpec {
            transport,
            creds: anthropic_creds(),
            ..HarnessSpec::default()
        });

        let hint = vesper_core::ExecutionHint::cloud();
        let result = h
            .manager
            .execute(
                &ctx_with_hint(
                    "Email me at alice@example.com about SSN 123-45-6789",
                    hint,
                ),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.location, ExecutionLocation::Cloud);
        assert!(result.redaction_applied);

        let seen = requests.lock().unwrap();
        let body = seen[0].body.to_string();
        assert!(body.contains("[REDACTED_PII]"));
        assert!(!body.contains("alice@example.com"));
        assert!(!body.contains("123-45-6789"));
    }

    #[tokio::test]
    async fn test_circuit_open_rejects_without_http() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Http(
            503,
            "unavailable".into(),
        )]));
        let requests = transport.requests();
        let config = RouterConfig {
            retry: vesper_config::RetrySettings {
                max_retries: 0,
                ..vesper_config::RetrySettings::default()
            },
            ..RouterConfig::default()
        };
        let h = harness(HarnessSpec {
            transport,
            creds: anthropic_creds(),
            config,
            ..HarnessSpec::default()
        });

        let hint = vesper_core::ExecutionHint::cloud();
        // Five consecutive failures trip the breaker.
        for _ in 0..5 {
            let err = h
                .manager
                .execute(
                    &ctx_with_hint("hello cloud", hint.clone()),
                    &CancellationToken::new(),
                    None,
                )
                .await
                .unwrap_err();
            assert!(matches!(err, RouterError::ProviderError { code: 503, .. }));
        }
        let dispatched_so_far = requests.lock().unwrap().len();

        // The sixth request is rejected by the breaker with no HTTP.
        let err = h
            .manager
            .execute(
                &ctx_with_hint("hello cloud", hint),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::CircuitOpen {
                provider: CloudProviderKind::Anthropic
            }
        ));
        assert_eq!(requests.lock().unwrap().len(), dispatched_so_far);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_honored_then_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Step::RateLimited(Some(Duration::from_secs(2))),
            Step::Body(ANTHROPIC_OK.to_string()),
        ]));
        let requests = transport.requests();
        let h = harness(HarnessSpec {
            transport,
            creds: anthropic_creds(),
            ..HarnessSpec::default()
        });

        let started = tokio::time::Instant::now();
        let result = h
            .manager
            .execute(
                &ctx_with_hint("hello", vesper_core::ExecutionHint::cloud()),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.output, "cloud says hi");
        assert_eq!(requests.lock().unwrap().len(), 2);
        // The first retry waited exactly the Retry-After delay.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_non_retryable_error_surfaces_immediately() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Http(
            401,
            "bad key".into(),
        )]));
        let requests = transport.requests();
        let h = harness(HarnessSpec {
            transport,
            creds: anthropic_creds(),
            ..HarnessSpec::default()
        });

        let err = h
            .manager
            .execute(
                &ctx_with_hint("hello", vesper_core::ExecutionHint::cloud()),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::ProviderError { code: 401, .. }));
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_mid_stream_releases_lock_and_audits() {
        let runtime = Arc::new(
            ScriptedRuntime::new(vec![
                "one ".into(),
                "two ".into(),
                "three ".into(),
                "four ".into(),
                "five ".into(),
            ])
            .with_delay(Duration::from_millis(50)),
        );
        let h = harness(HarnessSpec {
            runtime,
            ..HarnessSpec::default()
        });

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(16);

        let manager = Arc::clone(&h.manager);
        let context = ctx("What is 2+2?");
        let cancel_clone = cancel.clone();
        let task =
            tokio::spawn(async move { manager.execute(&context, &cancel_clone, Some(&tx)).await });

        // Take three chunks, then cancel.
        let mut received = 0usize;
        while received < 3 {
            if let Some(Ok(StreamEvent::Text(_))) = rx.recv().await {
                received = received.saturating_add(1);
            }
        }
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, RouterError::Cancelled));
        assert!(!h.manager.is_inference_active());

        let records = h.audit.records().unwrap();
        let last = records.last().unwrap();
        assert_eq!(last.entry.kind, "cancelled");
        let payload = serde_json::to_value(&last.payload).unwrap();
        assert_eq!(payload["value"]["chunks_delivered"], 3);
    }

    #[tokio::test]
    async fn test_accelerator_busy_downgrades_to_cloud() {
        let runtime = Arc::new(
            ScriptedRuntime::new(vec!["slow".into()]).with_delay(Duration::from_millis(300)),
        );
        let h = harness(HarnessSpec {
            runtime,
            creds: anthropic_creds(),
            ..HarnessSpec::default()
        });

        // First request holds the accelerator.
        let manager = Arc::clone(&h.manager);
        let first = tokio::spawn(async move {
            manager
                .execute(&ctx("What is 2+2?"), &CancellationToken::new(), None)
                .await
        });
        // Give the first request time to take the lock.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.manager.is_inference_active());

        // Second local-eligible request downgrades to cloud.
        let result = h
            .manager
            .execute(&ctx("What is 3+3?"), &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(result.location, ExecutionLocation::Cloud);

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.location, ExecutionLocation::Local);
    }

    #[tokio::test]
    async fn test_accelerator_busy_force_local_is_system_busy() {
        let runtime = Arc::new(
            ScriptedRuntime::new(vec!["slow".into()]).with_delay(Duration::from_millis(300)),
        );
        let h = harness(HarnessSpec {
            runtime,
            ..HarnessSpec::default()
        });

        let manager = Arc::clone(&h.manager);
        let first = tokio::spawn(async move {
            manager
                .execute(&ctx("What is 2+2?"), &CancellationToken::new(), None)
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = h
            .manager
            .execute(
                &ctx_with_hint("What is 3+3?", vesper_core::ExecutionHint::local()),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::SystemBusy));

        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_memory_pressure_denial_clears_on_normal() {
        let h = harness(HarnessSpec {
            creds: anthropic_creds(),
            ..HarnessSpec::default()
        });

        // Drive memory into critical pressure through the probe.
        h.sensors.set_memory(1024 * 1024 * 512, 32 * 1024 * 1024 * 1024);
        h.probe
            .push_update(vesper_probe::MonitorUpdate::Memory(
                vesper_probe::MemoryReading {
                    available: 1024 * 1024 * 512,
                    total: 32 * 1024 * 1024 * 1024,
                },
            ))
            .await;
        let _ = h.probe.settled_snapshot().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.manager.memory_pressure_denied());

        // Recovery clears the denial.
        h.sensors
            .set_memory(16 * 1024 * 1024 * 1024, 32 * 1024 * 1024 * 1024);
        h.probe
            .push_update(vesper_probe::MonitorUpdate::Memory(
                vesper_probe::MemoryReading {
                    available: 16 * 1024 * 1024 * 1024,
                    total: 32 * 1024 * 1024 * 1024,
                },
            ))
            .await;
        let _ = h.probe.settled_snapshot().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!h.manager.memory_pressure_denied());
    }

    #[tokio::test]
    async fn test_admission_revalidates_fresh_state() {
        // The probe now reports lockdown-grade conditions even though
        // the caller believed the system was healthy when routing.
        let h = harness(HarnessSpec {
            creds: anthropic_creds(),
            ..HarnessSpec::default()
        });
        h.policy.engage_lockdown();
        h.sensors.set_memory(1024 * 1024 * 1024, 32 * 1024 * 1024 * 1024);
        h.probe
            .push_update(vesper_probe::MonitorUpdate::Memory(
                vesper_probe::MemoryReading {
                    available: 1024 * 1024 * 1024,
                    total: 32 * 1024 * 1024 * 1024,
                },
            ))
            .await;
        let _ = h.probe.settled_snapshot().await;

        let err = h
            .manager
            .execute(&ctx("What is 2+2?"), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        let RouterError::PolicyDenied { reason } = err else {
            panic!("expected PolicyDenied");
        };
        assert!(reason.contains("lockdown"));
    }

    #[tokio::test]
    async fn test_rate_limiter_bounds_channel() {
        let config = RouterConfig {
            rate_limit: vesper_config::RateLimitSettings {
                max_tokens: 1,
                refill_amount: 1,
                refill_interval_seconds: 3600,
            },
            ..RouterConfig::default()
        };
        let h = harness(HarnessSpec {
            creds: anthropic_creds(),
            config,
            ..HarnessSpec::default()
        });

        let hint = vesper_core::ExecutionHint::cloud();
        h.manager
            .execute(
                &ctx_with_hint("hello", hint.clone()),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap();

        let err = h
            .manager
            .execute(
                &ctx_with_hint("hello again", hint),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_execution_finished_event_published() {
        let h = harness(HarnessSpec::default());
        let mut receiver = h.bus.subscribe();

        h.manager
            .execute(&ctx("What is 2+2?"), &CancellationToken::new(), None)
            .await
            .unwrap();

        let mut saw_finished = false;
        while let Some(event) = receiver.try_recv() {
            if let RouterEvent::ExecutionFinished { outcome, .. } = event.as_ref() {
                assert_eq!(outcome, "completed");
                saw_finished = true;
            }
        }
        assert!(saw_finished);
    }
}
