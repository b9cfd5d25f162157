//! The router facade: the single entry point for every prompt.
//!
//! `execute` runs sanitize -> assess -> decide -> execute -> audit.
//! Submissions within one channel are totally ordered: each channel
//! owns a FIFO queue drained by one worker task, so results appear in
//! submission order. Ordering across channels is unspecified.

use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vesper_audit::{AuditLog, AuditPayload, AuditStorage, FileAuditStorage, MemoryAuditStorage};
use vesper_config::RouterConfig;
use vesper_core::{
    ChannelId, CloudProviderKind, ExecutionResult, IntentId, Prompt, RouterError, RouterResult,
};
use vesper_creds::CredentialStore;
use vesper_crypto::{SignatureVerdict, SigningKeystore};
use vesper_events::{EventBus, EventMetadata, RouterEvent};
use vesper_llm::{CloudTransport, LocalRuntime, StreamEvent};
use vesper_probe::{MonitorConfig, SystemProbe, SystemSensors};
use vesper_router::{ModelCatalog, PolicyManager, RouteRequest, RoutingEngine, assess, classify_task};
use vesper_sanitize::{InputSanitizer, PatternCatalog, PrivacyEgressFilter};

use crate::manager::{ExecutionContext, HybridExecutionManager, ManagerPorts};

/// Everything the router needs from outside the core.
pub struct RouterPorts {
    /// On-device model runtime.
    pub runtime: Arc<dyn LocalRuntime>,
    /// HTTPS transport.
    pub transport: Arc<dyn CloudTransport>,
    /// Credential store keyed by provider.
    pub credentials: Arc<dyn CredentialStore>,
    /// Keystore holding the result-signing key.
    pub keystore: Arc<dyn SigningKeystore>,
    /// Hardware sensors.
    pub sensors: Arc<dyn SystemSensors>,
    /// Monitor poll intervals.
    pub monitors: MonitorConfig,
}

type Job = BoxFuture<'static, ()>;

/// The hybrid inference router.
///
/// Constructed once at startup as the process-wide root; every
/// subsystem hangs off it and receives its collaborators at
/// construction, never through back-pointers. The handle is cheap to
/// clone; all clones share one router.
#[derive(Clone)]
pub struct HybridRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    sanitizer: InputSanitizer,
    engine: Arc<RoutingEngine>,
    policy: Arc<PolicyManager>,
    probe: Arc<SystemProbe>,
    manager: Arc<HybridExecutionManager>,
    credentials: Arc<dyn CredentialStore>,
    audit: Arc<AuditLog>,
    bus: EventBus,
    queues: dashmap::DashMap<ChannelId, mpsc::UnboundedSender<Job>>,
}

impl HybridRouter {
    /// Build and start the router: open (and verify) the audit log,
    /// compile the pattern catalog, start the probe, and wire the
    /// execution manager.
    ///
    /// # Errors
    ///
    /// Fails when the audit chain does not verify or its storage
    /// cannot be opened.
    pub fn start(ports: RouterPorts, config: RouterConfig) -> RouterResult<Self> {
        let storage: Box<dyn AuditStorage> = match &config.audit_dir {
            Some(dir) => Box::new(
                FileAuditStorage::open(dir)
                    .map_err(|e| RouterError::Internal(e.to_string()))?,
            ),
            None => Box::new(MemoryAuditStorage::new()),
        };
        let audit = Arc::new(
            AuditLog::open(storage).map_err(|e| RouterError::Internal(e.to_string()))?,
        );

        let catalog = Arc::new(PatternCatalog::compile());
        for dropped in catalog.dropped() {
            let _ = audit.append(&AuditPayload::PatternDropped {
                name: dropped.name.clone(),
                error: dropped.error.clone(),
            });
        }

        let bus = EventBus::new();
        let probe = Arc::new(SystemProbe::start(
            ports.sensors,
            bus.clone(),
            ports.monitors,
        ));
        let policy = Arc::new(PolicyManager::default());
        let engine = Arc::new(RoutingEngine::new(ModelCatalog::builtin(), config.clone()));

        let manager = Arc::new(HybridExecutionManager::new(
            ManagerPorts {
                runtime: ports.runtime,
                transport: ports.transport,
                credentials: Arc::clone(&ports.credentials),
                keystore: ports.keystore,
            },
            PrivacyEgressFilter::new(Arc::clone(&catalog)),
            Arc::clone(&engine),
            Arc::clone(&policy),
            Arc::clone(&probe),
            Arc::clone(&audit),
            bus.clone(),
            config,
        ));
        manager.spawn_pressure_watcher();

        let _ = audit.append(&AuditPayload::RouterStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
        });
        info!("hybrid router started");

        Ok(Self {
            inner: Arc::new(RouterInner {
                sanitizer: InputSanitizer::new(catalog),
                engine,
                policy,
                probe,
                manager,
                credentials: ports.credentials,
                audit,
                bus,
                queues: dashmap::DashMap::new(),
            }),
        })
    }

    /// The audit log.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.inner.audit
    }

    /// The event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// The system probe.
    #[must_use]
    pub fn probe(&self) -> &Arc<SystemProbe> {
        &self.inner.probe
    }

    /// Whether lockdown is engaged.
    #[must_use]
    pub fn is_lockdown(&self) -> bool {
        self.inner.policy.is_lockdown()
    }

    /// Engage lockdown: no outbound network request until released.
    pub fn engage_lockdown(&self) {
        self.inner.policy.engage_lockdown();
        let _ = self.inner.audit.append(&AuditPayload::LockdownEngaged);
    }

    /// Release lockdown, restoring the pre-lockdown policy.
    pub fn release_lockdown(&self) {
        self.inner.policy.release_lockdown();
        let _ = self.inner.audit.append(&AuditPayload::LockdownReleased);
    }

    /// Store a credential and audit the change.
    ///
    /// # Errors
    ///
    /// Surfaces credential-store failures as `Internal`.
    pub fn store_credential(
        &self,
        provider: CloudProviderKind,
        secret: vesper_creds::Secret,
    ) -> RouterResult<()> {
        self.inner
            .credentials
            .put(provider, secret)
            .map_err(|e| RouterError::Internal(e.to_string()))?;
        let _ = self
            .inner
            .audit
            .append(&AuditPayload::CredentialStored { provider });
        Ok(())
    }

    /// Delete a credential and audit the change.
    ///
    /// # Errors
    ///
    /// Surfaces credential-store failures as `Internal`.
    pub fn delete_credential(&self, provider: CloudProviderKind) -> RouterResult<()> {
        self.inner
            .credentials
            .delete(provider)
            .map_err(|e| RouterError::Internal(e.to_string()))?;
        let _ = self
            .inner
            .audit
            .append(&AuditPayload::CredentialDeleted { provider });
        Ok(())
    }

    /// Verify a result signature.
    #[must_use]
    pub fn verify_result(&self, result: &ExecutionResult) -> SignatureVerdict {
        self.inner.manager.verify_result(result)
    }

    /// Execute a prompt to completion.
    ///
    /// # Errors
    ///
    /// Any kind from the router taxonomy.
    pub async fn execute(
        &self,
        channel: &ChannelId,
        prompt: Prompt,
    ) -> RouterResult<ExecutionResult> {
        self.execute_with_cancel(channel, prompt, CancellationToken::new())
            .await
    }

    /// Execute a prompt with a caller-held cancellation token.
    ///
    /// # Errors
    ///
    /// Any kind from the router taxonomy; `Cancelled` when the token
    /// fires before completion.
    pub async fn execute_with_cancel(
        &self,
        channel: &ChannelId,
        prompt: Prompt,
        cancel: CancellationToken,
    ) -> RouterResult<ExecutionResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let this = Arc::clone(&self.inner);
        let job_channel = channel.clone();
        self.inner.submit(
            channel,
            Box::pin(async move {
                let result = this.pipeline(&job_channel, prompt, &cancel, None).await;
                let _ = reply_tx.send(result);
            }),
        );
        reply_rx
            .await
            .map_err(|_| RouterError::Internal("pipeline worker dropped".to_string()))?
    }

    /// Execute a prompt, streaming events as they arrive.
    ///
    /// Returns the cancellation token for the request and the event
    /// stream. On failure the last stream item is the error; partial
    /// output already delivered is not retracted.
    #[must_use]
    pub fn execute_streaming(
        &self,
        channel: &ChannelId,
        prompt: Prompt,
    ) -> (
        CancellationToken,
        ReceiverStream<RouterResult<StreamEvent>>,
    ) {
        let cancel = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::channel(64);

        let this = Arc::clone(&self.inner);
        let job_channel = channel.clone();
        let job_cancel = cancel.clone();
        self.inner.submit(
            channel,
            Box::pin(async move {
                let sink = event_tx.clone();
                if let Err(err) = this
                    .pipeline(&job_channel, prompt, &job_cancel, Some(&sink))
                    .await
                {
                    let _ = event_tx.send(Err(err)).await;
                }
            }),
        );

        (cancel, ReceiverStream::new(event_rx))
    }
}

impl RouterInner {
    /// Enqueue a job on the channel's FIFO worker.
    fn submit(&self, channel: &ChannelId, job: Job) {
        let sender = self
            .queues
            .entry(channel.clone())
            .or_insert_with(|| {
                let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
                tokio::spawn(async move {
                    while let Some(job) = rx.recv().await {
                        job.await;
                    }
                });
                tx
            })
            .clone();
        // A closed worker means runtime shutdown; the reply channel
        // surfaces the drop to the caller.
        let _ = sender.send(job);
    }

    /// The full request pipeline, run on a channel worker.
    async fn pipeline(
        &self,
        channel: &ChannelId,
        prompt: Prompt,
        cancel: &CancellationToken,
        sink: Option<&mpsc::Sender<RouterResult<StreamEvent>>>,
    ) -> RouterResult<ExecutionResult> {
        let intent_id = IntentId::new();

        if prompt.is_blank() {
            let err = RouterError::InvalidInput("empty prompt".to_string());
            let _ = self.audit.append(&AuditPayload::ExecutionFailed {
                intent_id: intent_id.clone(),
                error_kind: err.kind().to_string(),
                detail: err.to_string(),
            });
            return Err(err);
        }

        // Gate 1: sanitize. Never fails; violations are recorded.
        let sanitized = self.sanitizer.sanitize(prompt.text());
        let input_pii_redacted = sanitized
            .violations
            .iter()
            .any(|v| v.family == vesper_sanitize::PatternFamily::Pii);
        if sanitized.was_sanitized() {
            let max_severity = sanitized
                .max_severity()
                .map_or_else(|| "none".to_string(), |s| format!("{s:?}").to_lowercase());
            let _ = self.audit.append(&AuditPayload::InputSanitized {
                intent_id: intent_id.clone(),
                violation_count: sanitized.violations.len(),
                max_severity,
            });
        }
        let clean = Prompt::with_hint(sanitized.sanitized, prompt.hint().clone());

        // Gate 2: assess.
        let complexity = assess(clean.text());
        let task = classify_task(clean.text());

        // Gate 3: decide, for the audit trail and early rejection. The
        // manager revalidates with fresh state at admission.
        let (state, reachability) = self.probe.settled_snapshot().await;
        let policy = self.policy.snapshot();
        let request = RouteRequest {
            prompt: &clean,
            complexity,
            task,
            state: &state,
            policy: &policy,
            reachability,
            providers_with_credentials: CloudProviderKind::ALL
                .into_iter()
                .filter(|p| self.credentials.has(*p).unwrap_or(false))
                .collect(),
        };
        let (decision, reason) = match self.engine.decide(&request) {
            Ok(decided) => decided,
            Err(err) => {
                let _ = self.audit.append(&AuditPayload::ExecutionFailed {
                    intent_id: intent_id.clone(),
                    error_kind: err.kind().to_string(),
                    detail: err.to_string(),
                });
                return Err(err);
            },
        };
        debug!(intent = %intent_id, decision = %decision, reason = %reason, "routed");
        let _ = self.audit.append(&AuditPayload::DecisionMade {
            intent_id: intent_id.clone(),
            decision: decision.clone(),
            complexity,
            reason: reason.clone(),
        });
        self.bus.publish(RouterEvent::DecisionMade {
            metadata: EventMetadata::new("routing-engine"),
            intent_id: intent_id.clone(),
            decision,
            reason,
        });

        // Gate 4: execute under the manager's admission rules.
        let ctx = ExecutionContext {
            intent_id,
            channel: channel.clone(),
            prompt: clean,
            complexity,
            task,
            input_pii_redacted,
        };
        self.manager.execute(&ctx, cancel, sink).await
    }
}
