//! The routing decision engine.
//!
//! Given `(prompt, complexity, system state, security policy, hint)`,
//! produce a [`RouterDecision`] plus a human-readable reason. Rules are
//! evaluated in order; the first rule that matches wins:
//!
//! 1. Hard lockdown
//! 2. Forced routing from the hint, subject to policy
//! 3. Safe-mode offload
//! 4. Offline
//! 5. Low-RAM hardware
//! 6. Complexity vs. quality
//!
//! Tie-breaks: preferred local model then lowest VRAM among local
//! candidates; sovereign first, then latency tier, then configured
//! preference among cloud candidates.

use std::collections::BTreeSet;
use tracing::debug;
use vesper_config::RouterConfig;
use vesper_core::{
    CloudProviderKind, ComplexityLevel, ModelClass, NetworkReachability, Prompt, RouterDecision,
    RouterError, RouterResult, SecurityPolicy, SystemState, TaskKind,
};

use crate::catalog::{CloudProviderSpec, LocalModelSpec, ModelCatalog};

const GIB: u64 = 1024 * 1024 * 1024;

/// RAM total below which the hardware counts as low-memory and cloud
/// becomes the default for non-trivial prompts.
const LOW_RAM_TOTAL: u64 = 16 * GIB;

/// Everything the engine needs to decide one request.
#[derive(Debug, Clone)]
pub struct RouteRequest<'a> {
    /// The (sanitized) prompt.
    pub prompt: &'a Prompt,
    /// Assessed complexity.
    pub complexity: ComplexityLevel,
    /// Classified task kind.
    pub task: TaskKind,
    /// Atomic hardware snapshot.
    pub state: &'a SystemState,
    /// Policy snapshot.
    pub policy: &'a SecurityPolicy,
    /// Network reachability at decision time.
    pub reachability: NetworkReachability,
    /// Providers for which a credential is stored.
    pub providers_with_credentials: BTreeSet<CloudProviderKind>,
}

/// The routing decision engine. Synchronous; no suspension.
#[derive(Debug)]
pub struct RoutingEngine {
    catalog: ModelCatalog,
    config: RouterConfig,
}

impl RoutingEngine {
    /// Create an engine over a catalog and configuration snapshot.
    #[must_use]
    pub fn new(catalog: ModelCatalog, config: RouterConfig) -> Self {
        Self { catalog, config }
    }

    /// The catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Decide where the request runs.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank or oversized prompt; `PolicyDenied`
    /// when policy forecloses every viable route; `Offline` when the
    /// network is unreachable and local execution is infeasible.
    pub fn decide(&self, request: &RouteRequest<'_>) -> RouterResult<(RouterDecision, String)> {
        if request.prompt.is_blank() {
            return Err(RouterError::InvalidInput("empty prompt".to_string()));
        }

        let decision = self.decide_inner(request)?;
        self.check_prompt_ceiling(request.prompt, &decision.0)?;
        debug!(decision = %decision.0, reason = %decision.1, "route decided");
        Ok(decision)
    }

    fn decide_inner(&self, request: &RouteRequest<'_>) -> RouterResult<(RouterDecision, String)> {
        // Rule 1: hard lockdown. Nothing leaves the device.
        if request.policy.is_lockdown {
            return match self.pick_local(request) {
                Some(model) => Ok((
                    RouterDecision::Local { model: model.class },
                    format!("lockdown active; staying on device with {}", model.name),
                )),
                None => Err(RouterError::PolicyDenied {
                    reason: "lockdown forbids cloud and no local model is feasible".to_string(),
                }),
            };
        }

        // Rule 2: forced routing, subject to policy.
        if request.hint().force_local
            && let Some(model) = self.pick_local(request)
        {
            return Ok((
                RouterDecision::Local { model: model.class },
                format!("caller forced local; {} selected", model.name),
            ));
        }
        if request.hint().force_cloud
            && let Some(provider) = self.pick_cloud(request, false)
        {
            return Ok((
                cloud_decision(provider),
                format!("caller forced cloud; {} selected", provider.kind),
            ));
        }

        // Rule 3: safe-mode offload.
        if self.wants_safe_mode(request) {
            if request.reachability.is_reachable()
                && let Some(provider) = self.pick_cloud(request, true)
            {
                return Ok((
                    cloud_decision(provider),
                    format!(
                        "safe mode; offloading to sovereign provider {}",
                        provider.kind
                    ),
                ));
            }
            return match self.pick_local(request) {
                Some(model) => Ok((
                    RouterDecision::Local { model: model.class },
                    format!("safe mode with no sovereign cloud; {} locally", model.name),
                )),
                None => Err(RouterError::PolicyDenied {
                    reason: "safe mode requires a sovereign provider or local capacity"
                        .to_string(),
                }),
            };
        }

        // Rule 4: offline.
        if !request.reachability.is_reachable() {
            return match self.pick_local(request) {
                Some(model) => Ok((
                    RouterDecision::Local { model: model.class },
                    format!("offline; {} locally", model.name),
                )),
                None => Err(RouterError::Offline),
            };
        }

        // Rule 5: low-RAM hardware defaults to cloud for Medium/High.
        if request.state.ram_total < LOW_RAM_TOTAL
            && request.complexity > ComplexityLevel::Low
            && let Some(provider) = self.pick_cloud(request, false)
        {
            return Ok((
                cloud_decision(provider),
                format!(
                    "{} complexity on low-memory hardware; {} selected",
                    request.complexity, provider.kind
                ),
            ));
        }

        // Rule 6: complexity vs. quality.
        if let Some(model) = self.pick_local(request) {
            return Ok((
                RouterDecision::Local { model: model.class },
                format!(
                    "{} quality {} meets the {} floor",
                    model.name,
                    model.quality_for(request.task),
                    request.complexity
                ),
            ));
        }
        if let Some(provider) = self.pick_cloud(request, false) {
            return Ok((
                cloud_decision(provider),
                format!(
                    "no local model meets the {} quality floor; {} selected",
                    request.complexity, provider.kind
                ),
            ));
        }

        Err(RouterError::PolicyDenied {
            reason: "no feasible local model and no eligible cloud provider".to_string(),
        })
    }

    /// Rule 6 body plus rule 7 tie-breaks: cheapest admitted local
    /// model meeting the quality floor; the configured preference wins
    /// outright when it qualifies, then lowest VRAM requirement.
    fn pick_local(&self, request: &RouteRequest<'_>) -> Option<&LocalModelSpec> {
        let floor = request
            .complexity
            .min_quality()
            .max(self.config.local_quality_threshold);

        let mut candidates: Vec<&LocalModelSpec> = self
            .catalog
            .locals()
            .iter()
            .filter(|m| m.quality_for(request.task) >= floor)
            .filter(|m| m.hardware_admits(request.state, &self.config))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        if let Some(preferred) = self.config.preferred_local_model
            && let Some(model) = candidates.iter().find(|m| m.class == preferred)
        {
            return Some(model);
        }

        candidates.sort_by_key(|m| m.vram_bytes);
        candidates.first().copied()
    }

    /// Cloud eligibility plus rule 8 tie-breaks: sovereign first, then
    /// lowest latency tier, then the configured preference.
    fn pick_cloud(
        &self,
        request: &RouteRequest<'_>,
        sovereign_only: bool,
    ) -> Option<&CloudProviderSpec> {
        if !request.policy.permits_cloud() {
            return None;
        }
        let require_sovereign = sovereign_only || request.policy.requires_sovereign_cloud();

        let mut candidates: Vec<&CloudProviderSpec> = self
            .catalog
            .clouds()
            .iter()
            .filter(|c| request.providers_with_credentials.contains(&c.kind))
            .filter(|c| c.sovereign || request.hint().allow_public_cloud)
            .filter(|c| c.sovereign || !require_sovereign)
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let preferred = self.config.preferred_cloud_provider;
        let prefer_sovereign = self.config.prefer_sovereign;
        candidates.sort_by_key(|c| {
            (
                if prefer_sovereign && c.sovereign { 0u8 } else { 1 },
                c.latency_tier,
                u8::from(c.kind != preferred),
                c.kind.id(),
            )
        });
        candidates.first().copied()
    }

    fn wants_safe_mode(&self, request: &RouteRequest<'_>) -> bool {
        if self.config.safe_mode_enabled
            || request.policy.execution_policy == vesper_core::ExecutionPolicy::SafeMode
        {
            return true;
        }
        let state = request.state;
        matches!(
            state.thermal_state,
            vesper_core::ThermalState::Serious | vesper_core::ThermalState::Critical
        ) || (state.cpu_overloaded()
            && state.thermal_state != vesper_core::ThermalState::Nominal)
            || (state.heavy_app_running()
                && state.thermal_state != vesper_core::ThermalState::Nominal)
            || (self.config.offload_on_low_battery && state.low_battery())
    }

    /// Reject prompts exceeding the decided route's ceiling before any
    /// byte would leave the process.
    fn check_prompt_ceiling(
        &self,
        prompt: &Prompt,
        decision: &RouterDecision,
    ) -> RouterResult<()> {
        let ceiling = match decision {
            RouterDecision::Local { model } => {
                self.catalog.local(*model).map(|m| m.max_prompt_chars)
            },
            RouterDecision::Cloud { provider, .. } => {
                self.catalog.cloud(*provider).map(|c| c.max_prompt_chars)
            },
        };
        if let Some(ceiling) = ceiling
            && prompt.char_count() > ceiling
        {
            return Err(RouterError::InvalidInput(format!(
                "prompt too large: {} chars exceeds the {ceiling} ceiling",
                prompt.char_count()
            )));
        }
        Ok(())
    }
}

fn cloud_decision(provider: &CloudProviderSpec) -> RouterDecision {
    RouterDecision::Cloud {
        provider: provider.kind,
        model: provider.default_model.clone(),
    }
}

impl RouteRequest<'_> {
    fn hint(&self) -> &vesper_core::ExecutionHint {
        self.prompt.hint()
    }
}
