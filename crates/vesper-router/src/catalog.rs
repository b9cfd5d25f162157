//! The model catalog: what can run where, and how well.

use serde::{Deserialize, Serialize};
use vesper_core::{CloudProviderKind, ModelClass, SystemState, TaskKind, ThermalState};
use vesper_config::RouterConfig;

const GIB: u64 = 1024 * 1024 * 1024;

/// An on-device model the runtime can load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalModelSpec {
    /// Model class the decision engine works in.
    pub class: ModelClass,
    /// Display name.
    pub name: String,
    /// RAM required to load and run.
    pub min_ram_bytes: u64,
    /// VRAM required when a discrete pool exists.
    pub vram_bytes: u64,
    /// Maximum prompt size in characters.
    pub max_prompt_chars: usize,
    /// Per-task quality scores (1..=10).
    quality_general: u8,
    quality_code: u8,
    quality_summarize: u8,
    quality_creative: u8,
}

impl LocalModelSpec {
    /// Quality score for a task kind.
    #[must_use]
    pub fn quality_for(&self, task: TaskKind) -> u8 {
        match task {
            TaskKind::General => self.quality_general,
            TaskKind::Code => self.quality_code,
            TaskKind::Summarize => self.quality_summarize,
            TaskKind::Creative => self.quality_creative,
        }
    }

    /// Whether current hardware state admits loading this model.
    ///
    /// RAM must clear both the model's own floor and the configured
    /// admission floor; thermals must not exceed the configured
    /// ceiling; a discrete VRAM pool, when present, must fit the model.
    #[must_use]
    pub fn hardware_admits(&self, state: &SystemState, config: &RouterConfig) -> bool {
        let ram_floor = self.min_ram_bytes.max(config.minimum_ram_for_local());
        if !state.has_sufficient_ram(ram_floor) {
            return false;
        }
        if state.thermal_state > config.max_thermal_for_local {
            return false;
        }
        if let Some(vram) = state.gpu_vram_available
            && vram < self.vram_bytes
        {
            return false;
        }
        true
    }
}

/// A cloud provider the router may dispatch to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudProviderSpec {
    /// Provider identity.
    pub kind: CloudProviderKind,
    /// Model used when the caller does not name one.
    pub default_model: String,
    /// Whether the offering is categorized privacy-preserving.
    pub sovereign: bool,
    /// Latency tier; lower is faster.
    pub latency_tier: u8,
    /// Maximum prompt size in characters.
    pub max_prompt_chars: usize,
}

/// The catalog of local models and cloud providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    locals: Vec<LocalModelSpec>,
    clouds: Vec<CloudProviderSpec>,
}

impl ModelCatalog {
    /// The built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            locals: vec![
                LocalModelSpec {
                    class: ModelClass::Compact,
                    name: "phi-4".to_string(),
                    min_ram_bytes: 4 * GIB,
                    vram_bytes: 3 * GIB,
                    max_prompt_chars: 16_000,
                    quality_general: 7,
                    quality_code: 6,
                    quality_summarize: 7,
                    quality_creative: 5,
                },
                LocalModelSpec {
                    class: ModelClass::Standard,
                    name: "mistral-small".to_string(),
                    min_ram_bytes: 10 * GIB,
                    vram_bytes: 8 * GIB,
                    max_prompt_chars: 48_000,
                    quality_general: 8,
                    quality_code: 7,
                    quality_summarize: 8,
                    quality_creative: 7,
                },
                LocalModelSpec {
                    class: ModelClass::Large,
                    name: "llama-70b".to_string(),
                    min_ram_bytes: 40 * GIB,
                    vram_bytes: 24 * GIB,
                    max_prompt_chars: 96_000,
                    quality_general: 9,
                    quality_code: 9,
                    quality_summarize: 9,
                    quality_creative: 8,
                },
            ],
            clouds: vec![
                CloudProviderSpec {
                    kind: CloudProviderKind::Anthropic,
                    default_model: "claude-sonnet-4".to_string(),
                    sovereign: true,
                    latency_tier: 1,
                    max_prompt_chars: 600_000,
                },
                CloudProviderSpec {
                    kind: CloudProviderKind::OpenAi,
                    default_model: "gpt-4o".to_string(),
                    sovereign: false,
                    latency_tier: 1,
                    max_prompt_chars: 400_000,
                },
                CloudProviderSpec {
                    kind: CloudProviderKind::Google,
                    default_model: "gemini-2.0-pro".to_string(),
                    sovereign: false,
                    latency_tier: 2,
                    max_prompt_chars: 3_000_000,
                },
            ],
        }
    }

    /// Local models, smallest class first.
    #[must_use]
    pub fn locals(&self) -> &[LocalModelSpec] {
        &self.locals
    }

    /// Cloud providers.
    #[must_use]
    pub fn clouds(&self) -> &[CloudProviderSpec] {
        &self.clouds
    }

    /// Look up a local model by class.
    #[must_use]
    pub fn local(&self, class: ModelClass) -> Option<&LocalModelSpec> {
        self.locals.iter().find(|m| m.class == class)
    }

    /// Look up a cloud provider by kind.
    #[must_use]
    pub fn cloud(&self, kind: CloudProviderKind) -> Option<&CloudProviderSpec> {
        self.clouds.iter().find(|c| c.kind == kind)
    }

    /// Whether any local model is admitted by current hardware state.
    #[must_use]
    pub fn any_local_feasible(&self, state: &SystemState, config: &RouterConfig) -> bool {
        self.locals.iter().any(|m| m.hardware_admits(state, config))
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
