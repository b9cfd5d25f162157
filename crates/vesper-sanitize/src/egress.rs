//! The privacy egress filter.
//!
//! A superset gate applied only to payloads about to leave the device.
//! Unlike the input sanitizer it replaces from the HIGHEST offset
//! first, so index ranges computed during detection remain valid while
//! the text shrinks and grows under substitution. A detection is
//! skipped when it starts inside a range that has already been
//! processed (a higher-offset replacement whose start it crosses).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use crate::patterns::{PatternCatalog, PiiType, Severity};

/// Configuration for the egress filter, supplied by policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressConfig {
    /// PII categories to redact. Empty means redact nothing.
    pub types_to_redact: BTreeSet<PiiType>,
    /// Only redact detections of High or Critical severity.
    pub high_risk_only: bool,
    /// Annotate redaction tokens with the PII category
    /// (`[REDACTED_PII:email]`) so downstream reasoning keeps the shape
    /// of the sentence. When false every token is the uniform
    /// `[REDACTED_PII]`.
    pub preserve_context: bool,
}

impl EgressConfig {
    /// Redact every known category with uniform tokens.
    #[must_use]
    pub fn redact_all() -> Self {
        Self {
            types_to_redact: PiiType::ALL.into_iter().collect(),
            high_risk_only: false,
            preserve_context: false,
        }
    }

    /// Redact only high-risk categories.
    #[must_use]
    pub fn high_risk() -> Self {
        Self {
            high_risk_only: true,
            ..Self::redact_all()
        }
    }
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self::redact_all()
    }
}

/// One redaction the filter performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressRedaction {
    /// Category that was redacted.
    pub pii_type: PiiType,
    /// Span in the ORIGINAL text.
    pub span: Range<usize>,
    /// Severity of the detection.
    pub severity: Severity,
}

/// Outcome of filtering one outbound payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressReport {
    /// The payload with sensitive spans replaced.
    pub filtered: String,
    /// Redactions performed, highest offset first (processing order).
    pub redactions: Vec<EgressRedaction>,
}

impl EgressReport {
    /// Whether the filter found and redacted sensitive content.
    #[must_use]
    pub fn redaction_applied(&self) -> bool {
        !self.redactions.is_empty()
    }
}

/// Privacy gate for cloud-bound payloads.
#[derive(Debug, Clone)]
pub struct PrivacyEgressFilter {
    catalog: Arc<PatternCatalog>,
}

impl PrivacyEgressFilter {
    /// Create a filter over a shared catalog.
    #[must_use]
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    /// Filter one outbound payload under the given configuration.
    ///
    /// Never fails; a payload with no detections passes through
    /// unchanged.
    #[must_use]
    pub fn filter(&self, text: &str, config: &EgressConfig) -> EgressReport {
        // Detect on the original text.
        let mut detections: Vec<EgressRedaction> = Vec::new();
        for pattern in self.catalog.pii_patterns() {
            let Some(pii_type) = pattern.pii_type else {
                continue;
            };
            if !config.types_to_redact.contains(&pii_type) {
                continue;
            }
            if config.high_risk_only && pattern.severity < Severity::High {
                continue;
            }
            for m in pattern.regex.find_iter(text) {
                detections.push(EgressRedaction {
                    pii_type,
                    span: m.range(),
                    severity: pattern.severity,
                });
            }
        }

        // Process highest offset first so the spans of the remaining
        // detections stay valid while we substitute.
        detections.sort_by(|a, b| {
            b.span
                .start
                .cmp(&a.span.start)
                .then(b.span.end.cmp(&a.span.end))
        });

        let mut filtered = text.to_string();
        let mut applied: Vec<EgressRedaction> = Vec::new();
        // Start of the lowest range replaced so far. A detection whose
        // end crosses this floor starts inside processed territory and
        // is skipped.
        let mut processed_floor = usize::MAX;

        for detection in detections {
            if detection.span.end > processed_floor {
                continue;
            }
            let token = if config.preserve_context {
                format!("[REDACTED_PII:{}]", detection.pii_type.label())
            } else {
                "[REDACTED_PII]".to_string()
            };
            filtered.replace_range(detection.span.clone(), &token);
            processed_floor = detection.span.start;
            applied.push(detection);
        }

        EgressReport {
            filtered,
            redactions: applied,
        }
    }
}

impl Default for PrivacyEgressFilter {
    fn default() -> Self {
        Self::new(Arc::new(PatternCatalog::compile()))
    }
}
