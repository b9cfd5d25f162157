//! Prelude module - commonly used types for convenient import.

pub use crate::{
    DroppedPattern, EgressConfig, EgressReport, InputSanitizer, PatternCatalog, PatternFamily,
    PiiType, PrivacyEgressFilter, SanitizationResult, Severity, Violation,
};
