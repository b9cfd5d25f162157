//! Vesper Sanitize - Input sanitization and privacy egress filtering.
//!
//! Two gates share one pattern catalog:
//!
//! - [`InputSanitizer`] transforms untrusted input into a form safe to
//!   pass to downstream reasoning and tools. Detection runs on the
//!   original text; replacement is applied by position afterwards, so
//!   match spans never drift.
//! - [`PrivacyEgressFilter`] runs on payloads about to leave the device.
//!   It replaces from the highest offset first so earlier spans remain
//!   valid during sequential substitution.
//!
//! Sanitization never fails. Patterns are compiled once at process
//! init; a pattern that fails to compile is dropped and reported for
//! audit, never fatal.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod egress;
mod patterns;
mod sanitizer;

pub use egress::{EgressConfig, EgressRedaction, EgressReport, PrivacyEgressFilter};
pub use patterns::{
    DroppedPattern, PatternCatalog, PatternFamily, PiiType, Severity,
};
pub use sanitizer::{InputSanitizer, SanitizationResult, Violation};
