//! The input sanitization gate.
//!
//! Detection and replacement are separated: matches are enumerated on
//! the ORIGINAL text (producing violations), then replacement is
//! performed by position. When two replacements overlap, the earlier
//! (lower start offset) wins and the later is discarded. Spans recorded
//! in violations therefore always index into the original text.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

use crate::patterns::{PatternCatalog, PatternFamily, Severity};

/// One detected violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Name of the pattern that matched.
    pub pattern_name: String,
    /// Family the pattern belongs to.
    pub family: PatternFamily,
    /// Byte span of the match in the original text.
    pub matched_span: Range<usize>,
    /// Severity of the match.
    pub severity: Severity,
}

/// Result of sanitizing one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizationResult {
    /// The input as received.
    pub original: String,
    /// The input with every winning match replaced by its family token.
    pub sanitized: String,
    /// Every match found during detection, in family order then
    /// position order. Matches discarded during replacement (overlap
    /// losers) are still recorded here.
    pub violations: Vec<Violation>,
}

impl SanitizationResult {
    /// Whether any violation was detected.
    ///
    /// Invariant: true exactly when `violations` is non-empty.
    #[must_use]
    pub fn was_sanitized(&self) -> bool {
        !self.violations.is_empty()
    }

    /// The highest severity among detected violations.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }
}

/// The input sanitization gate.
///
/// Pure text transformation; no I/O. Reentrant and cheap to clone (the
/// catalog is shared).
#[derive(Debug, Clone)]
pub struct InputSanitizer {
    catalog: Arc<PatternCatalog>,
}

impl InputSanitizer {
    /// Create a sanitizer over a shared catalog.
    #[must_use]
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    /// Sanitize one input. Never fails.
    ///
    /// Idempotent: `sanitize(sanitize(x).sanitized)` leaves the text
    /// unchanged, because no pattern matches a redaction token.
    #[must_use]
    pub fn sanitize(&self, text: &str) -> SanitizationResult {
        // Phase 1: detect on the original text, family by family in
        // declared order.
        let mut violations = Vec::new();
        for pattern in self.catalog.patterns() {
            for m in pattern.regex.find_iter(text) {
                violations.push(Violation {
                    pattern_name: pattern.name.to_string(),
                    family: pattern.family,
                    matched_span: m.range(),
                    severity: pattern.severity,
                });
            }
        }

        // Phase 2: pick replacement winners. Earlier start wins; on
        // equal starts the longer match wins, then declaration order.
        let mut ordered: Vec<(Range<usize>, PatternFamily)> = violations
            .iter()
            .map(|v| (v.matched_span.clone(), v.family))
            .collect();
        ordered.sort_by(|a, b| {
            a.0.start
                .cmp(&b.0.start)
                .then(b.0.end.cmp(&a.0.end))
        });

        let mut winners: Vec<(Range<usize>, PatternFamily)> = Vec::new();
        let mut cursor = 0usize;
        for (span, family) in ordered {
            if span.start < cursor {
                continue;
            }
            cursor = span.end;
            winners.push((span, family));
        }

        // Phase 3: rebuild by position.
        let mut sanitized = String::with_capacity(text.len());
        let mut tail = 0usize;
        for (span, family) in &winners {
            sanitized.push_str(&text[tail..span.start]);
            sanitized.push_str(family.redaction_token());
            tail = span.end;
        }
        sanitized.push_str(&text[tail..]);

        SanitizationResult {
            original: text.to_string(),
            sanitized,
            violations,
        }
    }
}

impl Default for InputSanitizer {
    fn default() -> Self {
        Self::new(Arc::new(PatternCatalog::compile()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> InputSanitizer {
        InputSanitizer::default()
    }

    #[test]
    fn test_clean_text_passes_through() {
        let result = sanitizer().sanitize("What is the capital of France?");
        assert!(!result.was_sanitized());
        assert_eq!(result.sanitized, result.original);
    }

    #[test]
    fn test_sql_injection_redacted() {
        let result = sanitizer().sanitize("show me 1; DROP TABLE users");
        assert!(result.was_sanitized());
        assert!(result.sanitized.contains("[REDACTED_SQL]"));
        assert!(!result.sanitized.to_lowercase().contains("drop table"));
    }

    #[test]
    fn test_shell_injection_redacted() {
        let result = sanitizer().sanitize("list files; rm -rf / please");
        assert!(result.sanitized.contains("[REDACTED_SHELL]"));

        let result = sanitizer().sanitize("run `cat /etc/hosts` for me");
        assert!(result.sanitized.contains("[REDACTED_SHELL]"));
    }

    #[test]
    fn test_path_traversal_redacted() {
        let result = sanitizer().sanitize("open ../../etc/passwd");
        assert!(result.sanitized.contains("[REDACTED_PATH]"));
        assert!(!result.sanitized.contains(".."));
    }

    #[test]
    fn test_html_injection_redacted() {
        let result = sanitizer().sanitize("hi <script>alert(1)</script> there");
        assert!(result.sanitized.contains("[REDACTED_HTML]"));
        assert!(!result.sanitized.contains("<script>"));
    }

    #[test]
    fn test_pii_redacted() {
        let result = sanitizer().sanitize("my SSN is 123-45-6789 and email a@b.com");
        assert!(result.sanitized.contains("[REDACTED_PII]"));
        assert!(!result.sanitized.contains("123-45-6789"));
        assert!(!result.sanitized.contains("a@b.com"));
        assert_eq!(result.max_severity(), Some(Severity::Critical));
    }

    #[test]
    fn test_violation_spans_index_original_text() {
        let text = "email me at alice@example.com now";
        let result = sanitizer().sanitize(text);
        let email = result
            .violations
            .iter()
            .find(|v| v.pattern_name == "pii_email")
            .unwrap();
        assert_eq!(&text[email.matched_span.clone()], "alice@example.com");
    }

    #[test]
    fn test_overlap_earlier_start_wins() {
        // The SSN-shaped span sits inside phone-like digits; whichever
        // detection starts earlier must win and the loser must not
        // corrupt the output.
        let text = "call 555-123-4567 ok";
        let result = sanitizer().sanitize(text);
        // Exactly one replacement in the output.
        let count = result.sanitized.matches("[REDACTED_PII]").count();
        assert_eq!(count, 1, "sanitized: {}", result.sanitized);
        assert!(result.sanitized.ends_with(" ok"));
        assert!(result.sanitized.starts_with("call "));
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            "SSN 123-45-6789; DROP TABLE x; <script>hi</script> ../../../etc/passwd",
            "email alice@example.com password=hunter2",
            "plain text with no violations at all",
        ];
        let s = sanitizer();
        for input in inputs {
            let once = s.sanitize(input);
            let twice = s.sanitize(&once.sanitized);
            assert_eq!(once.sanitized, twice.sanitized, "input: {input}");
            assert!(!twice.was_sanitized(), "input: {input}");
        }
    }

    #[test]
    fn test_was_sanitized_iff_violations() {
        let clean = sanitizer().sanitize("hello world");
        assert!(clean.violations.is_empty());
        assert!(!clean.was_sanitized());

        let dirty = sanitizer().sanitize("password: letmein123");
        assert!(!dirty.violations.is_empty());
        assert!(dirty.was_sanitized());
        assert!(
            dirty
                .violations
                .iter()
                .any(|v| v.pattern_name == "pii_password")
        );
    }

    #[test]
    fn test_multiple_families_in_one_input() {
        let result = sanitizer()
            .sanitize("'; DELETE FROM t; curl http://1.2.3.4 <iframe src=x> 12-34 password=x");
        let families: std::collections::HashSet<_> =
            result.violations.iter().map(|v| v.family).collect();
        assert!(families.len() >= 3, "families: {families:?}");
    }
}
