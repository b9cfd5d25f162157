//! The compiled pattern catalogue.
//!
//! Patterns are partitioned into five families matched in declared
//! order: SQL injection, shell injection, path traversal, HTML/script
//! injection, and PII. Each pattern carries a severity and the family's
//! redaction token; PII patterns additionally carry a [`PiiType`] so
//! the egress filter can redact selectively.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Severity of a detected violation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; unlikely to cause harm.
    Low,
    /// Suspicious content worth tracking.
    Medium,
    /// Likely hostile or privacy-sensitive.
    High,
    /// Certain secret material or attack payload.
    Critical,
}

/// Pattern family, in matching order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFamily {
    /// SQL injection payloads.
    SqlInjection,
    /// Shell and command injection.
    ShellInjection,
    /// Filesystem path traversal.
    PathTraversal,
    /// HTML and script injection.
    HtmlInjection,
    /// Personally identifiable information and secrets.
    Pii,
}

impl PatternFamily {
    /// All families, in matching order.
    pub const ALL: [Self; 5] = [
        Self::SqlInjection,
        Self::ShellInjection,
        Self::PathTraversal,
        Self::HtmlInjection,
        Self::Pii,
    ];

    /// The family's redaction token.
    #[must_use]
    pub fn redaction_token(&self) -> &'static str {
        match self {
            Self::SqlInjection => "[REDACTED_SQL]",
            Self::ShellInjection => "[REDACTED_SHELL]",
            Self::PathTraversal => "[REDACTED_PATH]",
            Self::HtmlInjection => "[REDACTED_HTML]",
            Self::Pii => "[REDACTED_PII]",
        }
    }
}

impl fmt::Display for PatternFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SqlInjection => "sql_injection",
            Self::ShellInjection => "shell_injection",
            Self::PathTraversal => "path_traversal",
            Self::HtmlInjection => "html_injection",
            Self::Pii => "pii",
        };
        write!(f, "{name}")
    }
}

/// Category of personally identifiable information.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    /// US social security number.
    Ssn,
    /// Payment card number.
    CreditCard,
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// IPv4 address.
    Ipv4,
    /// MAC address.
    MacAddress,
    /// Bearer-style API key.
    ApiKey,
    /// Password assignment.
    Password,
    /// Session or JWT token.
    Token,
}

impl PiiType {
    /// All PII types.
    pub const ALL: [Self; 9] = [
        Self::Ssn,
        Self::CreditCard,
        Self::Email,
        Self::Phone,
        Self::Ipv4,
        Self::MacAddress,
        Self::ApiKey,
        Self::Password,
        Self::Token,
    ];

    /// Stable label used in context-preserving redaction tokens.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ssn => "ssn",
            Self::CreditCard => "credit_card",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ipv4 => "ipv4",
            Self::MacAddress => "mac",
            Self::ApiKey => "api_key",
            Self::Password => "password",
            Self::Token => "token",
        }
    }
}

/// A compiled pattern with its metadata.
#[derive(Debug)]
pub(crate) struct CompiledPattern {
    /// Stable pattern name for violation records.
    pub(crate) name: &'static str,
    /// Family this pattern belongs to.
    pub(crate) family: PatternFamily,
    /// Severity of a match.
    pub(crate) severity: Severity,
    /// PII category, for PII-family patterns only.
    pub(crate) pii_type: Option<PiiType>,
    /// The compiled expression.
    pub(crate) regex: Regex,
}

/// A pattern that failed to compile and was dropped from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedPattern {
    /// Pattern name.
    pub name: String,
    /// Compile error text.
    pub error: String,
}

/// Source definition for one pattern.
struct PatternSpec {
    name: &'static str,
    family: PatternFamily,
    severity: Severity,
    pii_type: Option<PiiType>,
    source: &'static str,
}

const fn spec(
    name: &'static str,
    family: PatternFamily,
    severity: Severity,
    source: &'static str,
) -> PatternSpec {
    PatternSpec {
        name,
        family,
        severity,
        pii_type: None,
        source,
    }
}

const fn pii(
    name: &'static str,
    severity: Severity,
    pii_type: PiiType,
    source: &'static str,
) -> PatternSpec {
    PatternSpec {
        name,
        family: PatternFamily::Pii,
        severity,
        pii_type: Some(pii_type),
        source,
    }
}

/// The fixed pattern set, in family order.
const PATTERN_SPECS: &[PatternSpec] = &[
    // SQL injection
    spec(
        "sql_union_select",
        PatternFamily::SqlInjection,
        Severity::High,
        r"(?i)\bunion\s+(?:all\s+)?select\b",
    ),
    spec(
        "sql_statement",
        PatternFamily::SqlInjection,
        Severity::High,
        r"(?i)\b(?:insert\s+into|drop\s+table|delete\s+from|truncate\s+table|alter\s+table)\b",
    ),
    spec(
        "sql_tautology",
        PatternFamily::SqlInjection,
        Severity::High,
        r#"(?i)['"]\s*(?:or|and)\s*['"]?\d+['"]?\s*=\s*['"]?\d+"#,
    ),
    spec(
        "sql_stacked_query",
        PatternFamily::SqlInjection,
        Severity::High,
        r"(?i);\s*(?:drop|delete|truncate|update|insert)\b",
    ),
    spec(
        "sql_comment_tail",
        PatternFamily::SqlInjection,
        Severity::Medium,
        r"(?i)(?:--|#|/\*)\s*$",
    ),
    // Shell / command injection
    spec(
        "shell_chained_command",
        PatternFamily::ShellInjection,
        Severity::High,
        r"(?:;|&&|\|\|?|\n)\s*(?:rm|cat|wget|curl|bash|sh|zsh|nc|chmod|chown|mkfifo|python\d?)\b",
    ),
    spec(
        "shell_substitution",
        PatternFamily::ShellInjection,
        Severity::High,
        r"\$\([^)]*\)|`[^`]*`",
    ),
    spec(
        "shell_redirect_device",
        PatternFamily::ShellInjection,
        Severity::Medium,
        r"(?:>|>>)\s*/dev/(?:null|tcp|udp)\b",
    ),
    // Path traversal
    spec(
        "path_dotdot",
        PatternFamily::PathTraversal,
        Severity::High,
        r"(?:\.\./|\.\.\\){1,}",
    ),
    spec(
        "path_dotdot_encoded",
        PatternFamily::PathTraversal,
        Severity::High,
        r"(?i)(?:%2e%2e(?:%2f|%5c)){1,}",
    ),
    spec(
        "path_sensitive_file",
        PatternFamily::PathTraversal,
        Severity::High,
        r"(?i)/etc/(?:passwd|shadow|sudoers)\b",
    ),
    // HTML / script injection
    spec(
        "html_script_tag",
        PatternFamily::HtmlInjection,
        Severity::High,
        r"(?i)</?script[^>]*>",
    ),
    spec(
        "html_iframe_tag",
        PatternFamily::HtmlInjection,
        Severity::High,
        r"(?i)<iframe[^>]*>",
    ),
    spec(
        "html_js_url",
        PatternFamily::HtmlInjection,
        Severity::Medium,
        r"(?i)javascript\s*:",
    ),
    spec(
        "html_event_handler",
        PatternFamily::HtmlInjection,
        Severity::Medium,
        r"(?i)\bon(?:click|error|load|mouseover|focus|submit)\s*=",
    ),
    // PII and secrets
    pii(
        "pii_ssn",
        Severity::Critical,
        PiiType::Ssn,
        r"\b\d{3}-\d{2}-\d{4}\b",
    ),
    pii(
        "pii_credit_card",
        Severity::Critical,
        PiiType::CreditCard,
        r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}\b",
    ),
    pii(
        "pii_email",
        Severity::High,
        PiiType::Email,
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
    ),
    pii(
        "pii_phone",
        Severity::Medium,
        PiiType::Phone,
        r"\b\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b",
    ),
    pii(
        "pii_ipv4",
        Severity::Medium,
        PiiType::Ipv4,
        r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
    ),
    pii(
        "pii_mac_address",
        Severity::Medium,
        PiiType::MacAddress,
        r"\b(?:[0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}\b",
    ),
    pii(
        "pii_api_key",
        Severity::Critical,
        PiiType::ApiKey,
        r"\b(?:sk|pk|rk)-[A-Za-z0-9_-]{16,}\b|(?i)\bbearer\s+[A-Za-z0-9._~+/-]{16,}=*",
    ),
    pii(
        "pii_password",
        Severity::Critical,
        PiiType::Password,
        r#"(?i)\bpassword\s*[:=]\s*[^\s"']+"#,
    ),
    pii(
        "pii_token",
        Severity::Critical,
        PiiType::Token,
        r#"(?i)\b(?:api[_-]?token|auth[_-]?token|secret)\s*[:=]\s*[^\s"']+|\beyJ[A-Za-z0-9_-]{10,}\.[A-Za-z0-9._-]{10,}\b"#,
    ),
];

/// The compiled catalogue, built once at process init.
#[derive(Debug)]
pub struct PatternCatalog {
    patterns: Vec<CompiledPattern>,
    dropped: Vec<DroppedPattern>,
}

impl PatternCatalog {
    /// Compile the fixed pattern set.
    ///
    /// A pattern that fails to compile is dropped and recorded; callers
    /// flush [`PatternCatalog::dropped`] to the audit log at startup.
    #[must_use]
    pub fn compile() -> Self {
        Self::compile_specs(PATTERN_SPECS)
    }

    fn compile_specs(specs: &[PatternSpec]) -> Self {
        let mut patterns = Vec::with_capacity(specs.len());
        let mut dropped = Vec::new();

        for spec in specs {
            match Regex::new(spec.source) {
                Ok(regex) => patterns.push(CompiledPattern {
                    name: spec.name,
                    family: spec.family,
                    severity: spec.severity,
                    pii_type: spec.pii_type,
                    regex,
                }),
                Err(err) => {
                    warn!(pattern = spec.name, error = %err, "pattern failed to compile, dropped");
                    dropped.push(DroppedPattern {
                        name: spec.name.to_string(),
                        error: err.to_string(),
                    });
                },
            }
        }

        Self { patterns, dropped }
    }

    /// Compiled patterns in family order.
    pub(crate) fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Compiled PII patterns only.
    pub(crate) fn pii_patterns(&self) -> impl Iterator<Item = &CompiledPattern> {
        self.patterns
            .iter()
            .filter(|p| p.family == PatternFamily::Pii)
    }

    /// Patterns that failed to compile.
    #[must_use]
    pub fn dropped(&self) -> &[DroppedPattern] {
        &self.dropped
    }

    /// Number of live patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the catalog compiled empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::compile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_catalog_compiles() {
        let catalog = PatternCatalog::compile();
        assert_eq!(catalog.len(), PATTERN_SPECS.len());
        assert!(catalog.dropped().is_empty());
    }

    #[test]
    fn test_bad_pattern_is_dropped_not_fatal() {
        let specs = [
            spec(
                "good",
                PatternFamily::SqlInjection,
                Severity::Low,
                r"\bselect\b",
            ),
            spec(
                "bad_unclosed_group",
                PatternFamily::SqlInjection,
                Severity::Low,
                r"(unclosed",
            ),
        ];
        let catalog = PatternCatalog::compile_specs(&specs);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.dropped().len(), 1);
        assert_eq!(catalog.dropped()[0].name, "bad_unclosed_group");
    }

    #[test]
    fn test_family_tokens_are_distinct() {
        let tokens: std::collections::HashSet<_> = PatternFamily::ALL
            .iter()
            .map(PatternFamily::redaction_token)
            .collect();
        assert_eq!(tokens.len(), PatternFamily::ALL.len());
    }

    #[test]
    fn test_redaction_tokens_do_not_self_match() {
        // Idempotence depends on no pattern matching any redaction token.
        let catalog = PatternCatalog::compile();
        for family in PatternFamily::ALL {
            let token = family.redaction_token();
            for pattern in catalog.patterns() {
                assert!(
                    pattern.regex.find(token).is_none(),
                    "pattern {} matches token {token}",
                    pattern.name
                );
            }
        }
    }
}
