//! Prompt complexity assessment.
//!
//! Pure and deterministic: the same prompt always scores the same.
//! Scoring is additive across four signals (word count, line count,
//! complexity-indicator keywords, structure); thresholds map the score
//! to a level, with ties breaking downward toward simpler routing.

use vesper_core::{ComplexityLevel, TaskKind};

/// Keywords whose presence suggests a reasoning-heavy request.
const COMPLEXITY_KEYWORDS: &[&str] = &[
    "analyze",
    "architecture",
    "algorithm",
    "benchmark",
    "compare",
    "comprehensive",
    "debug",
    "derive",
    "design",
    "detailed",
    "implement",
    "optimize",
    "prove",
    "refactor",
    "step by step",
    "trade-off",
    "tradeoff",
];

/// Keywords routing a prompt into the code task bucket.
const CODE_KEYWORDS: &[&str] = &[
    "code", "function", "compile", "rust", "python", "typescript", "bug", "stack trace", "unit test",
];

/// Keywords routing a prompt into the summarize task bucket.
const SUMMARIZE_KEYWORDS: &[&str] = &["summarize", "summary", "tl;dr", "condense", "shorten"];

/// Keywords routing a prompt into the creative task bucket.
const CREATIVE_KEYWORDS: &[&str] = &["story", "poem", "fiction", "lyrics", "screenplay"];

/// Assess the complexity of a prompt.
#[must_use]
pub fn assess(prompt: &str) -> ComplexityLevel {
    let score = complexity_score(prompt);
    if score <= 3 {
        ComplexityLevel::Low
    } else if score <= 6 {
        ComplexityLevel::Medium
    } else {
        ComplexityLevel::High
    }
}

fn complexity_score(prompt: &str) -> u32 {
    let mut score = 0u32;

    let word_count = prompt.split_whitespace().count();
    if word_count > 500 {
        score = score.saturating_add(3);
    } else if word_count > 100 {
        score = score.saturating_add(2);
    } else if word_count > 20 {
        score = score.saturating_add(1);
    }

    let line_count = prompt.lines().count();
    if line_count > 20 {
        score = score.saturating_add(2);
    } else if line_count > 5 {
        score = score.saturating_add(1);
    }

    let lower = prompt.to_lowercase();
    let keyword_hits = COMPLEXITY_KEYWORDS
        .iter()
        .filter(|k| lower.contains(**k))
        .count();
    if keyword_hits >= 3 {
        score = score.saturating_add(2);
    } else if keyword_hits >= 1 {
        score = score.saturating_add(1);
    }

    if prompt.contains("```") {
        score = score.saturating_add(2);
    }
    if prompt.matches('?').count() >= 2 {
        score = score.saturating_add(1);
    }

    score
}

/// Classify the broad task category of a prompt.
#[must_use]
pub fn classify_task(prompt: &str) -> TaskKind {
    let lower = prompt.to_lowercase();
    if prompt.contains("```") || CODE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        TaskKind::Code
    } else if SUMMARIZE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        TaskKind::Summarize
    } else if CREATIVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        TaskKind::Creative
    } else {
        TaskKind::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivial_prompt_is_low() {
        assert_eq!(assess("What is 2+2?"), ComplexityLevel::Low);
        assert_eq!(assess("hello"), ComplexityLevel::Low);
    }

    #[test]
    fn test_keyworded_multiline_prompt_is_medium() {
        let prompt = "Please analyze this design and compare the two approaches.\n\
                      Context line one about the service.\n\
                      Context line two about the database.\n\
                      Context line three about the cache.\n\
                      Context line four about the queue.\n\
                      Context line five about deployment.\n\
                      What should we pick? What are the risks? Give a detailed \
                      and comprehensive answer with every trade-off spelled out, \
                      including operational cost, migration effort, rollback \
                      strategy, and the impact on the existing monitoring stack.";
        assert_eq!(assess(prompt), ComplexityLevel::Medium);
    }

    #[test]
    fn test_long_code_heavy_prompt_is_high() {
        let body = "word ".repeat(600);
        let prompt = format!(
            "Analyze and refactor this implementation. Explain the algorithm \
             and optimize it step by step.\n```rust\nfn f() {{}}\n```\n{body}"
        );
        assert_eq!(assess(&prompt), ComplexityLevel::High);
    }

    #[test]
    fn test_assess_is_pure() {
        let prompt = "Implement a design that can analyze trade-offs?";
        assert_eq!(assess(prompt), assess(prompt));
    }

    #[test]
    fn test_boundary_ties_break_downward() {
        // A score of exactly 3 stays Low; 6 stays Medium.
        // 21+ words (+1), 6+ lines (+1), one keyword (+1) = 3.
        let prompt = "please analyze the following list of items\n\
                      one\ntwo\nthree\nfour\nfive\n\
                      and then tell me which of them matters most overall";
        assert_eq!(assess(prompt), ComplexityLevel::Low);
    }

    #[test]
    fn test_task_classification() {
        assert_eq!(classify_task("What is 2+2?"), TaskKind::General);
        assert_eq!(classify_task("fix this rust function"), TaskKind::Code);
        assert_eq!(classify_task("Summarize this article"), TaskKind::Summarize);
        assert_eq!(classify_task("write a poem about rain"), TaskKind::Creative);
        assert_eq!(classify_task("```\nx\n```"), TaskKind::Code);
    }
}
