/// Per-chunk repair applied right after sanitization.
///
/// The guard is a cheap local circuit breaker: it drops transforms whose
/// line count drifted too far and re-anchors a first line of code whose
/// leading token was rewritten. Whole-file certification is the
/// validator's job.
use serde::{Deserialize, Serialize};

use crate::chunker::LineEnding;

fn default_min_drift_lines() -> usize {
    10
}

fn default_drift_ratio() -> f64 {
    0.15
}

fn default_comment_prefixes() -> Vec<String> {
    ["#", "//", "/*", "*", "<!--", "--", ";", "\"\"\"", "'''"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// Tolerances for the guard.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GuardConfig {
    /// Absolute floor of the drift tolerance, in lines.
    #[serde(default = "default_min_drift_lines")]
    pub min_drift_lines: usize,

    /// Drift tolerance as a fraction of the original line count.
    #[serde(default = "default_drift_ratio")]
    pub drift_ratio: f64,

    /// First lines starting with one of these are prose, not code.
    #[serde(default = "default_comment_prefixes")]
    pub comment_prefixes: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_drift_lines: default_min_drift_lines(),
            drift_ratio: default_drift_ratio(),
            comment_prefixes: default_comment_prefixes(),
        }
    }
}

/// What the guard did to a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardAction {
    Accepted,
    DriftRejected {
        original_lines: usize,
        transformed_lines: usize,
    },
    FirstLineRestored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    pub text: String,
    pub action: GuardAction,
}

#[derive(Debug, Clone, Default)]
pub struct LocalGuard {
    config: GuardConfig,
}

impl LocalGuard {
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    /// Largest line-count drift that is still accepted for `original_lines`.
    #[must_use]
    pub fn drift_tolerance(&self, original_lines: usize) -> f64 {
        let floor = self.config.min_drift_lines as f64;
        floor.max(original_lines as f64 * self.config.drift_ratio)
    }

    fn is_comment_opener(&self, trimmed: &str) -> bool {
        self.config
            .comment_prefixes
            .iter()
            .any(|p| !p.is_empty() && trimmed.starts_with(p.as_str()))
    }

    /// Repair `transformed` against `original`.
    #[must_use]
    pub fn check(&self, original: &str, transformed: &str) -> GuardOutcome {
        let original_lines: Vec<&str> = original.lines().collect();
        let mut transformed_lines: Vec<&str> = transformed.lines().collect();

        let drift = original_lines.len().abs_diff(transformed_lines.len());
        if drift as f64 > self.drift_tolerance(original_lines.len()) {
            return GuardOutcome {
                text: original.to_string(),
                action: GuardAction::DriftRejected {
                    original_lines: original_lines.len(),
                    transformed_lines: transformed_lines.len(),
                },
            };
        }

        let mut action = GuardAction::Accepted;
        if let (Some(orig_first), Some(trans_first)) =
            (original_lines.first(), transformed_lines.first())
        {
            if self.first_token_changed(orig_first, trans_first) {
                transformed_lines[0] = orig_first;
                action = GuardAction::FirstLineRestored;
            }
        }

        GuardOutcome {
            text: transformed_lines.join(LineEnding::detect(original).as_str()),
            action,
        }
    }

    fn first_token_changed(&self, original: &str, transformed: &str) -> bool {
        let orig = original.trim();
        let trans = transformed.trim();
        if orig.is_empty() || trans.is_empty() || self.is_comment_opener(orig) {
            return false;
        }

        let orig_tokens = strip_brackets(orig);
        let trans_tokens = strip_brackets(trans);
        match orig_tokens.split_whitespace().next() {
            Some(first) => trans_tokens.split_whitespace().next() != Some(first),
            None => false,
        }
    }
}

fn strip_brackets(line: &str) -> String {
    line.chars()
        .filter(|c| !matches!(c, '{' | '}' | '(' | ')'))
        .collect()
}

/// Convenience wrapper with default tolerances.
#[must_use]
pub fn guard(original: &str, transformed: &str) -> String {
    LocalGuard::default().check(original, transformed).text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> String {
        (0..n).map(|i| format!("x{i} = {i}\n")).collect()
    }

    #[test]
    fn test_restores_rewritten_signature() {
        let original = "def f(x, y):\n    # сумма\n    return x + y\n";
        let transformed = "function f(x, y):\n    # sum\n    return x + y";
        let outcome = LocalGuard::default().check(original, transformed);
        assert_eq!(outcome.action, GuardAction::FirstLineRestored);
        assert_eq!(outcome.text, "def f(x, y):\n    # sum\n    return x + y");
    }

    #[test]
    fn test_comment_first_line_is_free_to_change() {
        let original = "# Привет\nx = 1\n";
        let transformed = "# Hello\nx = 1";
        let outcome = LocalGuard::default().check(original, transformed);
        assert_eq!(outcome.action, GuardAction::Accepted);
        assert_eq!(outcome.text, transformed);
    }

    #[test]
    fn test_brackets_do_not_count_as_token_change() {
        let original = "{foo: 1,\n";
        let transformed = "foo: 1,";
        assert_eq!(
            LocalGuard::default().check(original, transformed).action,
            GuardAction::Accepted
        );
    }

    #[test]
    fn test_drift_over_floor_rejected() {
        let original = lines(20);
        let transformed = lines(31);
        let outcome = LocalGuard::default().check(&original, &transformed);
        assert_eq!(outcome.text, original);
        assert_eq!(
            outcome.action,
            GuardAction::DriftRejected {
                original_lines: 20,
                transformed_lines: 31
            }
        );
    }

    #[test]
    fn test_drift_at_floor_accepted() {
        let original = lines(20);
        let transformed = lines(10);
        let outcome = LocalGuard::default().check(&original, &transformed);
        assert_eq!(outcome.action, GuardAction::Accepted);
    }

    #[test]
    fn test_drift_uses_ratio_for_large_chunks() {
        // 200 lines: tolerance is 30.
        let original = lines(200);
        assert_eq!(
            LocalGuard::default().check(&original, &lines(230)).action,
            GuardAction::Accepted
        );
        assert!(matches!(
            LocalGuard::default().check(&original, &lines(169)).action,
            GuardAction::DriftRejected { .. }
        ));
    }

    #[test]
    fn test_configurable_tolerance() {
        let strict = LocalGuard::new(GuardConfig {
            min_drift_lines: 0,
            drift_ratio: 0.0,
            ..GuardConfig::default()
        });
        let outcome = strict.check("a\nb\n", "a\nb\nc");
        assert!(matches!(outcome.action, GuardAction::DriftRejected { .. }));
    }

    #[test]
    fn test_output_drops_trailing_newline() {
        assert_eq!(guard("a = 1\nb = 2\n", "a = 1\nb = 2\n"), "a = 1\nb = 2");
    }

    #[test]
    fn test_blank_transformed_first_line_left_alone() {
        let outcome = LocalGuard::default().check("x = 1\ny\n", "\ny");
        assert_eq!(outcome.action, GuardAction::Accepted);
        assert_eq!(outcome.text, "\ny");
    }

    #[test]
    fn test_crlf_chunk_keeps_crlf() {
        let original = "x = 1  # один\r\ny = 2\r\n";
        let outcome = LocalGuard::default().check(original, "x = 1  # one\r\ny = 2\r\n");
        assert_eq!(outcome.action, GuardAction::Accepted);
        assert_eq!(outcome.text, "x = 1  # one\r\ny = 2");
    }
}
