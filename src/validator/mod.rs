/// Post-merge integrity checks.
///
/// Compares a merged file against its original and reports every
/// preserved-structure invariant that no longer holds. The validator never
/// touches files on disk beyond reading them.
pub mod lexer;
pub mod script;
pub mod skeleton;
pub mod syntax;

use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lexer::{CommentSyntax, code_view};
pub use script::{ScriptCheck, ScriptPolicy, ScriptRule};
use syntax::Grammar;

fn default_syntax_languages() -> Vec<String> {
    Grammar::names()
}

fn default_scripts() -> Vec<ScriptRule> {
    vec![ScriptRule::chinese()]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ValidationConfig {
    /// Grammar names (see [`Grammar::names`]) whose files get a parse check.
    #[serde(default = "default_syntax_languages")]
    pub syntax_languages: Vec<String>,

    #[serde(default = "default_scripts")]
    pub scripts: Vec<ScriptRule>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            syntax_languages: default_syntax_languages(),
            scripts: default_scripts(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    LineCount,
    Syntax,
    Structure,
    Script,
    Indentation,
    Merge,
    Io,
}

impl DiagnosticKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LineCount => "line_count_mismatch",
            Self::Syntax => "syntax_error",
            Self::Structure => "structure_change",
            Self::Script => "script_characters",
            Self::Indentation => "indentation_error",
            Self::Merge => "merge_failure",
            Self::Io => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Per-file verdict. `valid` is true iff `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn from_errors(errors: Vec<Diagnostic>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    #[must_use]
    pub fn failed(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::from_errors(vec![Diagnostic::new(kind, message)])
    }
}

pub struct Validator {
    syntax_languages: Vec<String>,
    scripts: Vec<ScriptCheck>,
}

impl Validator {
    /// Build a validator; script policies are resolved against `instructions`
    /// once, up front.
    pub fn new(config: &ValidationConfig, instructions: &str) -> Result<Self> {
        let scripts = ScriptCheck::active(&config.scripts, instructions)?;
        for check in &scripts {
            debug!("Script policy active: {:?}", check.policy());
        }
        Ok(Self {
            syntax_languages: config.syntax_languages.clone(),
            scripts,
        })
    }

    /// Check `merged` against `original`. `rel_path` selects the grammar and
    /// comment syntax.
    #[must_use]
    pub fn validate(&self, rel_path: &str, original: &str, merged: &str) -> ValidationResult {
        let original_lines: Vec<&str> = original.lines().collect();
        let merged_lines: Vec<&str> = merged.lines().collect();
        let mut errors = Vec::new();

        if original_lines.len() != merged_lines.len() {
            errors.push(Diagnostic::new(
                DiagnosticKind::LineCount,
                format!(
                    "Line count mismatch: {} vs {}",
                    original_lines.len(),
                    merged_lines.len()
                ),
            ));
        }

        if let Some(diag) = self.check_syntax(rel_path, original, merged) {
            errors.push(diag);
        }

        let comment_syntax = CommentSyntax::for_path(rel_path);
        let original_code = code_view(original, comment_syntax);
        let merged_code = code_view(merged, comment_syntax);
        let original_skeleton = skeleton::fingerprint(&original_code);
        let merged_skeleton = skeleton::fingerprint(&merged_code);
        if !skeleton::same_shape(&original_skeleton, &merged_skeleton) {
            let diff = skeleton::describe_difference(
                &original_code,
                &merged_code,
                &original_skeleton,
                &merged_skeleton,
            );
            errors.push(Diagnostic::new(
                DiagnosticKind::Structure,
                format!("Code structure changed: {diff}"),
            ));
        }

        for check in &self.scripts {
            errors.extend(
                check
                    .check(original, merged)
                    .into_iter()
                    .map(|m| Diagnostic::new(DiagnosticKind::Script, m)),
            );
        }

        if original_lines.len() == merged_lines.len() {
            errors.extend(indentation_errors(&original_lines, &merged_lines));
        }

        ValidationResult::from_errors(errors)
    }

    /// Read both files and validate them. Read failures become a diagnostic.
    #[must_use]
    pub fn validate_files(
        &self,
        rel_path: &str,
        original_path: &Path,
        merged_path: &Path,
    ) -> ValidationResult {
        let read = |p: &Path| std::fs::read_to_string(p);
        match (read(original_path), read(merged_path)) {
            (Ok(original), Ok(merged)) => self.validate(rel_path, &original, &merged),
            (Err(e), _) | (_, Err(e)) => {
                ValidationResult::failed(DiagnosticKind::Io, format!("Validation exception: {e}"))
            }
        }
    }

    fn check_syntax(&self, rel_path: &str, original: &str, merged: &str) -> Option<Diagnostic> {
        let ext = Path::new(rel_path).extension()?.to_str()?.to_ascii_lowercase();
        let grammar = Grammar::get_by_extension(&ext)?;
        if !self.syntax_languages.iter().any(|l| l == grammar.name) {
            return None;
        }

        match syntax::first_syntax_error(&grammar, original) {
            Ok(None) => {}
            Ok(Some(issue)) => {
                debug!(
                    "{rel_path}: original already fails to parse at line {}, skipping syntax check",
                    issue.line
                );
                return None;
            }
            Err(e) => {
                warn!("{rel_path}: syntax check unavailable: {e}");
                return None;
            }
        }

        match syntax::first_syntax_error(&grammar, merged) {
            Ok(Some(issue)) => Some(Diagnostic::new(
                DiagnosticKind::Syntax,
                format!(
                    "{} syntax error at line {}: {}",
                    grammar.display_name, issue.line, issue.message
                ),
            )),
            Ok(None) => None,
            Err(e) => {
                warn!("{rel_path}: syntax check unavailable: {e}");
                None
            }
        }
    }
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn indentation_errors(original: &[&str], merged: &[&str]) -> Vec<Diagnostic> {
    original
        .iter()
        .zip(merged)
        .enumerate()
        .filter_map(|(i, (o, m))| {
            let (a, b) = (leading_whitespace(o), leading_whitespace(m));
            (a != b).then(|| {
                Diagnostic::new(
                    DiagnosticKind::Indentation,
                    format!("Indentation mismatch at line {}: {a} vs {b} spaces", i + 1),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(instructions: &str) -> Validator {
        Validator::new(&ValidationConfig::default(), instructions).unwrap()
    }

    fn kinds(result: &ValidationResult) -> Vec<DiagnosticKind> {
        result.errors.iter().map(|d| d.kind).collect()
    }

    const ORIGINAL: &str = "def area(w, h):\n    # площадь\n    return w * h  # результат\n";

    #[test]
    fn test_faithful_translation_is_valid() {
        let merged = "def area(w, h):\n    # area\n    return w * h  # result\n";
        let result = validator("").validate("geo.py", ORIGINAL, merged);
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn test_translated_string_literal_is_not_structural() {
        let original = "print(\"Привет, мир (тест)\")\n";
        let merged = "print(\"Hello, world\")\n";
        assert!(validator("").validate("a.py", original, merged).valid);
    }

    #[test]
    fn test_line_count_mismatch() {
        let merged = "def area(w, h):\n    return w * h\n";
        let result = validator("").validate("geo.py", ORIGINAL, merged);
        assert!(!result.valid);
        assert_eq!(result.errors[0].message, "Line count mismatch: 3 vs 2");
        assert!(!kinds(&result).contains(&DiagnosticKind::Indentation));
    }

    #[test]
    fn test_syntax_error_reported() {
        let merged = "def area(w, h:\n    # area\n    return w * h  # result\n";
        let result = validator("").validate("geo.py", ORIGINAL, merged);
        assert!(kinds(&result).contains(&DiagnosticKind::Syntax));
        let syntax = result
            .errors
            .iter()
            .find(|d| d.kind == DiagnosticKind::Syntax)
            .unwrap();
        assert!(syntax.message.starts_with("Python syntax error at line"));
    }

    #[test]
    fn test_syntax_skipped_when_original_broken() {
        let original = "def f(:\n    pass\n";
        let merged = "def f(:\n    pass\n";
        let result = validator("").validate("x.py", original, merged);
        assert!(result.valid);
    }

    #[test]
    fn test_syntax_languages_filter() {
        let config = ValidationConfig {
            syntax_languages: vec!["rust".to_string()],
            ..ValidationConfig::default()
        };
        let v = Validator::new(&config, "").unwrap();
        let merged = "def area(w, h:\n    # area\n    return w * h  # result\n";
        let result = v.validate("geo.py", ORIGINAL, merged);
        assert!(!kinds(&result).contains(&DiagnosticKind::Syntax));
    }

    #[test]
    fn test_structure_change_reports_brackets() {
        let original = "x = f(a)[0]\n";
        let merged = "x = f(a)\n";
        let result = validator("").validate("a.js", original, merged);
        assert_eq!(kinds(&result), vec![DiagnosticKind::Structure]);
        assert!(
            result.errors[0]
                .message
                .starts_with("Code structure changed: [: 1->0; ]: 1->0"),
            "{}",
            result.errors[0].message
        );
    }

    #[test]
    fn test_dropped_decorator_is_structure_change() {
        let original = "@cache\ndef f(x):\n    return x\n";
        let merged = "cache\ndef f(x):\n    return x\n";
        let result = validator("").validate("a.py", original, merged);
        assert_eq!(kinds(&result), vec![DiagnosticKind::Structure]);
        assert!(
            result.errors[0].message.contains("`@c` vs `c`"),
            "{}",
            result.errors[0].message
        );
    }

    #[test]
    fn test_lost_cjk_character_under_preserve() {
        let original = "# 天干: 甲乙丙\nstems = 3\n";
        let merged = "# Heavenly stems: 甲乙\nstems = 3\n";
        let result = validator("PRESERVE_CHINESE_CHARACTERS").validate("s.py", original, merged);
        assert!(!result.valid);
        assert!(
            result
                .errors
                .iter()
                .any(|d| d.kind == DiagnosticKind::Script
                    && d.message.starts_with("Lost Chinese characters"))
        );
    }

    #[test]
    fn test_script_check_off_without_policy() {
        let original = "# 天干\nx = 1\n";
        let merged = "# stems\nx = 1\n";
        assert!(validator("").validate("s.py", original, merged).valid);
    }

    #[test]
    fn test_indentation_mismatch() {
        let original = "if x:\n    y = 1\n";
        let merged = "if x:\n  y = 1\n";
        let result = validator("").validate("a.py", original, merged);
        assert!(
            result
                .errors
                .iter()
                .any(|d| d.message == "Indentation mismatch at line 2: 4 vs 2 spaces")
        );
    }

    #[test]
    fn test_validate_files_missing_merged() {
        let temp = tempfile::tempdir().unwrap();
        let original = temp.path().join("a.py");
        std::fs::write(&original, "x = 1\n").unwrap();
        let result =
            validator("").validate_files("a.py", &original, &temp.path().join("missing.py"));
        assert!(!result.valid);
        assert_eq!(result.errors[0].kind, DiagnosticKind::Io);
    }

    #[test]
    fn test_validate_files_reads_both() {
        let temp = tempfile::tempdir().unwrap();
        let original = temp.path().join("a.py");
        let merged = temp.path().join("b.py");
        std::fs::write(&original, "x = 1  # один\n").unwrap();
        std::fs::write(&merged, "x = 1  # one\n").unwrap();
        assert!(validator("").validate_files("a.py", &original, &merged).valid);
    }
}
