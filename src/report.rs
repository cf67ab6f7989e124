/// Translation report (JSON + Markdown).
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::events::GuardStats;
use crate::pipeline::PipelineStats;
use crate::project::analyzer::ProjectInfo;
use crate::validator::{DiagnosticKind, ValidationResult};

pub const JSON_REPORT: &str = "TRANSLATION_REPORT.json";
pub const MARKDOWN_REPORT: &str = "TRANSLATION_REPORT.md";

/// Invalid files listed in the Markdown report.
const MARKDOWN_INVALID_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct TranslationSummary {
    pub source_project: String,
    pub source_language: String,
    pub target_language: String,
    pub total_files: usize,
    pub translatable_files: usize,
    pub total_chunks: usize,
    pub successful_chunks: usize,
    pub success_rate: String,
    pub duration_secs: f64,
    pub file_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationSummary {
    pub total_files_validated: usize,
    pub files_with_errors: usize,
    pub common_error_types: BTreeMap<String, usize>,
    pub valid_files: Vec<String>,
    pub invalid_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigUsed {
    pub provider: String,
    pub model: String,
    pub chunk_size: usize,
    pub temperature: f32,
    pub max_concurrent_requests: usize,
    pub scripts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub generated_at: DateTime<Utc>,
    pub translation_summary: TranslationSummary,
    pub validation_summary: ValidationSummary,
    pub guard_statistics: GuardStats,
    pub detailed_validation_results: BTreeMap<String, ValidationResult>,
    pub config_used: ConfigUsed,
    pub recommendations: Vec<String>,
}

fn success_rate(succeeded: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.2}%", succeeded as f64 * 100.0 / total as f64)
}

#[must_use]
pub fn summarize(results: &BTreeMap<String, ValidationResult>) -> ValidationSummary {
    let mut summary = ValidationSummary {
        total_files_validated: results.len(),
        ..ValidationSummary::default()
    };
    for (file, result) in results {
        if result.valid {
            summary.valid_files.push(file.clone());
            continue;
        }
        summary.invalid_files.push(file.clone());
        summary.files_with_errors += 1;
        for diag in &result.errors {
            *summary
                .common_error_types
                .entry(diag.kind.as_str().to_string())
                .or_default() += 1;
        }
    }
    summary
}

/// Advice keyed on the kinds of errors found.
#[must_use]
pub fn recommendations(summary: &ValidationSummary) -> Vec<String> {
    if summary.files_with_errors == 0 {
        return vec!["All files passed validation.".to_string()];
    }

    let advice = [
        (
            DiagnosticKind::LineCount,
            "Line counts diverged. Tighten the line-preservation rules in the instructions or lower chunk_size.",
        ),
        (
            DiagnosticKind::Syntax,
            "Syntax errors were introduced. Re-run the affected files or review them with the language's own parser.",
        ),
        (
            DiagnosticKind::Structure,
            "Code structure changed. Strengthen the instructions about keeping brackets and operators.",
        ),
        (
            DiagnosticKind::Script,
            "Script characters were lost or left untranslated. Check the PRESERVE/TRANSLATE keywords in the instructions.",
        ),
        (
            DiagnosticKind::Indentation,
            "Indentation changed. Review whitespace-sensitive files (Python, YAML) before use.",
        ),
        (
            DiagnosticKind::Merge,
            "Some files could not be merged. Re-run the translation for those files.",
        ),
    ];

    advice
        .iter()
        .filter(|(kind, _)| summary.common_error_types.contains_key(kind.as_str()))
        .map(|(_, text)| (*text).to_string())
        .collect()
}

impl TranslationReport {
    pub fn build(
        info: &ProjectInfo,
        config: &Config,
        stats: &PipelineStats,
        guard: GuardStats,
        results: BTreeMap<String, ValidationResult>,
    ) -> Self {
        let validation_summary = summarize(&results);
        let recommendations = recommendations(&validation_summary);

        Self {
            generated_at: Utc::now(),
            translation_summary: TranslationSummary {
                source_project: info.root.display().to_string(),
                source_language: config.source_language.clone(),
                target_language: config.target_language.clone(),
                total_files: info.total_files,
                translatable_files: info.translatable_files,
                total_chunks: stats.attempted,
                successful_chunks: stats.succeeded,
                success_rate: success_rate(stats.succeeded, stats.attempted),
                duration_secs: stats.duration.as_secs_f64(),
                file_types: info.file_types.clone(),
            },
            validation_summary,
            guard_statistics: guard,
            detailed_validation_results: results,
            config_used: ConfigUsed {
                provider: config.provider.kind.as_str().to_string(),
                model: config.provider.model().to_string(),
                chunk_size: config.chunk_size,
                temperature: config.provider.temperature,
                max_concurrent_requests: config.max_concurrent_requests,
                scripts: config
                    .validation
                    .scripts
                    .iter()
                    .map(|s| format!("{} {}", s.name, s.pattern))
                    .collect(),
            },
            recommendations,
        }
    }

    #[must_use]
    pub fn to_markdown(&self) -> String {
        let t = &self.translation_summary;
        let v = &self.validation_summary;
        let g = &self.guard_statistics;
        let c = &self.config_used;
        let mut md = String::new();

        let _ = writeln!(md, "# Translation Report\n");
        let _ = writeln!(md, "Generated: {}\n", self.generated_at.to_rfc3339());

        let _ = writeln!(md, "## Summary\n");
        let _ = writeln!(md, "- **Source project:** `{}`", t.source_project);
        let _ = writeln!(md, "- **Languages:** {} -> {}", t.source_language, t.target_language);
        let _ = writeln!(md, "- **Total files:** {}", t.total_files);
        let _ = writeln!(md, "- **Translatable files:** {}", t.translatable_files);
        let _ = writeln!(
            md,
            "- **Chunks translated:** {}/{}",
            t.successful_chunks, t.total_chunks
        );
        let _ = writeln!(md, "- **Success rate:** {}", t.success_rate);
        let _ = writeln!(md, "- **Duration:** {:.1}s\n", t.duration_secs);

        let _ = writeln!(md, "## Validation\n");
        let _ = writeln!(md, "- **Files validated:** {}", v.total_files_validated);
        let _ = writeln!(md, "- **Files with errors:** {}", v.files_with_errors);
        let _ = writeln!(md, "- **Files without errors:** {}\n", v.valid_files.len());
        if !v.common_error_types.is_empty() {
            let _ = writeln!(md, "### Error types\n");
            for (kind, count) in &v.common_error_types {
                let _ = writeln!(md, "- {kind}: {count}");
            }
            md.push('\n');
        }

        let _ = writeln!(md, "## Guard\n");
        let _ = writeln!(md, "- **Failed chunks (kept original):** {}", g.failed_chunks);
        let _ = writeln!(md, "- **Drift rejections:** {}", g.drift_rejections);
        let _ = writeln!(md, "- **First lines restored:** {}", g.first_line_restorations);
        let _ = writeln!(md, "- **Merge failures:** {}\n", g.merge_failures);

        let _ = writeln!(md, "## Configuration\n");
        let _ = writeln!(md, "- **Provider:** {}", c.provider);
        let _ = writeln!(md, "- **Model:** {}", c.model);
        let _ = writeln!(md, "- **Chunk size:** {} lines", c.chunk_size);
        let _ = writeln!(md, "- **Temperature:** {}", c.temperature);
        let _ = writeln!(md, "- **Max concurrent requests:** {}\n", c.max_concurrent_requests);

        let _ = writeln!(md, "## Recommendations\n");
        for rec in &self.recommendations {
            let _ = writeln!(md, "- {rec}");
        }

        if !v.invalid_files.is_empty() {
            let _ = writeln!(md, "\n## Files with errors\n");
            for file in v.invalid_files.iter().take(MARKDOWN_INVALID_LIMIT) {
                let _ = writeln!(md, "### `{file}`\n");
                if let Some(result) = self.detailed_validation_results.get(file) {
                    for diag in &result.errors {
                        let _ = writeln!(md, "- {diag}");
                    }
                }
                md.push('\n');
            }
            let rest = v.invalid_files.len().saturating_sub(MARKDOWN_INVALID_LIMIT);
            if rest > 0 {
                let _ = writeln!(md, "... and {rest} more (see {JSON_REPORT})");
            }
        }

        md
    }

    /// Write both report files into `dir`.
    pub fn write(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create report dir: {}", dir.display()))?;

        let json_path = dir.join(JSON_REPORT);
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("failed to write report: {}", json_path.display()))?;

        let md_path = dir.join(MARKDOWN_REPORT);
        std::fs::write(&md_path, self.to_markdown())
            .with_context(|| format!("failed to write report: {}", md_path.display()))?;

        info!(
            "Reports saved: {} and {}",
            json_path.display(),
            md_path.display()
        );
        Ok((json_path, md_path))
    }
}
