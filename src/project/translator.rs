/// End-to-end translation of a project directory.
///
/// analyze -> chunk into staging -> transform every chunk under one
/// admission gate -> per file: merge, write, validate -> copy the rest ->
/// report.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::analyzer::{self, ProjectInfo, SourceFile};
use crate::chunker::{ChunkRecord, FileJob};
use crate::chunker::store::ChunkStore;
use crate::config::Config;
use crate::events::{EventCounters, EventSink, FanoutSink, GuardStats, PipelineEvent, TracingSink};
use crate::guard::LocalGuard;
use crate::merger::{self, MergeError};
use crate::pipeline::{PipelineStats, TransformPipeline};
use crate::report::TranslationReport;
use crate::transform::{TransformContext, Transformer};
use crate::validator::{DiagnosticKind, ValidationResult, Validator};

#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Output directory; defaults to `<project><output_suffix>` next to the project.
    pub output_dir: Option<PathBuf>,
    /// Analyze only; write nothing.
    pub dry_run: bool,
    pub show_progress: bool,
}

#[derive(Debug)]
pub struct TranslationOutcome {
    pub info: ProjectInfo,
    pub output_dir: PathBuf,
    pub stats: PipelineStats,
    pub guard: GuardStats,
    pub results: BTreeMap<String, ValidationResult>,
    /// `None` for dry runs.
    pub report: Option<TranslationReport>,
}

impl TranslationOutcome {
    #[must_use]
    pub fn invalid_files(&self) -> usize {
        self.results.values().filter(|r| !r.valid).count()
    }
}

/// Ticks a progress bar once per finished chunk.
struct ProgressSink(ProgressBar);

impl EventSink for ProgressSink {
    fn emit(&self, event: PipelineEvent) {
        if matches!(
            event,
            PipelineEvent::ChunkTransformed { .. } | PipelineEvent::ChunkFailed { .. }
        ) {
            self.0.inc(1);
        }
    }
}

fn progress_bar(total: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("  {bar:40.cyan/blue} {pos}/{len} chunks {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb
}

/// `<parent>/<name><suffix>` for a project at `<parent>/<name>`.
#[must_use]
pub fn default_output_dir(project: &Path, suffix: &str) -> PathBuf {
    let name = project
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    project
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{name}{suffix}"))
}

pub struct ProjectTranslator {
    config: Config,
    transformer: Arc<dyn Transformer>,
    extra_sink: Option<Arc<dyn EventSink>>,
}

impl ProjectTranslator {
    pub fn new(config: Config, transformer: Arc<dyn Transformer>) -> Self {
        Self {
            config,
            transformer,
            extra_sink: None,
        }
    }

    /// Also send every pipeline event to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.extra_sink = Some(sink);
        self
    }

    pub async fn translate(&self, project: &Path, options: &TranslateOptions) -> Result<TranslationOutcome> {
        self.config.validate()?;
        let info = analyzer::analyze(project, &self.config)?;
        let output_dir = options
            .output_dir
            .clone()
            .unwrap_or_else(|| default_output_dir(project, &self.config.output_suffix));

        if options.dry_run {
            info!(
                "Dry run: {} files, ~{} chunks would be written to {}",
                info.translatable_files,
                info.estimated_chunks,
                output_dir.display()
            );
            for file in &info.files {
                info!("  {} ({} lines, ~{} chunks)", file.relative_path, file.lines, file.estimated_chunks);
            }
            return Ok(TranslationOutcome {
                info,
                output_dir,
                stats: PipelineStats::default(),
                guard: GuardStats::default(),
                results: BTreeMap::new(),
                report: None,
            });
        }

        let instructions = self.config.instructions()?;
        let validator = Validator::new(&self.config.validation, &instructions)?;
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

        let staging = tempfile::Builder::new()
            .prefix("transllm-")
            .tempdir()
            .context("failed to create staging dir")?;
        let chunk_store = ChunkStore::open(staging.path().join("chunks"))?;
        let translated_store = ChunkStore::open(staging.path().join("translated"))?;

        let StagedFiles {
            jobs,
            pending,
            failures,
        } = stage_files(&info.files, &output_dir, &chunk_store, self.config.chunk_size);

        let counters = Arc::new(EventCounters::default());
        let pb = progress_bar(pending.len(), options.show_progress);
        let mut sinks: Vec<Arc<dyn EventSink>> = vec![
            Arc::new(TracingSink),
            counters.clone(),
            Arc::new(ProgressSink(pb.clone())),
        ];
        if let Some(extra) = &self.extra_sink {
            sinks.push(Arc::clone(extra));
        }
        let events: Arc<dyn EventSink> = Arc::new(FanoutSink::new(sinks));

        let context = TransformContext {
            source_language: self.config.source_language.clone(),
            target_language: self.config.target_language.clone(),
            instructions,
        };
        let pipeline = TransformPipeline::new(
            Arc::clone(&self.transformer),
            context,
            LocalGuard::new(self.config.guard.clone()),
            self.config.max_concurrent_requests,
            Arc::clone(&events),
        )
        .with_output_store(translated_store.clone());
        let stats = pipeline.run(pending).await.stats;
        pb.finish_and_clear();

        let mut results = BTreeMap::new();
        for (file, result) in failures {
            events.emit(PipelineEvent::FileValidated {
                file: file.clone(),
                valid: false,
                errors: result.errors.len(),
            });
            results.insert(file, result);
        }
        for job in &jobs {
            let result = finish_file(job, &translated_store, &validator, events.as_ref());
            events.emit(PipelineEvent::FileValidated {
                file: job.relative_path.clone(),
                valid: result.valid,
                errors: result.errors.len(),
            });
            results.insert(job.relative_path.clone(), result);
        }

        let copied = copy_other_files(&info, &output_dir);
        info!("Copied {copied} non-translatable files");

        let guard = counters.snapshot();
        let report = TranslationReport::build(&info, &self.config, &stats, guard, results.clone());
        report.write(&output_dir)?;

        let outcome = TranslationOutcome {
            info,
            output_dir,
            stats,
            guard,
            results,
            report: Some(report),
        };
        info!(
            "Translation finished: {}/{} chunks, {} of {} files with validation errors",
            outcome.stats.succeeded,
            outcome.stats.attempted,
            outcome.invalid_files(),
            outcome.results.len()
        );
        Ok(outcome)
    }
}

/// Result of chunking the analyzed files into the staging store.
struct StagedFiles {
    jobs: Vec<FileJob>,
    /// Chunks read back from the store, ready for the pipeline.
    pending: Vec<ChunkRecord>,
    /// Files that could not be staged, with their diagnostic.
    failures: Vec<(String, ValidationResult)>,
}

fn stage_file(
    file: &SourceFile,
    output_dir: &Path,
    store: &ChunkStore,
    chunk_size: usize,
) -> Result<(FileJob, Vec<ChunkRecord>)> {
    let text = std::fs::read_to_string(&file.path)
        .with_context(|| format!("failed to read {}", file.path.display()))?;
    let job = FileJob::new(
        &file.relative_path,
        file.path.clone(),
        output_dir.join(&file.relative_path),
        &text,
        chunk_size,
    );
    store.save_all(&job.chunks)?;
    let chunks = store.load_file_chunks(&job.relative_path)?;
    Ok((job, chunks))
}

/// Stage every file on its own; one file's failure only marks that file.
fn stage_files(
    files: &[SourceFile],
    output_dir: &Path,
    store: &ChunkStore,
    chunk_size: usize,
) -> StagedFiles {
    let mut staged = StagedFiles {
        jobs: Vec::with_capacity(files.len()),
        pending: Vec::new(),
        failures: Vec::new(),
    };
    for file in files {
        match stage_file(file, output_dir, store, chunk_size) {
            Ok((job, chunks)) => {
                staged.pending.extend(chunks);
                staged.jobs.push(job);
            }
            Err(e) => {
                warn!("Skipping {}: {e:#}", file.relative_path);
                staged.failures.push((
                    file.relative_path.clone(),
                    ValidationResult::failed(
                        DiagnosticKind::Io,
                        format!("Failed to stage file: {e:#}"),
                    ),
                ));
            }
        }
    }
    staged
}

/// Merge, write and validate one file. Never fails; problems become
/// diagnostics so the remaining files still get processed.
fn finish_file(
    job: &FileJob,
    store: &ChunkStore,
    validator: &Validator,
    events: &dyn EventSink,
) -> ValidationResult {
    if job.chunks.is_empty() {
        return match write_empty(&job.output_path) {
            Ok(()) => validator.validate_files(&job.relative_path, &job.source_path, &job.output_path),
            Err(e) => ValidationResult::failed(DiagnosticKind::Io, format!("{e:#}")),
        };
    }

    match merger::merge_file(
        store,
        &job.relative_path,
        &job.output_path,
        job.trailing_newline,
        job.line_ending,
    ) {
        Ok(chunks) => {
            events.emit(PipelineEvent::FileMerged {
                file: job.relative_path.clone(),
                chunks,
            });
            validator.validate_files(&job.relative_path, &job.source_path, &job.output_path)
        }
        Err(e) => {
            events.emit(PipelineEvent::MergeFailed {
                file: job.relative_path.clone(),
                reason: e.to_string(),
            });
            merge_failure(&e)
        }
    }
}

fn merge_failure(e: &MergeError) -> ValidationResult {
    ValidationResult::failed(DiagnosticKind::Merge, format!("Failed to merge chunks: {e}"))
}

fn write_empty(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, "").with_context(|| format!("failed to write {}", path.display()))
}

fn copy_other_files(info: &ProjectInfo, output_dir: &Path) -> usize {
    let mut copied = 0;
    for rel in &info.other_files {
        let src = info.root.join(rel);
        let dst = output_dir.join(rel);
        let result = dst
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::copy(&src, &dst));
        match result {
            Ok(_) => copied += 1,
            Err(e) => warn!("Failed to copy {rel}: {e}"),
        }
    }
    copied
}
