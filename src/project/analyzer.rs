/// Project scan: which files get translated and which are copied as-is.
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;

/// A file selected for translation.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    /// `/`-separated path relative to the project root.
    pub relative_path: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub lines: usize,
    pub estimated_chunks: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectInfo {
    #[serde(skip)]
    pub root: PathBuf,
    pub total_files: usize,
    pub translatable_files: usize,
    pub total_lines: usize,
    pub estimated_chunks: usize,
    /// Translatable files per extension (with leading dot).
    pub file_types: BTreeMap<String, usize>,
    pub files: Vec<SourceFile>,
    /// Everything else outside excluded dirs, relative to the root.
    #[serde(skip)]
    pub other_files: Vec<String>,
}

fn exclude_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid exclude_files pattern: {pattern}"))?;
        builder.add(glob);
    }
    builder.build().context("failed to build exclude_files matcher")
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Walk `root` and classify every file.
///
/// Hidden files are included and ignore files are not consulted, so the
/// output tree is a full copy of the project minus `exclude_dirs`.
pub fn analyze(root: &Path, config: &Config) -> Result<ProjectInfo> {
    anyhow::ensure!(root.is_dir(), "project directory not found: {}", root.display());

    let excluded_files = exclude_set(&config.exclude_files)?;
    let excluded_dirs: HashSet<String> = config.exclude_dirs.iter().cloned().collect();
    let chunk_size = config.chunk_size.max(1);

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            entry.depth() == 0
                || !is_dir
                || !excluded_dirs.contains(entry.file_name().to_string_lossy().as_ref())
        })
        .build();

    let mut info = ProjectInfo {
        root: root.to_path_buf(),
        ..ProjectInfo::default()
    };

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        info.total_files += 1;

        let path = entry.path();
        let relative_path = relative(root, path);
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let translatable = !ext.is_empty()
            && config.is_supported_extension(ext)
            && !excluded_files.is_match(entry.file_name());

        if !translatable {
            info.other_files.push(relative_path);
            continue;
        }

        let lines = match std::fs::read_to_string(path) {
            Ok(text) => text.lines().count(),
            Err(e) => {
                warn!("{relative_path}: not readable as UTF-8 ({e}), copying as-is");
                info.other_files.push(relative_path);
                continue;
            }
        };

        let estimated_chunks = lines / chunk_size + 1;
        debug!("{relative_path}: {lines} lines, ~{estimated_chunks} chunks");
        *info.file_types.entry(format!(".{ext}")).or_default() += 1;
        info.total_lines += lines;
        info.estimated_chunks += estimated_chunks;
        info.files.push(SourceFile {
            relative_path,
            path: path.to_path_buf(),
            lines,
            estimated_chunks,
        });
    }

    info.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    info.other_files.sort();
    info.translatable_files = info.files.len();

    info!(
        "Analyzed {}: {} files, {} translatable, {} lines",
        root.display(),
        info.total_files,
        info.translatable_files,
        info.total_lines
    );
    Ok(info)
}
