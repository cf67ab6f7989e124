/// On-disk staging area for chunk artifacts.
///
/// Each chunk is one JSON file whose name is a pure function of the file's
/// relative path and the chunk index, so all chunks of a file can be found
/// again by name prefix with no side index.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};

use super::ChunkRecord;

const ARTIFACT_INFIX: &str = ".chunk-";
const ARTIFACT_EXT: &str = ".json";

/// Escape a relative path into a flat, filesystem-safe stem.
///
/// Bytes outside `[A-Za-z0-9-]` become `_xx`. The mapping is injective and
/// never produces `.`, which keeps `<stem>.chunk-` an unambiguous prefix.
#[must_use]
pub fn safe_stem(relative_path: &str) -> String {
    let normalized = relative_path.replace('\\', "/");
    let mut out = String::with_capacity(normalized.len());
    for b in normalized.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{b:02x}"));
        }
    }
    out
}

#[must_use]
pub fn artifact_name(relative_path: &str, chunk_index: usize) -> String {
    format!(
        "{}{ARTIFACT_INFIX}{chunk_index:04}{ARTIFACT_EXT}",
        safe_stem(relative_path)
    )
}

/// A directory of chunk artifacts.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create staging dir: {}", root.display()))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, relative_path: &str, chunk_index: usize) -> PathBuf {
        self.root.join(artifact_name(relative_path, chunk_index))
    }

    /// Persist one chunk. Returns the artifact path.
    pub fn save(&self, chunk: &ChunkRecord) -> Result<PathBuf> {
        let path = self.path_for(&chunk.original_file, chunk.chunk_index);
        let data = serde_json::to_string_pretty(chunk).context("failed to serialize chunk")?;
        fs::write(&path, data)
            .with_context(|| format!("failed to write chunk: {}", path.display()))?;
        Ok(path)
    }

    pub fn save_all(&self, chunks: &[ChunkRecord]) -> Result<Vec<PathBuf>> {
        chunks.iter().map(|c| self.save(c)).collect()
    }

    pub fn load(&self, path: &Path) -> Result<ChunkRecord> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read chunk: {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse chunk: {}", path.display()))
    }

    /// Rediscover every chunk of `relative_path`, sorted by `chunk_index`.
    ///
    /// An artifact that cannot be read or decoded, or that names another
    /// file, is an error: a merge over a partial set would lose lines.
    pub fn load_file_chunks(&self, relative_path: &str) -> Result<Vec<ChunkRecord>> {
        let prefix = format!("{}{ARTIFACT_INFIX}", safe_stem(relative_path));
        let mut chunks = Vec::new();

        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to list staging dir: {}", self.root.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(digits) = rest.strip_suffix(ARTIFACT_EXT) else {
                continue;
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }

            let chunk = self.load(&entry.path())?;
            ensure!(
                chunk.original_file == relative_path,
                "chunk {name} belongs to {}, not {relative_path}",
                chunk.original_file
            );
            chunks.push(chunk);
        }

        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }
}
