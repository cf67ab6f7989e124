/// Reassembly of transformed chunks into one file.
use std::path::Path;

use thiserror::Error;

use crate::chunker::store::ChunkStore;
use crate::chunker::{ChunkRecord, LineEnding};
use crate::sanitize::scrub_markers;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("no chunks found")]
    NoChunks,

    #[error("chunk {0} is missing")]
    MissingChunk(usize),

    #[error("chunk {chunk_index} starts at line {found}, expected line {expected}")]
    LineGap {
        chunk_index: usize,
        expected: usize,
        found: usize,
    },

    #[error("failed to load chunks: {0:#}")]
    Store(anyhow::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Chunks sorted by index must tile the file: indices `0..n`, each chunk
/// starting where the previous one ended, and only the first without a
/// start marker and the last without an end marker.
fn check_complete(chunks: &[ChunkRecord]) -> Result<(), MergeError> {
    let mut expected_line = 0;
    for (position, chunk) in chunks.iter().enumerate() {
        if chunk.chunk_index != position {
            return Err(MergeError::MissingChunk(position));
        }
        if chunk.start_line != expected_line {
            return Err(MergeError::LineGap {
                chunk_index: chunk.chunk_index,
                expected: expected_line,
                found: chunk.start_line,
            });
        }
        expected_line = chunk.end_line;
    }
    match chunks.last() {
        Some(last) if last.has_end_marker => Err(MergeError::MissingChunk(last.chunk_index + 1)),
        _ => Ok(()),
    }
}

/// Concatenate `chunks` in `chunk_index` order with every marker removed.
///
/// A terminator is inserted between two chunks when the first does not end
/// with one, so chunk edges never fuse two lines. An incomplete set is an
/// error rather than a shorter file.
pub fn merge(mut chunks: Vec<ChunkRecord>, line_ending: LineEnding) -> Result<String, MergeError> {
    if chunks.is_empty() {
        return Err(MergeError::NoChunks);
    }
    chunks.sort_by_key(|c| c.chunk_index);
    check_complete(&chunks)?;

    let mut merged = String::new();
    for chunk in &chunks {
        if !merged.is_empty() && !merged.ends_with('\n') {
            merged.push_str(line_ending.as_str());
        }
        merged.push_str(&scrub_markers(&chunk.content));
    }
    Ok(merged)
}

/// Apply the source's end-of-file convention to a merged buffer.
pub fn restore_trailing_newline(
    mut merged: String,
    trailing_newline: bool,
    line_ending: LineEnding,
) -> String {
    if trailing_newline {
        if !merged.is_empty() && !merged.ends_with('\n') {
            merged.push_str(line_ending.as_str());
        }
    } else if merged.ends_with('\n') {
        merged.pop();
        if merged.ends_with('\r') {
            merged.pop();
        }
    }
    merged
}

/// Rediscover the chunks of `relative_path` in `store`, merge them and
/// write the result to `output_path`. Returns the number of chunks merged.
pub fn merge_file(
    store: &ChunkStore,
    relative_path: &str,
    output_path: &Path,
    trailing_newline: bool,
    line_ending: LineEnding,
) -> Result<usize, MergeError> {
    let chunks = store
        .load_file_chunks(relative_path)
        .map_err(MergeError::Store)?;
    let count = chunks.len();
    let merged = restore_trailing_newline(merge(chunks, line_ending)?, trailing_newline, line_ending);

    let write_err = |source| MergeError::Write {
        path: output_path.display().to_string(),
        source,
    };
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(output_path, merged).map_err(write_err)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::split;

    fn sample() -> String {
        (0..23)
            .map(|i| format!("    value_{i} = {i}  # пример\n"))
            .collect()
    }

    #[test]
    fn test_noop_roundtrip() {
        let text = sample();
        for size in [1, 4, 7, 22, 23, 100] {
            assert_eq!(merge(split("a.py", &text, size), LineEnding::Lf).unwrap(), text, "size {size}");
        }
    }

    #[test]
    fn test_roundtrip_without_final_newline() {
        let text = "a\nb\nc";
        assert_eq!(merge(split("a.txt", text, 2), LineEnding::Lf).unwrap(), text);
    }

    #[test]
    fn test_merge_resorts_chunks() {
        let text = sample();
        let mut chunks = split("a.py", &text, 5);
        chunks.reverse();
        assert_eq!(merge(chunks, LineEnding::Lf).unwrap(), text);
    }

    #[test]
    fn test_no_chunks() {
        assert!(matches!(merge(Vec::new(), LineEnding::Lf), Err(MergeError::NoChunks)));
    }

    #[test]
    fn test_newline_inserted_between_chunks() {
        let mut chunks = split("a.py", "a\nb\nc\nd\n", 2);
        chunks[0].content = "A\nB\n---CHUNK_END_0000---".to_string();
        chunks[1].content = "---CHUNK_START_0001---\nC\nD".to_string();
        assert_eq!(merge(chunks, LineEnding::Lf).unwrap(), "A\nB\nC\nD");
    }

    #[test]
    fn test_relocated_marker_scrubbed() {
        let mut chunks = split("a.py", "a\nb\n", 1);
        chunks[0].content = "a\n---CHUNK_START_0001---\n".to_string();
        chunks[1].content = "b\n---CHUNK_END_0000---\n".to_string();
        assert_eq!(merge(chunks, LineEnding::Lf).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_restore_trailing_newline() {
        assert_eq!(restore_trailing_newline("a\nb".to_string(), true, LineEnding::Lf), "a\nb\n");
        assert_eq!(restore_trailing_newline("a\nb\n".to_string(), false, LineEnding::Lf), "a\nb");
        assert_eq!(restore_trailing_newline("a\n".to_string(), true, LineEnding::Lf), "a\n");
        assert_eq!(restore_trailing_newline(String::new(), true, LineEnding::Lf), "");
    }

    #[test]
    fn test_merge_file_writes_output() {
        let temp = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(temp.path().join("translated")).unwrap();
        let text = sample();
        store.save_all(&split("src/m.py", &text, 6)).unwrap();

        let out = temp.path().join("out/src/m.py");
        let count = merge_file(&store, "src/m.py", &out, true, LineEnding::Lf).unwrap();

        assert_eq!(count, 4);
        assert_eq!(std::fs::read_to_string(out).unwrap(), text);
    }

    #[test]
    fn test_merge_file_missing_chunks() {
        let temp = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(temp.path()).unwrap();
        let result = merge_file(&store, "gone.py", &temp.path().join("gone.py"), true, LineEnding::Lf);
        assert!(matches!(result, Err(MergeError::NoChunks)));
    }

    #[test]
    fn test_restore_trailing_crlf() {
        assert_eq!(
            restore_trailing_newline("a\r\nb".to_string(), true, LineEnding::CrLf),
            "a\r\nb\r\n"
        );
        assert_eq!(
            restore_trailing_newline("a\r\nb\r\n".to_string(), false, LineEnding::CrLf),
            "a\r\nb"
        );
    }

    #[test]
    fn test_crlf_chunks_joined_with_crlf() {
        let mut chunks = split("a.py", "a\r\nb\r\nc\r\n", 1);
        // Accepted chunks come back from the guard without a final terminator.
        chunks[0].content = "A\r\n---CHUNK_END_0000---".to_string();
        chunks[1].content = "---CHUNK_START_0001---\r\nB\r\n---CHUNK_END_0001---".to_string();
        let merged = merge(chunks, LineEnding::CrLf).unwrap();
        assert_eq!(
            restore_trailing_newline(merged, true, LineEnding::CrLf),
            "A\r\nB\r\nc\r\n"
        );
    }

    #[test]
    fn test_missing_middle_chunk_rejected() {
        let mut chunks = split("a.py", &sample(), 5);
        chunks.remove(2);
        assert!(matches!(
            merge(chunks, LineEnding::Lf),
            Err(MergeError::MissingChunk(2))
        ));
    }

    #[test]
    fn test_missing_last_chunk_rejected() {
        let mut chunks = split("a.py", &sample(), 5);
        let last = chunks.pop().unwrap();
        assert!(matches!(
            merge(chunks, LineEnding::Lf),
            Err(MergeError::MissingChunk(i)) if i == last.chunk_index
        ));
    }

    #[test]
    fn test_line_gap_rejected() {
        let mut chunks = split("a.py", &sample(), 5);
        chunks[1].start_line += 1;
        assert!(matches!(
            merge(chunks, LineEnding::Lf),
            Err(MergeError::LineGap {
                chunk_index: 1,
                expected: 5,
                found: 6
            })
        ));
    }

    #[test]
    fn test_merge_file_corrupt_chunk_fails() {
        let temp = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(temp.path().join("translated")).unwrap();
        let text: String = (0..9).map(|i| format!("v{i} = {i}\n")).collect();
        store.save_all(&split("m.py", &text, 3)).unwrap();
        std::fs::write(store.path_for("m.py", 1), "{ truncated").unwrap();

        let out = temp.path().join("out/m.py");
        let result = merge_file(&store, "m.py", &out, true, LineEnding::Lf);
        assert!(matches!(result, Err(MergeError::Store(_))));
        assert!(!out.exists());
    }
}
