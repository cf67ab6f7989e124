//! Line-window chunking with boundary markers.
//!
//! A file is cut into consecutive windows of at most `chunk_size` lines.
//! Every window except the first gets a `---CHUNK_START_NNNN---` line in
//! front, every window except the last a `---CHUNK_END_NNNN---` line behind.
//! The markers only tell the rewriting backend where a chunk edge is; the
//! merger strips them unconditionally.
pub mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One addressable slice of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Project-relative path of the file, `/`-separated.
    pub original_file: String,
    pub chunk_index: usize,
    /// First line covered (inclusive, 0-based).
    pub start_line: usize,
    /// Line after the last one covered (exclusive).
    pub end_line: usize,
    pub content: String,
    pub has_start_marker: bool,
    pub has_end_marker: bool,
}

impl ChunkRecord {
    /// Number of original lines this chunk covers.
    #[must_use]
    pub fn line_span(&self) -> usize {
        self.end_line - self.start_line
    }
}

/// Line terminator convention of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    /// `CrLf` as soon as one `\r\n` shows up; markers are always `\n`.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::CrLf
        } else {
            Self::Lf
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// A single file's pass through the pipeline.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub relative_path: String,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub chunks: Vec<ChunkRecord>,
    /// Whether the source ended with a line terminator.
    pub trailing_newline: bool,
    pub line_ending: LineEnding,
}

impl FileJob {
    pub fn new(
        relative_path: &str,
        source_path: PathBuf,
        output_path: PathBuf,
        text: &str,
        chunk_size: usize,
    ) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            source_path,
            output_path,
            chunks: split(relative_path, text, chunk_size),
            trailing_newline: text.ends_with('\n'),
            line_ending: LineEnding::detect(text),
        }
    }

    /// Replace the payload of one chunk with its transformed text.
    pub fn attach(&mut self, chunk_index: usize, content: String) -> bool {
        match self
            .chunks
            .iter_mut()
            .find(|c| c.chunk_index == chunk_index)
        {
            Some(chunk) => {
                chunk.content = content;
                true
            }
            None => false,
        }
    }
}

#[must_use]
pub fn start_marker(chunk_index: usize) -> String {
    format!("---CHUNK_START_{chunk_index:04}---\n")
}

#[must_use]
pub fn end_marker(chunk_index: usize) -> String {
    format!("---CHUNK_END_{chunk_index:04}---\n")
}

/// Split `text` into chunk records of at most `chunk_size` lines each.
///
/// Line terminators stay attached to their lines, so concatenating the
/// marker-free payloads reproduces `text` exactly. An empty file yields no
/// chunks. A `chunk_size` of zero is treated as one.
pub fn split(original_file: &str, text: &str, chunk_size: usize) -> Vec<ChunkRecord> {
    let chunk_size = chunk_size.max(1);
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let total = lines.len();

    lines
        .chunks(chunk_size)
        .enumerate()
        .map(|(chunk_index, window)| {
            let start_line = chunk_index * chunk_size;
            let end_line = start_line + window.len();
            let has_start_marker = start_line > 0;
            let has_end_marker = end_line < total;

            let mut content = String::new();
            if has_start_marker {
                content.push_str(&start_marker(chunk_index));
            }
            for line in window {
                content.push_str(line);
            }
            if has_end_marker {
                // A window that is not the last always ends on a terminator.
                content.push_str(&end_marker(chunk_index));
            }

            ChunkRecord {
                original_file: original_file.to_string(),
                chunk_index,
                start_line,
                end_line,
                content,
                has_start_marker,
                has_end_marker,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (0..n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn test_ten_lines_chunk_size_four() {
        let chunks = split("a.py", &numbered(10), 4);
        let ranges: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.start_line, c.end_line)).collect();
        assert_eq!(ranges, vec![(0, 4), (4, 8), (8, 10)]);

        assert!(!chunks[0].has_start_marker);
        assert!(chunks[0].has_end_marker);
        assert!(chunks[1].has_start_marker);
        assert!(chunks[1].has_end_marker);
        assert!(chunks[2].has_start_marker);
        assert!(!chunks[2].has_end_marker);

        assert!(chunks[1].content.starts_with("---CHUNK_START_0001---\n"));
        assert!(chunks[1].content.ends_with("---CHUNK_END_0001---\n"));
        assert!(chunks[0].content.ends_with("line 3\n---CHUNK_END_0000---\n"));
    }

    #[test]
    fn test_partition_tiles_file() {
        for total in [1, 2, 7, 16, 33] {
            for size in 1..=9 {
                let chunks = split("f.rs", &numbered(total), size);
                let mut expected_start = 0;
                for (i, chunk) in chunks.iter().enumerate() {
                    assert_eq!(chunk.chunk_index, i);
                    assert_eq!(chunk.start_line, expected_start);
                    assert!(chunk.end_line > chunk.start_line);
                    assert!(chunk.line_span() <= size);
                    expected_start = chunk.end_line;
                }
                assert_eq!(expected_start, total, "total={total} size={size}");
            }
        }
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        assert!(split("empty.py", "", 10).is_empty());
    }

    #[test]
    fn test_short_file_single_chunk_without_markers() {
        let chunks = split("short.py", "a = 1\nb = 2\n", 150);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "a = 1\nb = 2\n");
        assert!(!chunks[0].has_start_marker);
        assert!(!chunks[0].has_end_marker);
    }

    #[test]
    fn test_missing_final_newline_kept_in_last_chunk() {
        let chunks = split("x.js", "a\nb\nc", 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "---CHUNK_START_0001---\nc");
    }

    #[test]
    fn test_file_job_attach() {
        let mut job = FileJob::new(
            "a.py",
            PathBuf::from("/src/a.py"),
            PathBuf::from("/out/a.py"),
            "x\ny\n",
            1,
        );
        assert!(job.trailing_newline);
        assert_eq!(job.line_ending, LineEnding::Lf);
        assert!(job.attach(1, "Y\n".to_string()));
        assert!(!job.attach(7, String::new()));
        assert_eq!(job.chunks[1].content, "Y\n");
    }

    #[test]
    fn test_line_ending_detect() {
        assert_eq!(LineEnding::detect("a\nb\n"), LineEnding::Lf);
        assert_eq!(LineEnding::detect("---CHUNK_START_0001---\na\r\n"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect(""), LineEnding::Lf);
    }
}
