/// Cleanup of transport artifacts in backend output.
///
/// Two passes live here: `sanitize` removes a markdown fence wrapped around
/// the whole output, `scrub_markers` removes chunk boundary markers wherever
/// they ended up. Both are idempotent.
use std::sync::LazyLock;

use regex::Regex;

static FENCE_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[\w.+#-]*\s*$").unwrap());

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"---CHUNK_(?:START|END)_\d+---(?:\r?\n)?").unwrap());

fn is_fence_closer(line: &str) -> bool {
    line.trim() == "```"
}

fn strip_one_fence(text: &str) -> Option<String> {
    let mut changed = false;
    let mut body = text;

    let first_end = body.find('\n');
    let first_line = first_end.map_or(body, |idx| &body[..idx]);
    if let Some(idx) = first_end {
        if FENCE_OPENER.is_match(first_line) {
            body = &body[idx + 1..];
            changed = true;
        }
    }

    let trimmed = body.trim_end();
    if let Some(idx) = trimmed.rfind('\n') {
        if is_fence_closer(&trimmed[idx + 1..]) {
            body = &trimmed[..idx];
            changed = true;
        }
    }

    changed.then(|| body.to_string())
}

/// Strip a leading fence opener line and a trailing fence closer line.
///
/// Stripping repeats until no wrapper is left, so a backend that nests
/// fences is fully unwrapped and a second call is a no-op.
#[must_use]
pub fn sanitize(raw_output: &str) -> String {
    let mut current = raw_output.to_string();
    while let Some(next) = strip_one_fence(&current) {
        current = next;
    }
    current
}

/// Remove every boundary marker (and the newline right after it).
#[must_use]
pub fn scrub_markers(content: &str) -> String {
    let mut current = MARKER.replace_all(content, "").into_owned();
    // Removal can splice two halves into a new marker.
    while MARKER.is_match(&current) {
        current = MARKER.replace_all(&current, "").into_owned();
    }
    current
}
