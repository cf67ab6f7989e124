/// Structural fingerprint and bracket accounting over a code view.
///
/// The fingerprint of a line keeps every ASCII punctuation character
/// verbatim (decorators, sigils and preprocessor `#` included), collapses
/// each identifier run to its first character and each whitespace run to
/// one space. Other characters are dropped. Lines whose fingerprint is
/// empty (blank, comment-only, inside a docstring) are left out.

pub const BRACKETS: [char; 6] = ['(', ')', '[', ']', '{', '}'];

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[must_use]
pub fn line_fingerprint(code: &str) -> String {
    let mut out = String::new();
    let mut in_ident = false;

    for c in code.trim().chars() {
        if is_ident_char(c) {
            if !in_ident {
                out.push(c);
                in_ident = true;
            }
            continue;
        }
        in_ident = false;
        if c.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
        } else if c.is_ascii_punctuation() {
            out.push(c);
        }
    }

    out.trim_end().to_string()
}

/// One fingerprinted line: 0-based source line number and its skeleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonLine {
    pub line: usize,
    pub shape: String,
}

#[must_use]
pub fn fingerprint(code_lines: &[String]) -> Vec<SkeletonLine> {
    code_lines
        .iter()
        .enumerate()
        .filter_map(|(line, code)| {
            let shape = line_fingerprint(code);
            (!shape.is_empty()).then_some(SkeletonLine { line, shape })
        })
        .collect()
}

/// Two skeletons are equal when their shapes match in order; line numbers
/// may shift without counting as a structural change.
#[must_use]
pub fn same_shape(a: &[SkeletonLine], b: &[SkeletonLine]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.shape == y.shape)
}

/// Counts of `( ) [ ] { }` in that order.
#[must_use]
pub fn bracket_counts(code_lines: &[String]) -> [usize; 6] {
    let mut counts = [0usize; 6];
    for line in code_lines {
        for c in line.chars() {
            if let Some(pos) = BRACKETS.iter().position(|b| *b == c) {
                counts[pos] += 1;
            }
        }
    }
    counts
}

/// Human-readable per-bracket deltas, e.g. `(: 4->3`.
#[must_use]
pub fn bracket_diff(original: &[usize; 6], merged: &[usize; 6]) -> Vec<String> {
    BRACKETS
        .iter()
        .zip(original.iter().zip(merged.iter()))
        .filter(|(_, (o, m))| o != m)
        .map(|(b, (o, m))| format!("{b}: {o}->{m}"))
        .collect()
}

/// Explain a skeleton mismatch: bracket deltas plus the first diverging line.
#[must_use]
pub fn describe_difference(
    original_code: &[String],
    merged_code: &[String],
    original: &[SkeletonLine],
    merged: &[SkeletonLine],
) -> String {
    let diffs = bracket_diff(
        &bracket_counts(original_code),
        &bracket_counts(merged_code),
    );
    let mut text = if diffs.is_empty() {
        "unknown structural change".to_string()
    } else {
        diffs.join("; ")
    };

    let divergence = original
        .iter()
        .zip(merged)
        .find(|(o, m)| o.shape != m.shape)
        .map(|(o, m)| {
            format!(
                "first difference at line {} (`{}` vs `{}`)",
                o.line + 1,
                o.shape,
                m.shape
            )
        })
        .or_else(|| match original.len().cmp(&merged.len()) {
            std::cmp::Ordering::Greater => Some(format!(
                "{} structural lines missing",
                original.len() - merged.len()
            )),
            std::cmp::Ordering::Less => Some(format!(
                "{} structural lines added",
                merged.len() - original.len()
            )),
            std::cmp::Ordering::Equal => None,
        });

    if let Some(divergence) = divergence {
        text.push_str(" (");
        text.push_str(&divergence);
        text.push(')');
    }
    text
}
