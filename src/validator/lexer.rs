/// Comment- and string-aware "code view" of a file.
///
/// The structural checks only care about code. This lexer walks the file
/// once, drops comments, and empties string literals while keeping their
/// delimiters, producing one code line per source line. Block comments,
/// triple-quoted strings and backtick strings may span lines; ordinary
/// quoted strings end at the end of their line at the latest.
use std::path::Path;

/// Which lexical forms a language family uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSyntax {
    pub hash_comments: bool,
    pub slash_comments: bool,
    pub block_comments: bool,
    pub html_comments: bool,
    pub triple_quotes: bool,
    pub backtick_strings: bool,
    pub single_quote_strings: bool,
}

impl CommentSyntax {
    const HASH: Self = Self {
        hash_comments: true,
        slash_comments: false,
        block_comments: false,
        html_comments: false,
        triple_quotes: false,
        backtick_strings: false,
        single_quote_strings: true,
    };

    const C_FAMILY: Self = Self {
        hash_comments: false,
        slash_comments: true,
        block_comments: true,
        html_comments: false,
        triple_quotes: false,
        backtick_strings: false,
        single_quote_strings: true,
    };

    /// Pick the lexical rules for a file by extension.
    #[must_use]
    pub fn for_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match ext.as_str() {
            "py" | "pyi" => Self {
                triple_quotes: true,
                ..Self::HASH
            },
            "rb" | "sh" | "bash" | "yaml" | "yml" | "toml" | "r" => Self::HASH,
            // `'a` is a lifetime far more often than a char literal.
            "rs" => Self {
                single_quote_strings: false,
                ..Self::C_FAMILY
            },
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" | "go" => Self {
                backtick_strings: true,
                ..Self::C_FAMILY
            },
            "php" => Self {
                hash_comments: true,
                ..Self::C_FAMILY
            },
            "css" => Self {
                slash_comments: false,
                ..Self::C_FAMILY
            },
            "html" | "htm" | "xml" | "vue" | "svelte" => Self {
                html_comments: true,
                backtick_strings: true,
                ..Self::C_FAMILY
            },
            "c" | "h" | "cpp" | "hpp" | "cc" | "cs" | "java" | "kt" | "swift" | "dart"
            | "scss" | "scala" => Self::C_FAMILY,
            _ => Self {
                hash_comments: true,
                ..Self::C_FAMILY
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Block(&'static str),
    Str { quote: char, triple: bool },
}

fn starts_at(chars: &[char], i: usize, pattern: &str) -> bool {
    let mut idx = i;
    for p in pattern.chars() {
        if chars.get(idx) != Some(&p) {
            return false;
        }
        idx += 1;
    }
    true
}

/// Code view of `text`: one entry per line of `text.lines()`.
#[must_use]
pub fn code_view(text: &str, syntax: CommentSyntax) -> Vec<String> {
    let mut state = State::Code;
    let mut out_lines = Vec::new();

    for line in text.lines() {
        let chars: Vec<char> = line.chars().collect();
        let mut out = String::with_capacity(line.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match state {
                State::Block(end) => {
                    if starts_at(&chars, i, end) {
                        i += end.chars().count();
                        state = State::Code;
                        out.push(' ');
                    } else {
                        i += 1;
                    }
                }
                State::Str { quote, triple } => {
                    if c == '\\' {
                        i += 2;
                    } else if triple {
                        let closing: String = [quote; 3].iter().collect();
                        if starts_at(&chars, i, &closing) {
                            out.push_str(&closing);
                            i += 3;
                            state = State::Code;
                        } else {
                            i += 1;
                        }
                    } else if c == quote {
                        out.push(c);
                        i += 1;
                        state = State::Code;
                    } else {
                        i += 1;
                    }
                }
                State::Code => {
                    if syntax.hash_comments && c == '#' {
                        break;
                    }
                    if syntax.slash_comments && starts_at(&chars, i, "//") {
                        break;
                    }
                    if syntax.block_comments && starts_at(&chars, i, "/*") {
                        state = State::Block("*/");
                        i += 2;
                        continue;
                    }
                    if syntax.html_comments && starts_at(&chars, i, "<!--") {
                        state = State::Block("-->");
                        i += 4;
                        continue;
                    }
                    let is_quote = c == '"'
                        || (c == '\'' && (syntax.single_quote_strings || syntax.triple_quotes))
                        || (c == '`' && syntax.backtick_strings);
                    if !is_quote {
                        out.push(c);
                        i += 1;
                        continue;
                    }

                    let triple = syntax.triple_quotes
                        && c != '`'
                        && chars.get(i + 1) == Some(&c)
                        && chars.get(i + 2) == Some(&c);
                    if triple {
                        out.extend([c, c, c]);
                        i += 3;
                    } else {
                        out.push(c);
                        i += 1;
                    }
                    state = State::Str { quote: c, triple };
                }
            }
        }

        // Plain quoted strings never continue onto the next line.
        if let State::Str {
            quote,
            triple: false,
        } = state
        {
            if quote != '`' {
                state = State::Code;
            }
        }

        out_lines.push(out);
    }

    out_lines
}
