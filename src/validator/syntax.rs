use anyhow::{Context, Result};
use tree_sitter::{Language, Node, Parser};

/// A bundled tree-sitter grammar and the extensions it covers.
pub struct Grammar {
    pub name: &'static str,
    pub display_name: &'static str,
    pub language: Language,
    pub extensions: &'static [&'static str],
}

impl Grammar {
    pub fn get_all() -> Vec<Grammar> {
        vec![
            Grammar {
                name: "python",
                display_name: "Python",
                language: tree_sitter_python::LANGUAGE.into(),
                extensions: &["py"],
            },
            Grammar {
                name: "rust",
                display_name: "Rust",
                language: tree_sitter_rust::LANGUAGE.into(),
                extensions: &["rs"],
            },
            Grammar {
                name: "go",
                display_name: "Go",
                language: tree_sitter_go::LANGUAGE.into(),
                extensions: &["go"],
            },
            Grammar {
                name: "javascript",
                display_name: "JavaScript",
                language: tree_sitter_javascript::LANGUAGE.into(),
                extensions: &["js", "jsx", "mjs", "cjs"],
            },
            Grammar {
                name: "typescript",
                display_name: "TypeScript",
                language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                extensions: &["ts"],
            },
            Grammar {
                name: "tsx",
                display_name: "TSX",
                language: tree_sitter_typescript::LANGUAGE_TSX.into(),
                extensions: &["tsx"],
            },
        ]
    }

    pub fn names() -> Vec<String> {
        Self::get_all()
            .into_iter()
            .map(|g| g.name.to_string())
            .collect()
    }

    pub fn get_by_extension(ext: &str) -> Option<Grammar> {
        Self::get_all()
            .into_iter()
            .find(|g| g.extensions.contains(&ext))
    }

    pub fn get_by_name(name: &str) -> Option<Grammar> {
        Self::get_all().into_iter().find(|g| g.name == name)
    }
}

/// First syntax problem found in a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

/// Parse `source` and return the first error or missing node, if any.
pub fn first_syntax_error(grammar: &Grammar, source: &str) -> Result<Option<SyntaxIssue>> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar.language)
        .with_context(|| format!("failed to load {} grammar", grammar.name))?;

    let tree = parser
        .parse(source, None)
        .context("parser returned no tree")?;

    let root = tree.root_node();
    if !root.has_error() {
        return Ok(None);
    }

    Ok(find_error(root).map(|node| describe(node, source)))
}

fn find_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_error(child) {
            return Some(found);
        }
    }
    // has_error() without a reachable error node: blame the node itself.
    Some(node)
}

fn describe(node: Node<'_>, source: &str) -> SyntaxIssue {
    let line = node.start_position().row + 1;
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let text = node.utf8_text(source.as_bytes()).unwrap_or_default();
        let snippet: String = text
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .chars()
            .take(40)
            .collect();
        if snippet.is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("invalid syntax near `{snippet}`")
        }
    };
    SyntaxIssue { line, message }
}
