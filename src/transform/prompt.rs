/// Prompt text sent to chat-style backends.
use super::TransformContext;

const PROTOCOL: &str = "\
You translate the natural-language parts of source code from {source} to {target}.
The code itself must come back unchanged.

LINE PROTOCOL
- Return exactly as many lines as you receive. Never join or split lines.
- Keep every indentation run, blank line, bracket, operator and punctuation mark.
- Keep triple-quoted docstring delimiters and comment openers where they are.

TRANSLATE
- Comments in any syntax (#, //, /* */, <!-- -->).
- Docstrings and doc comments.
- User-facing strings: UI text, log and error messages meant for people.

NEVER TRANSLATE
- Keywords, identifiers, imports, module and package names.
- Paths, URLs, SQL, regular expressions, JSON keys, format specifiers.
- String constants the program compares against or uses as keys.
- Section labels in docstrings such as Args:, Returns:, Raises:.
- Boundary markers of the form ---CHUNK_START_NNNN--- and ---CHUNK_END_NNNN---.
  Copy them byte for byte.

OUTPUT
- Only the translated code. No markdown fences, no explanations, no preamble.";

/// System prompt for one project run.
#[must_use]
pub fn system_prompt(ctx: &TransformContext) -> String {
    let mut prompt = PROTOCOL
        .replace("{source}", &ctx.source_language)
        .replace("{target}", &ctx.target_language);

    let instructions = ctx.instructions.trim();
    if !instructions.is_empty() {
        prompt.push_str("\n\nPROJECT-SPECIFIC INSTRUCTIONS\n");
        prompt.push_str(instructions);
    }
    prompt
}

/// User prompt wrapping one chunk.
#[must_use]
pub fn user_prompt(content: &str, ctx: &TransformContext) -> String {
    let lines = content.lines().count();
    format!(
        "INPUT ({lines} lines):\n{content}\n\nOUTPUT ({lines} lines required - translate {} to {}):",
        ctx.source_language, ctx.target_language
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(instructions: &str) -> TransformContext {
        TransformContext {
            source_language: "Russian".to_string(),
            target_language: "English".to_string(),
            instructions: instructions.to_string(),
        }
    }

    #[test]
    fn test_system_prompt_names_languages() {
        let prompt = system_prompt(&ctx(""));
        assert!(prompt.contains("from Russian to English"));
        assert!(!prompt.contains("PROJECT-SPECIFIC"));
    }

    #[test]
    fn test_system_prompt_appends_instructions() {
        let prompt = system_prompt(&ctx("  PRESERVE_CHINESE_CHARACTERS \n"));
        assert!(prompt.ends_with("PROJECT-SPECIFIC INSTRUCTIONS\nPRESERVE_CHINESE_CHARACTERS"));
    }

    #[test]
    fn test_user_prompt_counts_lines() {
        let prompt = user_prompt("a\nb\nc\n", &ctx(""));
        assert!(prompt.starts_with("INPUT (3 lines):\na\nb\nc\n"));
        assert!(prompt.ends_with("OUTPUT (3 lines required - translate Russian to English):"));
    }
}
