/// Preservation / translation checks for a Unicode script range.
///
/// A rule is switched on by a keyword in the project instructions:
/// the preserve keyword demands that the characters survive untouched,
/// the translate keyword demands that none of the original ones remain.
use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

static HTML_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ScriptRule {
    /// Name used in diagnostics, e.g. "Chinese".
    pub name: String,
    /// Regex matching a single character of the script.
    pub pattern: String,
    pub preserve_keyword: String,
    pub translate_keyword: String,
}

impl ScriptRule {
    #[must_use]
    pub fn chinese() -> Self {
        Self {
            name: "Chinese".to_string(),
            pattern: r"[\x{4E00}-\x{9FFF}]".to_string(),
            preserve_keyword: "PRESERVE_CHINESE_CHARACTERS".to_string(),
            translate_keyword: "TRANSLATE_CHINESE_CHARACTERS".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPolicy {
    Preserve,
    Translate,
}

/// Strip commented-out template text so disabled keywords stay disabled.
fn active_instructions(instructions: &str) -> String {
    HTML_COMMENT.replace_all(instructions, "").into_owned()
}

/// Resolve the policy a rule gets under `instructions`. Preserve wins when
/// both keywords are present.
#[must_use]
pub fn resolve_policy(rule: &ScriptRule, instructions: &str) -> Option<ScriptPolicy> {
    let active = active_instructions(instructions);
    if !rule.preserve_keyword.is_empty() && active.contains(&rule.preserve_keyword) {
        Some(ScriptPolicy::Preserve)
    } else if !rule.translate_keyword.is_empty() && active.contains(&rule.translate_keyword) {
        Some(ScriptPolicy::Translate)
    } else {
        None
    }
}

/// A rule whose policy is active, ready to run.
#[derive(Debug, Clone)]
pub struct ScriptCheck {
    name: String,
    matcher: Regex,
    policy: ScriptPolicy,
}

impl ScriptCheck {
    /// Build the checks that are active under `instructions`.
    pub fn active(rules: &[ScriptRule], instructions: &str) -> Result<Vec<ScriptCheck>> {
        let mut checks = Vec::new();
        for rule in rules {
            let Some(policy) = resolve_policy(rule, instructions) else {
                continue;
            };
            let matcher = Regex::new(&rule.pattern)
                .with_context(|| format!("invalid pattern for script {}", rule.name))?;
            checks.push(ScriptCheck {
                name: rule.name.clone(),
                matcher,
                policy,
            });
        }
        Ok(checks)
    }

    #[must_use]
    pub fn policy(&self) -> ScriptPolicy {
        self.policy
    }

    fn collect(&self, text: &str) -> BTreeSet<char> {
        self.matcher
            .find_iter(text)
            .flat_map(|m| m.as_str().chars())
            .collect()
    }

    /// Diagnostics for this script; empty when the policy holds.
    #[must_use]
    pub fn check(&self, original: &str, merged: &str) -> Vec<String> {
        let before = self.collect(original);
        let after = self.collect(merged);
        let join = |set: BTreeSet<&char>| set.into_iter().collect::<String>();
        let mut errors = Vec::new();

        match self.policy {
            ScriptPolicy::Preserve => {
                let lost: BTreeSet<&char> = before.difference(&after).collect();
                if !lost.is_empty() {
                    errors.push(format!(
                        "Lost {} characters (should be preserved): {}",
                        self.name,
                        join(lost)
                    ));
                }
                let new: BTreeSet<&char> = after.difference(&before).collect();
                if !new.is_empty() {
                    errors.push(format!(
                        "New {} characters appeared: {}",
                        self.name,
                        join(new)
                    ));
                }
            }
            ScriptPolicy::Translate => {
                let remaining: BTreeSet<&char> = before.intersection(&after).collect();
                if !remaining.is_empty() {
                    errors.push(format!(
                        "{} characters not translated: {}",
                        self.name,
                        join(remaining)
                    ));
                }
            }
        }

        errors
    }
}
