/// Configuration module for TransLLM.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::guard::GuardConfig;
use crate::validator::ValidationConfig;

pub const DEFAULT_CONFIG_PATH: &str = "transllm_config.json";

// ── Default value functions ──────────────────────────────────────────

fn default_source_language() -> String {
    "Russian".to_string()
}

fn default_target_language() -> String {
    "English".to_string()
}

fn default_chunk_size() -> usize {
    150
}

fn default_max_concurrent() -> usize {
    10
}

fn default_output_suffix() -> String {
    "_translated".to_string()
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_supported_extensions() -> Vec<String> {
    to_strings(&[
        ".py", ".js", ".ts", ".jsx", ".tsx", ".html", ".css", ".scss", ".java", ".cpp", ".c",
        ".h", ".cs", ".php", ".rb", ".go", ".rs", ".swift", ".kt", ".dart", ".vue", ".svelte",
    ])
}

fn default_exclude_dirs() -> Vec<String> {
    to_strings(&[
        "node_modules",
        "__pycache__",
        ".git",
        ".svn",
        ".hg",
        "venv",
        "env",
        ".env",
        "dist",
        "build",
        ".next",
        "target",
        "bin",
        "obj",
        ".pytest_cache",
        ".mypy_cache",
    ])
}

fn default_exclude_files() -> Vec<String> {
    to_strings(&[
        "README.md",
        "LICENSE",
        "CHANGELOG.md",
        "requirements.txt",
        "package.json",
        "package-lock.json",
        "yarn.lock",
        ".gitignore",
        ".dockerignore",
        "Dockerfile",
    ])
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    120
}

// ── Config structs ───────────────────────────────────────────────────

/// Backend family.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Groq,
    Openai,
    Anthropic,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Environment variable consulted when no API key is configured.
    #[must_use]
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::Openai => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Groq => "openai/gpt-oss-120b",
            Self::Openai => "gpt-4o",
            Self::Anthropic => "claude-3-5-sonnet-latest",
        }
    }

    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Openai => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_source_language")]
    pub source_language: String,

    #[serde(default = "default_target_language")]
    pub target_language: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    #[serde(default)]
    pub custom_instructions: String,

    /// Extra instructions read from a file (e.g. `user_rules.md`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_file: Option<String>,

    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,

    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// File name globs that are copied verbatim instead of translated.
    #[serde(default = "default_exclude_files")]
    pub exclude_files: Vec<String>,

    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub guard: GuardConfig,

    #[serde(default)]
    pub validation: ValidationConfig,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            source_language: default_source_language(),
            target_language: default_target_language(),
            chunk_size: default_chunk_size(),
            max_concurrent_requests: default_max_concurrent(),
            custom_instructions: String::new(),
            instructions_file: None,
            supported_extensions: default_supported_extensions(),
            exclude_dirs: default_exclude_dirs(),
            exclude_files: default_exclude_files(),
            output_suffix: default_output_suffix(),
            provider: ProviderConfig::default(),
            guard: GuardConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_key: None,
            model_name: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl ProviderConfig {
    #[must_use]
    pub fn model(&self) -> &str {
        self.model_name
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.kind.default_model())
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.kind.default_base_url())
            .trim_end_matches('/')
    }

    /// Configured key, else the provider's environment variable.
    ///
    /// The template placeholder counts as unset.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty() && k != "YOUR_API_KEY_HERE")
            .or_else(|| std::env::var(self.kind.api_key_env()).ok())
            .filter(|k| !k.is_empty())
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_PATH`].
    /// If the file does not exist, returns a default config and generates a
    /// template at the default path.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.max_concurrent_requests > 0,
            "max_concurrent_requests must be positive"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.guard.drift_ratio),
            "guard.drift_ratio must be within [0, 1]"
        );
        anyhow::ensure!(
            !self.supported_extensions.is_empty(),
            "at least one supported extension must be specified"
        );
        anyhow::ensure!(
            !self.output_suffix.is_empty(),
            "output_suffix must not be empty"
        );
        for rule in &self.validation.scripts {
            regex::Regex::new(&rule.pattern)
                .with_context(|| format!("invalid pattern for script {}", rule.name))?;
        }
        Ok(())
    }

    /// Custom instructions plus the contents of `instructions_file`, if any.
    pub fn instructions(&self) -> Result<String> {
        let mut text = self.custom_instructions.trim().to_string();
        if let Some(file) = self.instructions_file.as_deref().filter(|f| !f.is_empty()) {
            let extra = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read instructions: {file}"))?;
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(extra.trim());
        }
        Ok(text)
    }

    /// Whether a file extension (with leading dot) is translated.
    #[must_use]
    pub fn is_supported_extension(&self, ext: &str) -> bool {
        self.supported_extensions
            .iter()
            .any(|e| e.trim_start_matches('.') == ext.trim_start_matches('.'))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 150);
        assert_eq!(config.max_concurrent_requests, 10);
        assert_eq!(config.source_language, "Russian");
        assert_eq!(config.target_language, "English");
        assert_eq!(config.provider.kind, ProviderKind::Groq);
        assert_eq!(config.guard.min_drift_lines, 10);
        assert!((config.guard.drift_ratio - 0.15).abs() < f64::EPSILON);
        assert_eq!(config.output_suffix, "_translated");
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"chunk_size": 40, "provider": {"kind": "anthropic", "max_tokens": 1024}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chunk_size, 40);
        assert_eq!(config.provider.kind, ProviderKind::Anthropic);
        assert_eq!(config.provider.max_tokens, 1024);
        // Other fields should have defaults
        assert_eq!(config.max_concurrent_requests, 10);
        assert_eq!(config.provider.timeout_secs, 120);
        assert!(!config.validation.scripts.is_empty());
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_chunk_size() {
        let mut config = Config::default();
        config.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_concurrency() {
        let mut config = Config::default();
        config.max_concurrent_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_script_pattern() {
        let mut config = Config::default();
        config.validation.scripts[0].pattern = "[unclosed".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_defaults() {
        let provider = ProviderConfig {
            kind: ProviderKind::Openai,
            base_url: Some("http://localhost:8080/v1/".to_string()),
            ..ProviderConfig::default()
        };
        assert_eq!(provider.model(), "gpt-4o");
        assert_eq!(provider.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_configured_key_wins() {
        let provider = ProviderConfig {
            kind: ProviderKind::Groq,
            api_key: Some("sk-test".to_string()),
            ..ProviderConfig::default()
        };
        assert_eq!(provider.resolve_api_key().as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_supported_extension_with_or_without_dot() {
        let config = Config::default();
        assert!(config.is_supported_extension("py"));
        assert!(config.is_supported_extension(".rs"));
        assert!(!config.is_supported_extension("md"));
    }

    #[test]
    fn test_instructions_file_appended() {
        let temp = tempfile::tempdir().unwrap();
        let rules = temp.path().join("user_rules.md");
        std::fs::write(&rules, "PRESERVE_CHINESE_CHARACTERS\n").unwrap();

        let config = Config {
            custom_instructions: "Formal tone.".to_string(),
            instructions_file: Some(rules.to_string_lossy().to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.instructions().unwrap(),
            "Formal tone.\n\nPRESERVE_CHINESE_CHARACTERS"
        );
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.chunk_size, config.chunk_size);
        assert_eq!(parsed.exclude_dirs, config.exclude_dirs);
        assert_eq!(parsed.guard, config.guard);
    }
}
