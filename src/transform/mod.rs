/// Transformer trait and the backends behind it.
///
/// The pipeline only sees `process(content, context) -> content`; which
/// provider answers is decided once by [`build_transformer`].
pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ProviderConfig, ProviderKind};

pub use anthropic::AnthropicBackend;
pub use mock::MockTransformer;
pub use openai::OpenAiCompatible;

/// Errors a backend can return for a single chunk.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Per-project context handed to every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformContext {
    pub source_language: String,
    pub target_language: String,
    /// Free-form project instructions.
    pub instructions: String,
}

/// A text-to-text backend.
///
/// Implementations must be `Send + Sync`; the pipeline shares one instance
/// across all in-flight chunks behind an `Arc`.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Short backend name for logs and reports.
    fn name(&self) -> &str;

    /// Transform one chunk payload.
    async fn process(&self, content: &str, ctx: &TransformContext)
    -> Result<String, TransformError>;
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, TransformError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(TransformError::Transport)
}

/// Backends answer with surrounding whitespace; only the tail is safe to drop.
pub(crate) fn trim_response(text: &str) -> String {
    text.trim_end().to_string()
}

/// Select and construct the backend described by `config`.
pub fn build_transformer(config: &ProviderConfig) -> Result<Arc<dyn Transformer>, TransformError> {
    let api_key = config.resolve_api_key().ok_or_else(|| {
        TransformError::Config(format!(
            "no API key for {}: set it in the config or export {}",
            config.kind.as_str(),
            config.kind.api_key_env()
        ))
    })?;

    let transformer: Arc<dyn Transformer> = match config.kind {
        ProviderKind::Groq | ProviderKind::Openai => {
            Arc::new(OpenAiCompatible::new(config, api_key)?)
        }
        ProviderKind::Anthropic => Arc::new(AnthropicBackend::new(config, api_key)?),
    };
    Ok(transformer)
}
