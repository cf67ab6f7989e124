/// Messages-API backend.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{TransformContext, TransformError, Transformer, http_client, prompt, trim_response};
use crate::config::ProviderConfig;

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicBackend {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, TransformError> {
        if api_key.is_empty() {
            return Err(TransformError::Config(
                "Anthropic API key is required".to_string(),
            ));
        }
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request<'a>(&'a self, content: &str, ctx: &TransformContext) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: prompt::system_prompt(ctx),
            messages: vec![Message {
                role: "user",
                content: prompt::user_prompt(content, ctx),
            }],
        }
    }
}

fn extract_text(response: MessagesResponse) -> Result<String, TransformError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(TransformError::MalformedResponse(
            "no text block in response".to_string(),
        ));
    }
    Ok(trim_response(&text))
}

#[async_trait]
impl Transformer for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn process(
        &self,
        content: &str,
        ctx: &TransformContext,
    ) -> Result<String, TransformError> {
        debug!("anthropic: sending {} lines to {}", content.lines().count(), self.model);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request(content, ctx))
            .send()
            .await
            .map_err(|e| {
                error!("Anthropic request failed: {e}");
                TransformError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Anthropic API error ({status}): {body}");
            return Err(TransformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| TransformError::MalformedResponse(e.to_string()))?;
        extract_text(parsed)
    }
}
