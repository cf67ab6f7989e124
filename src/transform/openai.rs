/// Chat-completions backend (OpenAI wire format, also served by Groq).
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{TransformContext, TransformError, Transformer, http_client, prompt, trim_response};
use crate::config::ProviderConfig;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatible {
    name: String,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatible {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, TransformError> {
        if api_key.is_empty() {
            return Err(TransformError::Config("API key is required".to_string()));
        }
        Ok(Self {
            name: config.kind.as_str().to_string(),
            client: http_client(config.timeout_secs)?,
            api_key,
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request<'a>(&'a self, content: &str, ctx: &TransformContext) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::system_prompt(ctx),
                },
                ChatMessage {
                    role: "user",
                    content: prompt::user_prompt(content, ctx),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn extract_content(response: ChatResponse) -> Result<String, TransformError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| trim_response(&text))
        .ok_or_else(|| TransformError::MalformedResponse("no message content in choices".to_string()))
}

#[async_trait]
impl Transformer for OpenAiCompatible {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(
        &self,
        content: &str,
        ctx: &TransformContext,
    ) -> Result<String, TransformError> {
        debug!("{}: sending {} lines to {}", self.name, content.lines().count(), self.model);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request(content, ctx))
            .send()
            .await
            .map_err(|e| {
                error!("{} request failed: {e}", self.name);
                TransformError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} API error ({status}): {body}", self.name);
            return Err(TransformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TransformError::MalformedResponse(e.to_string()))?;
        extract_content(parsed)
    }
}
