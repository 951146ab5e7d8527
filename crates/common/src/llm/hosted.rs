use super::{bounded, classify_status, classify_transport, GenerationRequest, LanguageBackend};
use crate::config::HostedBackendConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BACKEND_NAME: &str = "hosted";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// OpenAI-compatible chat completions client
pub struct HostedBackend {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
}

impl HostedBackend {
    pub fn new(config: &HostedBackendConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "hosted backend requires an API key".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn call(&self, request: &GenerationRequest, timeout: Duration) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(BACKEND_NAME, timeout, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(BACKEND_NAME, status, &text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::BackendUnavailable {
                backend: BACKEND_NAME.to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::BackendUnavailable {
                backend: BACKEND_NAME.to_string(),
                message: "Empty response".to_string(),
            })
    }
}

#[async_trait]
impl LanguageBackend for HostedBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn generate(&self, request: &GenerationRequest, timeout: Duration) -> Result<String> {
        bounded(BACKEND_NAME, timeout, self.call(request, timeout)).await
    }

    async fn health(&self) -> Result<()> {
        let timeout = Duration::from_secs(5);
        let response = self
            .client
            .get(format!("{}/models", self.api_base))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport(BACKEND_NAME, timeout, e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            Err(classify_status(BACKEND_NAME, status, ""))
        }
    }
}
