use super::{bounded, classify_status, classify_transport, GenerationRequest, LanguageBackend};
use crate::config::LocalBackendConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BACKEND_NAME: &str = "local";

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama client for on-premise models
pub struct LocalBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl LocalBackend {
    pub fn new(config: &LocalBackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    async fn call(&self, request: &GenerationRequest, timeout: Duration) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: 0.0,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
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

        let generated: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::BackendUnavailable {
                    backend: BACKEND_NAME.to_string(),
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(generated.response)
    }
}

#[async_trait]
impl LanguageBackend for LocalBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn generate(&self, request: &GenerationRequest, timeout: Duration) -> Result<String> {
        bounded(BACKEND_NAME, timeout, self.call(request, timeout)).await
    }

    async fn health(&self) -> Result<()> {
        let timeout = Duration::from_secs(2);
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
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
