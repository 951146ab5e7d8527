//! Language backend abstraction
//!
//! Provides:
//! - `LanguageBackend` trait shared by every text-generation provider
//! - `HostedBackend`: OpenAI-compatible chat completions (high capability)
//! - `LocalBackend`: Ollama generate API (lower capability, on-premise)
//! - `ScriptedBackend`: deterministic responses for tests and offline demos
//! - Timeout and HTTP error classification into backend failure kinds

mod hosted;
mod local;
mod scripted;

pub use hosted::HostedBackend;
pub use local::LocalBackend;
pub use scripted::{ScriptedBackend, ScriptedFailure};

use crate::config::BackendsConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One generation call
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Role and output-format instructions
    pub system: String,

    /// Case, context and task
    pub prompt: String,

    /// Output token cap
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

/// Trait for text generation providers.
///
/// Implementations fail with `BackendTimeout`, `BackendUnavailable` or
/// `BackendRateLimited`; callers treat all three as health signals.
#[async_trait]
pub trait LanguageBackend: Send + Sync {
    /// Short identifier used in logs, metrics and errors
    fn name(&self) -> &str;

    /// Generate text, giving up after `timeout`
    async fn generate(&self, request: &GenerationRequest, timeout: Duration) -> Result<String>;

    /// Cheap reachability check used by the health probe
    async fn health(&self) -> Result<()>;
}

/// The configured primary and secondary backends
#[derive(Clone, Default)]
pub struct BackendSet {
    pub primary: Option<Arc<dyn LanguageBackend>>,
    pub secondary: Option<Arc<dyn LanguageBackend>>,
}

impl BackendSet {
    pub fn new(
        primary: Option<Arc<dyn LanguageBackend>>,
        secondary: Option<Arc<dyn LanguageBackend>>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// Build the HTTP-backed set from configuration
    pub fn from_config(config: &BackendsConfig) -> Result<Self> {
        let primary: Option<Arc<dyn LanguageBackend>> = if config.primary.enabled {
            Some(Arc::new(HostedBackend::new(&config.primary)?))
        } else {
            None
        };

        let secondary: Option<Arc<dyn LanguageBackend>> = if config.secondary.enabled {
            Some(Arc::new(LocalBackend::new(&config.secondary)?))
        } else {
            None
        };

        Ok(Self { primary, secondary })
    }
}

/// Run `fut`, mapping an elapsed deadline to `BackendTimeout`
pub async fn bounded<T, F>(backend: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::BackendTimeout {
            backend: backend.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Map a transport error to the backend failure taxonomy
pub(crate) fn classify_transport(backend: &str, timeout: Duration, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::BackendTimeout {
            backend: backend.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        AppError::BackendUnavailable {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }
}

/// Map a non-success HTTP status to the backend failure taxonomy
pub(crate) fn classify_status(backend: &str, status: reqwest::StatusCode, body: &str) -> AppError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        AppError::BackendRateLimited {
            backend: backend.to_string(),
        }
    } else {
        let snippet: String = body.chars().take(200).collect();
        AppError::BackendUnavailable {
            backend: backend.to_string(),
            message: format!("HTTP {}: {}", status, snippet),
        }
    }
}
