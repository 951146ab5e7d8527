use super::{bounded, GenerationRequest, LanguageBackend};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Failure a scripted backend can be told to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Timeout,
    Unavailable,
    RateLimited,
}

/// Deterministic backend answering from a fixed script.
///
/// The first rule whose marker occurs in the system text or prompt wins.
/// Used by tests and by offline deployments that replay recorded answers.
pub struct ScriptedBackend {
    name: String,
    rules: Vec<(String, String)>,
    default_response: Option<String>,
    latency: Option<Duration>,
    failure: Mutex<Option<ScriptedFailure>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            default_response: None,
            latency: None,
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn respond_to(mut self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((marker.into(), response.into()));
        self
    }

    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default_response = Some(response.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn failing(self, failure: ScriptedFailure) -> Self {
        self.set_failure(Some(failure));
        self
    }

    /// Switch failure injection on or off at runtime
    pub fn set_failure(&self, failure: Option<ScriptedFailure>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = failure;
    }

    /// Number of `generate` calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn current_failure(&self) -> Option<ScriptedFailure> {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn failure_error(&self, failure: ScriptedFailure, timeout: Duration) -> AppError {
        match failure {
            ScriptedFailure::Timeout => AppError::BackendTimeout {
                backend: self.name.clone(),
                timeout_ms: timeout.as_millis() as u64,
            },
            ScriptedFailure::Unavailable => AppError::BackendUnavailable {
                backend: self.name.clone(),
                message: "scripted outage".to_string(),
            },
            ScriptedFailure::RateLimited => AppError::BackendRateLimited {
                backend: self.name.clone(),
            },
        }
    }

    fn respond(&self, request: &GenerationRequest) -> Result<String> {
        self.rules
            .iter()
            .find(|(marker, _)| request.system.contains(marker) || request.prompt.contains(marker))
            .map(|(_, response)| response.clone())
            .or_else(|| self.default_response.clone())
            .ok_or_else(|| AppError::BackendUnavailable {
                backend: self.name.clone(),
                message: "no scripted response for request".to_string(),
            })
    }
}

#[async_trait]
impl LanguageBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest, timeout: Duration) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.prompt.clone());

        if let Some(failure) = self.current_failure() {
            return Err(self.failure_error(failure, timeout));
        }

        let latency = self.latency;
        bounded(&self.name, timeout, async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            self.respond(request)
        })
        .await
    }

    async fn health(&self) -> Result<()> {
        match self.current_failure() {
            Some(failure) => Err(self.failure_error(failure, Duration::ZERO)),
            None => Ok(()),
        }
    }
}
