//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::AppState;
use medforge_common::{errors::Result, model::OperatingMode};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub mode: OperatingMode,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub knowledge_store: CheckResult,
    pub ontology: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: medforge_common::VERSION.to_string(),
    })
}

/// Readiness probe - checks the knowledge collaborators.
///
/// The service still answers when they are down (at a lower mode), so this
/// reports `degraded` rather than failing.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let timeout = state.config.pipeline.timeouts.probe();
    let knowledge_store = check(timeout, state.store.ping()).await;
    let ontology = check(timeout, state.ontology.ping()).await;

    let status = if knowledge_store.is_up() && ontology.is_up() {
        "ready"
    } else {
        "degraded"
    };

    Json(ReadyResponse {
        status: status.to_string(),
        mode: state.analyzer.mode().current(),
        checks: HealthChecks {
            knowledge_store,
            ontology,
        },
    })
}

async fn check(timeout: Duration, ping: impl Future<Output = Result<()>>) -> CheckResult {
    let start = Instant::now();
    match tokio::time::timeout(timeout, ping).await {
        Ok(Ok(())) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Ok(Err(e)) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
        Err(_) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(format!("no answer within {}ms", timeout.as_millis())),
        },
    }
}
