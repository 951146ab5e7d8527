//! Metrics and observability utilities
//!
//! Provides Prometheus metrics for the analysis pipeline with
//! standardized naming conventions.

use crate::model::{OperatingMode, RiskLevel, StageName};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all MedForge metrics
pub const METRICS_PREFIX: &str = "medforge";

/// Histogram buckets for end-to-end analysis latency (in seconds).
/// Analyses wait on generation calls, so the range is wide.
pub const ANALYZE_BUCKETS: &[f64] = &[
    0.010, // 10ms - fallback rules
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    20.00, // 20s
    30.00, // 30s
    60.00, // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // HTTP metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Analysis metrics
    describe_counter!(
        format!("{}_analyze_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Completed analyses by operating mode and risk level"
    );

    describe_histogram!(
        format!("{}_analyze_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end analysis latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_documents", METRICS_PREFIX),
        Unit::Count,
        "Documents in the most recent context bundle"
    );

    // Pipeline degradation
    describe_counter!(
        format!("{}_stage_degraded_total", METRICS_PREFIX),
        Unit::Count,
        "Stages that produced no findings due to a backend failure"
    );

    describe_counter!(
        format!("{}_findings_suppressed_total", METRICS_PREFIX),
        Unit::Count,
        "Findings suppressed by validation"
    );

    // Backends
    describe_counter!(
        format!("{}_backend_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Language backend calls by backend and outcome"
    );

    // Mode controller
    describe_counter!(
        format!("{}_mode_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Operating mode transitions"
    );

    describe_gauge!(
        format!("{}_operating_mode", METRICS_PREFIX),
        Unit::Count,
        "Current operating mode (0=FULL, 1=BASIC, 2=MINIMAL, 3=FALLBACK)"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a completed analysis
pub fn record_analysis(duration_secs: f64, mode: OperatingMode, risk: RiskLevel, documents: usize) {
    counter!(
        format!("{}_analyze_requests_total", METRICS_PREFIX),
        "mode" => mode.as_str(),
        "risk" => risk.as_str()
    )
    .increment(1);

    histogram!(
        format!("{}_analyze_duration_seconds", METRICS_PREFIX),
        "mode" => mode.as_str()
    )
    .record(duration_secs);

    gauge!(format!("{}_retrieval_documents", METRICS_PREFIX)).set(documents as f64);
}

pub fn record_stage_degraded(stage: StageName) {
    counter!(
        format!("{}_stage_degraded_total", METRICS_PREFIX),
        "stage" => stage.as_str()
    )
    .increment(1);
}

pub fn record_suppressed(stage: StageName) {
    counter!(
        format!("{}_findings_suppressed_total", METRICS_PREFIX),
        "stage" => stage.as_str()
    )
    .increment(1);
}

pub fn record_backend_call(backend: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        format!("{}_backend_calls_total", METRICS_PREFIX),
        "backend" => backend.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn record_mode_transition(from: OperatingMode, to: OperatingMode) {
    counter!(
        format!("{}_mode_transitions_total", METRICS_PREFIX),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);

    gauge!(format!("{}_operating_mode", METRICS_PREFIX)).set(to.as_u8() as f64);
}
