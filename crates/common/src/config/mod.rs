//! Configuration management for MedForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Every tunable of the pipeline (thresholds, weights, caps, budgets,
//! timeouts) lives here so deployments can adjust them without code changes.

use crate::errors::{AppError, Result};
use crate::model::{RiskLevel, SourceCategory};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Language backend configuration
    #[serde(default)]
    pub backends: BackendsConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Knowledge store seeding
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Pipeline tunables
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendsConfig {
    /// Hosted, high-capability backend (OpenAI-compatible chat API)
    #[serde(default)]
    pub primary: HostedBackendConfig,

    /// Local, lower-capability fallback backend (Ollama API)
    #[serde(default)]
    pub secondary: LocalBackendConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostedBackendConfig {
    /// Whether the hosted backend is configured at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// API key; required when enabled
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_hosted_api_base")]
    pub api_base: String,

    /// Chat model name
    #[serde(default = "default_hosted_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for HostedBackendConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            api_key: None,
            api_base: default_hosted_api_base(),
            model: default_hosted_model(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalBackendConfig {
    /// Whether the local backend is configured
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Ollama base URL
    #[serde(default = "default_local_base_url")]
    pub base_url: String,

    /// Local model name
    #[serde(default = "default_local_model")]
    pub model: String,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_local_base_url(),
            model: default_local_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KnowledgeConfig {
    /// JSON file of documents loaded into the store at startup
    pub seed_path: Option<String>,

    /// JSON file of extra ontology concepts merged over the built-in vocabulary
    pub ontology_path: Option<String>,
}

/// Pipeline tunables, grouped per component
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub linking: LinkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub mode: ModeConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Entities scoring below this are kept but flagged low-confidence
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Longest accepted case text, in characters
    #[serde(default = "default_max_case_chars")]
    pub max_case_chars: usize,

    /// Max distance (chars) between a dosage and the medication it belongs to
    #[serde(default = "default_dosage_link_window")]
    pub dosage_link_window: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_case_chars: default_max_case_chars(),
            dosage_link_window: default_dosage_link_window(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkingConfig {
    /// Candidates kept per entity
    #[serde(default = "default_link_top_k")]
    pub top_k: usize,

    /// Weight of lexical similarity in the composite score
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    /// Weight of ontology frequency in the composite score
    #[serde(default = "default_frequency_weight")]
    pub frequency_weight: f32,

    /// Candidates below this lexical similarity are discarded
    #[serde(default = "default_min_lexical_similarity")]
    pub min_lexical_similarity: f32,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            top_k: default_link_top_k(),
            lexical_weight: default_lexical_weight(),
            frequency_weight: default_frequency_weight(),
            min_lexical_similarity: default_min_lexical_similarity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Final number of documents after diversity filtering (K)
    #[serde(default = "default_retrieval_top_k")]
    pub top_k: usize,

    /// Max documents per source category in the final set (N)
    #[serde(default = "default_per_category_cap")]
    pub per_category_cap: usize,

    /// Candidates fetched by the whole-text query
    #[serde(default = "default_text_query_k")]
    pub text_query_k: usize,

    /// Candidates fetched per concept query
    #[serde(default = "default_concept_query_k")]
    pub concept_query_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_retrieval_top_k(),
            per_category_cap: default_per_category_cap(),
            text_query_k: default_text_query_k(),
            concept_query_k: default_concept_query_k(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Token budget for the assembled bundle
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Characters per token used by the estimator
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,

    /// Excerpt length kept per document
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            chars_per_token: default_chars_per_token(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentsConfig {
    /// Token cap per backend generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Differentials kept after ranking
    #[serde(default = "default_max_differentials")]
    pub max_differentials: usize,

    /// Retries per failed backend call (clamped to at most one)
    #[serde(default)]
    pub max_backend_retries: u32,

    /// Confidence assumed when the backend reports none
    #[serde(default = "default_backend_confidence")]
    pub default_backend_confidence: f32,

    /// Backend-confidence component for findings derived from structured data
    #[serde(default = "default_structured_data_confidence")]
    pub structured_data_confidence: f32,

    /// Documents fetched by a feedback retrieval round
    #[serde(default = "default_feedback_k")]
    pub feedback_k: usize,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_differentials: default_max_differentials(),
            max_backend_retries: 0,
            default_backend_confidence: default_backend_confidence(),
            structured_data_confidence: default_structured_data_confidence(),
            feedback_k: default_feedback_k(),
        }
    }
}

impl AgentsConfig {
    /// Effective retry count; a stage never retries a call more than once
    pub fn retries(&self) -> u32 {
        self.max_backend_retries.min(1)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// Retrieval component used for findings without citations
    #[serde(default = "default_unsupported_retrieval_score")]
    pub unsupported_retrieval_score: f32,

    /// Authority weights per source category
    #[serde(default)]
    pub authority: AuthorityWeights,

    /// Minimum confidence to surface a finding, per safety level
    #[serde(default)]
    pub surface_thresholds: SurfaceThresholds,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            unsupported_retrieval_score: default_unsupported_retrieval_score(),
            authority: AuthorityWeights::default(),
            surface_thresholds: SurfaceThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AuthorityWeights {
    pub guideline: f32,
    pub drug_db: f32,
    pub case_history: f32,
    pub institutional_protocol: f32,
}

impl AuthorityWeights {
    pub fn weight(&self, category: SourceCategory) -> f32 {
        match category {
            SourceCategory::Guideline => self.guideline,
            SourceCategory::DrugDb => self.drug_db,
            SourceCategory::CaseHistory => self.case_history,
            SourceCategory::InstitutionalProtocol => self.institutional_protocol,
        }
    }
}

impl Default for AuthorityWeights {
    fn default() -> Self {
        Self {
            guideline: 1.0,
            drug_db: 0.9,
            case_history: 0.7,
            institutional_protocol: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SurfaceThresholds {
    pub high: f32,
    pub medium: f32,
    pub low: f32,
}

impl SurfaceThresholds {
    pub fn for_level(&self, safety_level: RiskLevel) -> f32 {
        match safety_level {
            RiskLevel::High => self.high,
            RiskLevel::Medium => self.medium,
            RiskLevel::Low => self.low,
        }
    }
}

impl Default for SurfaceThresholds {
    fn default() -> Self {
        Self {
            high: 0.6,
            medium: 0.4,
            low: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModeConfig {
    /// Health probe interval in seconds (0 disables the probe task)
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Transitions kept in memory for inspection
    #[serde(default = "default_transition_log_capacity")]
    pub transition_log_capacity: usize,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval(),
            transition_log_capacity: default_transition_log_capacity(),
        }
    }
}

/// Per-call timeouts for external collaborators, in milliseconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_store_timeout")]
    pub store_ms: u64,
    #[serde(default = "default_ontology_timeout")]
    pub ontology_ms: u64,
    #[serde(default = "default_stage_timeout")]
    pub stage_ms: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_ms: u64,
}

impl TimeoutConfig {
    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    pub fn ontology(&self) -> Duration {
        Duration::from_millis(self.ontology_ms)
    }

    pub fn stage(&self) -> Duration {
        Duration::from_millis(self.stage_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store_ms: default_store_timeout(),
            ontology_ms: default_ontology_timeout(),
            stage_ms: default_stage_timeout(),
            probe_ms: default_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_max_concurrent() -> usize { 64 }
fn default_hosted_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_hosted_model() -> String { "gpt-4o-mini".to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_local_base_url() -> String { "http://localhost:11434".to_string() }
fn default_local_model() -> String { "llama3.1:8b".to_string() }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 384 }
fn default_embedding_timeout() -> u64 { 10 }
fn default_embedding_retries() -> u32 { 1 }
fn default_confidence_threshold() -> f32 { 0.5 }
fn default_max_case_chars() -> usize { 20_000 }
fn default_dosage_link_window() -> usize { 50 }
fn default_link_top_k() -> usize { 3 }
fn default_lexical_weight() -> f32 { 0.4 }
fn default_frequency_weight() -> f32 { 0.6 }
fn default_min_lexical_similarity() -> f32 { 0.3 }
fn default_retrieval_top_k() -> usize { 12 }
fn default_per_category_cap() -> usize { 3 }
fn default_text_query_k() -> usize { 16 }
fn default_concept_query_k() -> usize { 6 }
fn default_token_budget() -> usize { 3000 }
fn default_chars_per_token() -> usize { 4 }
fn default_excerpt_chars() -> usize { 600 }
fn default_max_tokens() -> u32 { 1024 }
fn default_max_differentials() -> usize { 5 }
fn default_backend_confidence() -> f32 { 0.7 }
fn default_structured_data_confidence() -> f32 { 0.95 }
fn default_feedback_k() -> usize { 3 }
fn default_unsupported_retrieval_score() -> f32 { 0.25 }
fn default_probe_interval() -> u64 { 30 }
fn default_transition_log_capacity() -> usize { 64 }
fn default_store_timeout() -> u64 { 2_000 }
fn default_ontology_timeout() -> u64 { 500 }
fn default_stage_timeout() -> u64 { 20_000 }
fn default_probe_timeout() -> u64 { 2_000 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "medforge".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__BACKENDS__PRIMARY__API_KEY=sk-...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        Ok(config.normalized())
    }

    /// A feedback round never fetches more than one category may hold
    fn normalized(mut self) -> Self {
        let cap = self.pipeline.retrieval.per_category_cap;
        self.pipeline.agents.feedback_k = self.pipeline.agents.feedback_k.min(cap);
        self
    }

    /// Startup validation. The only place a `Configuration` error is raised.
    pub fn validate(&self) -> Result<()> {
        let primary = &self.backends.primary;
        if primary.enabled && primary.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(AppError::Configuration {
                message: "backends.primary.api_key is required when the hosted backend is enabled"
                    .to_string(),
            });
        }

        if self.embedding.provider == "openai" && self.embedding.api_key.is_none() {
            return Err(AppError::Configuration {
                message: "embedding.api_key is required for the openai provider".to_string(),
            });
        }

        let linking = &self.pipeline.linking;
        if (linking.lexical_weight + linking.frequency_weight - 1.0).abs() > 1e-3 {
            return Err(AppError::Configuration {
                message: "pipeline.linking weights must sum to 1.0".to_string(),
            });
        }

        let retrieval = &self.pipeline.retrieval;
        if retrieval.top_k == 0 || retrieval.per_category_cap == 0 {
            return Err(AppError::Configuration {
                message: "pipeline.retrieval top_k and per_category_cap must be positive"
                    .to_string(),
            });
        }

        if self.pipeline.context.chars_per_token == 0 {
            return Err(AppError::Configuration {
                message: "pipeline.context.chars_per_token must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AppConfig {
        let mut config = AppConfig::default();
        config.backends.primary.api_key = Some("sk-test".into());
        config
    }

    #[test]
    fn test_default_pipeline_tunables() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.extraction.confidence_threshold, 0.5);
        assert_eq!(config.pipeline.linking.top_k, 3);
        assert_eq!(config.pipeline.retrieval.top_k, 12);
        assert_eq!(config.pipeline.retrieval.per_category_cap, 3);
        assert_eq!(config.pipeline.agents.max_backend_retries, 0);
    }

    #[test]
    fn test_missing_primary_credentials_is_config_error() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));

        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_disabled_primary_needs_no_credentials() {
        let mut config = AppConfig::default();
        config.backends.primary.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_linking_weights_must_sum_to_one() {
        let mut config = configured();
        config.pipeline.linking.lexical_weight = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_feedback_k_clamped_to_category_cap() {
        let mut config = AppConfig::default();
        config.pipeline.agents.feedback_k = 10;
        config.pipeline.retrieval.per_category_cap = 2;
        assert_eq!(config.normalized().pipeline.agents.feedback_k, 2);

        let defaults = AppConfig::default().normalized();
        assert_eq!(defaults.pipeline.agents.feedback_k, 3);
    }

    #[test]
    fn test_retries_clamped_to_one() {
        let mut agents = AgentsConfig::default();
        agents.max_backend_retries = 5;
        assert_eq!(agents.retries(), 1);
    }

    #[test]
    fn test_authority_and_thresholds() {
        let weights = AuthorityWeights::default();
        assert!(weights.weight(SourceCategory::Guideline) > weights.weight(SourceCategory::DrugDb));

        let thresholds = SurfaceThresholds::default();
        assert!(thresholds.for_level(RiskLevel::High) > thresholds.for_level(RiskLevel::Low));
    }
}
