//! MedForge Common Library
//!
//! Shared code for the MedForge analysis pipeline and gateway including:
//! - Clinical data model (cases, entities, documents, findings, recommendations)
//! - Error types and handling
//! - Configuration management
//! - Embedding client abstraction
//! - Language backend abstraction
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod model;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::{BackendSet, GenerationRequest, LanguageBackend};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
