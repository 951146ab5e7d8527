//! MedForge Engine
//!
//! Clinical retrieval-augmented reasoning over a free-text case:
//! - Entity extraction and concept linking
//! - Diversity-capped retrieval and token-budgeted context assembly
//! - Four-stage agent pipeline with knowledge validation
//! - Degradation control across FULL, BASIC, MINIMAL and FALLBACK
//! - Aggregation into a single `ClinicalRecommendation`

pub mod aggregate;
pub mod agents;
pub mod analyzer;
pub mod cancel;
pub mod context;
pub mod extraction;
pub mod fallback;
pub mod linking;
pub mod mode;
pub mod retrieval;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{weakest_link, ResultAggregator};
pub use agents::{AgentPipeline, PipelineOutput};
pub use analyzer::{AnalyzeRequest, Analyzer, AnalyzerParts};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use context::ContextAssembler;
pub use extraction::EntityExtractor;
pub use fallback::{FallbackRules, KeywordRules};
pub use linking::ConceptLinker;
pub use mode::{Component, ExecutionPlan, ModeController, ModeTransition};
pub use retrieval::{RetrievalOutcome, Retriever};
pub use validation::{ValidationResult, Validator};
