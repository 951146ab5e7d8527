//! Clinical data model shared by every pipeline component
//!
//! Provides:
//! - Case input (`ClinicalCase`)
//! - Extraction and linking output (`ExtractedEntity`, `LinkedConcept`)
//! - Retrieval output (`RetrievedDocument`, `ContextBundle`, `Citation`)
//! - Reasoning output (`AgentFinding`, `ValidationReport`)
//! - The final `ClinicalRecommendation` and the `OperatingMode` tiers

mod case;
mod document;
mod entity;
mod finding;
mod recommendation;

pub use case::{ClinicalCase, Sex, Vitals};
pub use document::{
    Citation, ContextBundle, DocumentMetadata, InteractionRecord, InteractionSeverity,
    RetrievedDocument, SourceCategory,
};
pub use entity::{
    EntitySummary, EntityType, ExtractedEntity, LinkedConcept, LinkingResult, ReviewStatus,
};
pub use finding::{
    AgentFinding, FindingKind, FindingSource, StageName, Urgency, ValidationEntry,
    ValidationOutcome, ValidationReport,
};
pub use recommendation::{
    ClinicalRecommendation, OperatingMode, RiskLevel, SuppressedFinding, FALLBACK_LABEL,
};
