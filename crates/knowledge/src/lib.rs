//! MedForge knowledge layer
//!
//! Read-mostly collaborators of the analysis pipeline:
//! - `KnowledgeStore`: append-only, content-addressed document store queried
//!   by embedding similarity or text, with metadata filters
//! - `ConceptOntology`: term-to-concept lookup and the related-concept graph
//! - Seed loading for deployments without an external ingestion job

pub mod ontology;
pub mod seed;
pub mod store;
mod vocabulary;

pub use ontology::{lexical_similarity, ConceptCandidate, ConceptOntology, InMemoryOntology, OntologyConcept};
pub use seed::{load_ontology, load_seed, seed_documents, SeedDocument, SeedSummary};
pub use store::{
    DocumentRecord, InMemoryKnowledgeStore, KnowledgeStore, QueryInput, StoreQuery, UpsertOutcome,
};
