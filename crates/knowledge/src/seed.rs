//! Seed loading
//!
//! Populates a store (and optionally the ontology) from JSON files so a
//! deployment can run without the offline ingestion job.

use crate::ontology::{InMemoryOntology, OntologyConcept};
use crate::store::{DocumentRecord, KnowledgeStore, UpsertOutcome};
use medforge_common::embeddings::Embedder;
use medforge_common::errors::{AppError, Result};
use medforge_common::model::DocumentMetadata;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A document in a seed file; the embedding is computed at load time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDocument {
    pub doc_id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    documents: Vec<SeedDocument>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Embed and upsert documents
pub async fn seed_documents(
    documents: Vec<SeedDocument>,
    store: &dyn KnowledgeStore,
    embedder: &dyn Embedder,
) -> Result<SeedSummary> {
    let texts: Vec<String> = documents
        .iter()
        .map(|d| format!("{}\n{}", d.metadata.title, d.text))
        .collect();
    let embeddings = embedder.embed_batch(&texts).await?;

    let mut summary = SeedSummary::default();
    for (doc, embedding) in documents.into_iter().zip(embeddings) {
        let outcome = store
            .upsert(DocumentRecord {
                doc_id: doc.doc_id,
                embedding,
                text: doc.text,
                metadata: doc.metadata,
            })
            .await?;
        match outcome {
            UpsertOutcome::Inserted => summary.inserted += 1,
            UpsertOutcome::Updated => summary.updated += 1,
            UpsertOutcome::Unchanged => summary.unchanged += 1,
        }
    }

    Ok(summary)
}

/// Load `{"documents": [...]}` from a JSON file into the store
pub async fn load_seed(
    path: impl AsRef<Path>,
    store: &dyn KnowledgeStore,
    embedder: &dyn Embedder,
) -> Result<SeedSummary> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| AppError::Configuration {
        message: format!("cannot read seed file {}: {}", path.display(), e),
    })?;
    let file: SeedFile = serde_json::from_str(&raw)?;

    let summary = seed_documents(file.documents, store, embedder).await?;
    tracing::info!(
        path = %path.display(),
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        "Knowledge store seeded"
    );
    Ok(summary)
}

/// Merge a JSON array of concepts into the ontology
pub async fn load_ontology(path: impl AsRef<Path>, ontology: &InMemoryOntology) -> Result<usize> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| AppError::Configuration {
        message: format!("cannot read ontology file {}: {}", path.display(), e),
    })?;
    let concepts: Vec<OntologyConcept> = serde_json::from_str(&raw)?;
    let count = concepts.len();
    for concept in concepts {
        ontology.insert(concept).await;
    }
    tracing::info!(path = %path.display(), concepts = count, "Ontology extended");
    Ok(count)
}
