//! Knowledge retrieval
//!
//! Provides two query classes:
//! - Whole-text embedding similarity over the case description
//! - Targeted queries per linked concept (label text + concept code)
//!
//! Results are merged, deduplicated and diversified (see `merge`).

mod merge;

pub use merge::{rank_order, DiversityMerge, QueryBatch, MATCHED_BY};

use futures::future::join_all;
use medforge_common::config::RetrievalConfig;
use medforge_common::embeddings::Embedder;
use medforge_common::errors::{AppError, Result};
use medforge_common::model::{LinkingResult, RetrievedDocument, SourceCategory};
use medforge_knowledge::{KnowledgeStore, StoreQuery};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Origin tag of the whole-text query
pub const CASE_TEXT_ORIGIN: &str = "case_text";

/// What retrieval produced for one request
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    /// Ranked, diversified documents
    pub documents: Vec<RetrievedDocument>,

    /// The store could not serve the request; a health signal, not an error
    pub store_failed: bool,

    /// Concept queries that failed and were skipped
    pub failed_queries: usize,
}

impl RetrievalOutcome {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub struct Retriever {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
    timeout: Duration,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
            timeout,
        }
    }

    /// Run the whole-text query and one query per linked concept
    pub async fn retrieve(&self, case_text: &str, linking: &LinkingResult) -> RetrievalOutcome {
        let whole_text = self.whole_text_query(case_text).await;

        // One query per distinct concept; labels come from the best-ranked link
        let mut concepts: BTreeMap<&str, &str> = BTreeMap::new();
        for concept in &linking.linked {
            concepts
                .entry(concept.concept_code.as_str())
                .or_insert(concept.concept_label.as_str());
        }

        let concept_queries = concepts.iter().map(|(code, label)| async move {
            let query = StoreQuery::text(*label, self.config.concept_query_k)
                .with_concept_codes(BTreeSet::from([code.to_string()]));
            (format!("concept:{}", code), self.query(&query).await)
        });
        let concept_results = join_all(concept_queries).await;

        let mut batches = Vec::with_capacity(concept_results.len() + 1);
        let whole_text_failed = match whole_text {
            Ok(documents) => {
                batches.push(QueryBatch::new(CASE_TEXT_ORIGIN, documents));
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Whole-text retrieval failed");
                true
            }
        };

        let mut failed_queries = 0;
        for (origin, result) in concept_results {
            match result {
                Ok(documents) => batches.push(QueryBatch::new(origin, documents)),
                Err(e) => {
                    failed_queries += 1;
                    tracing::warn!(query = %origin, error = %e, "Concept query failed, skipping");
                }
            }
        }

        let all_concepts_failed = !concepts.is_empty() && failed_queries == concepts.len();
        let store_failed = whole_text_failed || all_concepts_failed;

        let merge = DiversityMerge::new(self.config.top_k, self.config.per_category_cap);
        let documents = merge.merge(batches);

        if documents.is_empty() {
            tracing::info!(store_failed = store_failed, "Retrieval returned no documents");
        } else {
            tracing::debug!(documents = documents.len(), concept_queries = concepts.len(), "Retrieval complete");
        }

        RetrievalOutcome {
            documents,
            store_failed,
            failed_queries,
        }
    }

    /// Feedback-round query, optionally restricted to some categories
    pub async fn retrieve_targeted(
        &self,
        query_text: &str,
        categories: Option<Vec<SourceCategory>>,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let mut query = StoreQuery::text(query_text, k);
        if let Some(categories) = categories {
            query = query.with_categories(categories);
        }
        let mut documents = self.query(&query).await?;
        for doc in &mut documents {
            doc.provenance_metadata
                .insert(MATCHED_BY.to_string(), "feedback".to_string());
        }
        Ok(documents)
    }

    /// Embedding query, falling back to a text query when embedding fails
    async fn whole_text_query(&self, case_text: &str) -> Result<Vec<RetrievedDocument>> {
        let query = match self.embedder.embed(case_text).await {
            Ok(embedding) => StoreQuery::embedding(embedding, self.config.text_query_k),
            Err(e) => {
                tracing::warn!(error = %e, "Case embedding failed, using text query");
                StoreQuery::text(case_text, self.config.text_query_k)
            }
        };
        self.query(&query).await
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<RetrievedDocument>> {
        match tokio::time::timeout(self.timeout, self.store.query(query)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::StoreUnavailable {
                message: format!("query exceeded {}ms", self.timeout.as_millis()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medforge_common::embeddings::HashingEmbedder;
    use medforge_common::model::{DocumentMetadata, EntityType, ExtractedEntity, LinkedConcept, ReviewStatus};
    use medforge_knowledge::{DocumentRecord, InMemoryKnowledgeStore, UpsertOutcome};

    struct DownStore;

    #[async_trait::async_trait]
    impl KnowledgeStore for DownStore {
        async fn upsert(&self, _record: DocumentRecord) -> Result<UpsertOutcome> {
            Err(AppError::StoreUnavailable {
                message: "down".into(),
            })
        }

        async fn query(&self, _query: &StoreQuery) -> Result<Vec<RetrievedDocument>> {
            Err(AppError::StoreUnavailable {
                message: "down".into(),
            })
        }

        async fn ping(&self) -> Result<()> {
            Err(AppError::StoreUnavailable {
                message: "down".into(),
            })
        }
    }

    fn linked(code: &str, label: &str) -> LinkedConcept {
        LinkedConcept {
            entity: ExtractedEntity {
                text: label.to_lowercase(),
                entity_type: EntityType::Symptom,
                start: 0,
                end: label.len(),
                confidence: 0.9,
                low_confidence: false,
                review_status: ReviewStatus::AutoAccepted,
                normalized: None,
                linked_medication: None,
            },
            concept_code: code.into(),
            concept_label: label.into(),
            related_codes: BTreeSet::new(),
            linker_score: 0.9,
            rank: 0,
        }
    }

    async fn seeded_store(embedder: &HashingEmbedder) -> Arc<InMemoryKnowledgeStore> {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let docs = [
            ("aha-chest-pain", SourceCategory::Guideline, "Chest pain evaluation guideline", Some("SCT:29857009")),
            ("lisinopril-mono", SourceCategory::DrugDb, "Lisinopril monograph and interactions", None),
            ("gout-guideline", SourceCategory::Guideline, "Gout flare management", None),
        ];
        for (id, category, text, code) in docs {
            let mut metadata = DocumentMetadata::new(category, id);
            if let Some(code) = code {
                metadata.concept_codes.insert(code.to_string());
            }
            store
                .upsert(DocumentRecord {
                    doc_id: id.into(),
                    embedding: embedder.embed(text).await.unwrap(),
                    text: text.into(),
                    metadata,
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_concept_query_finds_indexed_document() {
        let embedder = HashingEmbedder::new(128);
        let store = seeded_store(&embedder).await;
        let retriever = Retriever::new(
            store,
            Arc::new(embedder),
            RetrievalConfig::default(),
            Duration::from_secs(1),
        );

        let linking = LinkingResult {
            linked: vec![linked("SCT:29857009", "Chest pain")],
            unlinked: vec![],
        };
        let outcome = retriever.retrieve("45F with chest pain", &linking).await;

        assert!(!outcome.store_failed);
        let top = &outcome.documents[0];
        assert_eq!(top.doc_id, "aha-chest-pain");
        assert!(top.provenance_metadata[MATCHED_BY].contains("concept:SCT:29857009"));
        for pair in outcome.documents.windows(2) {
            assert!(rank_order(&pair[0], &pair[1]) != std::cmp::Ordering::Greater);
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_signalled_not_raised() {
        let retriever = Retriever::new(
            Arc::new(DownStore),
            Arc::new(HashingEmbedder::new(64)),
            RetrievalConfig::default(),
            Duration::from_secs(1),
        );
        let outcome = retriever.retrieve("chest pain", &LinkingResult::default()).await;
        assert!(outcome.store_failed);
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn test_targeted_retrieval_filters_category() {
        let embedder = HashingEmbedder::new(128);
        let store = seeded_store(&embedder).await;
        let retriever = Retriever::new(
            store,
            Arc::new(embedder),
            RetrievalConfig::default(),
            Duration::from_secs(1),
        );

        let docs = retriever
            .retrieve_targeted("lisinopril interactions", Some(vec![SourceCategory::DrugDb]), 4)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_id, "lisinopril-mono");
        assert_eq!(docs[0].provenance_metadata[MATCHED_BY], "feedback");
    }
}
