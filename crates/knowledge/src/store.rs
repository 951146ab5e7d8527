//! Knowledge store - embedded clinical documents
//!
//! Provides:
//! - `KnowledgeStore` trait (upsert, ranked query, ping)
//! - `InMemoryKnowledgeStore`: append-only versions keyed by content hash,
//!   cosine ranking for embedding queries, term coverage for text queries,
//!   category and concept filters

use chrono::{DateTime, Utc};
use medforge_common::embeddings::cosine_similarity;
use medforge_common::errors::Result;
use medforge_common::model::{DocumentMetadata, RetrievedDocument, SourceCategory};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;

/// Score given to a document indexed under one of the query's concept codes
pub const CONCEPT_MATCH_SCORE: f32 = 0.85;

/// A document as written by the ingestion side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// First version of the document
    Inserted,
    /// Content changed; a new version was appended
    Updated,
    /// Identical content already stored
    Unchanged,
}

#[derive(Debug, Clone)]
pub enum QueryInput {
    Embedding(Vec<f32>),
    Text(String),
}

/// Query parameters
#[derive(Debug, Clone)]
pub struct StoreQuery {
    pub input: QueryInput,

    /// Maximum results to return
    pub k: usize,

    /// Restrict to these categories
    pub category_filter: Option<Vec<SourceCategory>>,

    /// Documents indexed under any of these codes score at least `CONCEPT_MATCH_SCORE`
    pub concept_codes: BTreeSet<String>,

    /// Results must score strictly above this
    pub min_score: f32,
}

impl StoreQuery {
    pub fn embedding(embedding: Vec<f32>, k: usize) -> Self {
        Self::new(QueryInput::Embedding(embedding), k)
    }

    pub fn text(text: impl Into<String>, k: usize) -> Self {
        Self::new(QueryInput::Text(text.into()), k)
    }

    fn new(input: QueryInput, k: usize) -> Self {
        Self {
            input,
            k,
            category_filter: None,
            concept_codes: BTreeSet::new(),
            min_score: 0.0,
        }
    }

    pub fn with_categories(mut self, categories: Vec<SourceCategory>) -> Self {
        self.category_filter = Some(categories);
        self
    }

    pub fn with_concept_codes(mut self, codes: BTreeSet<String>) -> Self {
        self.concept_codes = codes;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

/// Trait for the document store used by retrieval.
///
/// Fails with `StoreUnavailable` when the backing index cannot be reached.
#[async_trait::async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Add or version a document
    async fn upsert(&self, record: DocumentRecord) -> Result<UpsertOutcome>;

    /// Ranked documents, best first, ties broken by `doc_id`
    async fn query(&self, query: &StoreQuery) -> Result<Vec<RetrievedDocument>>;

    /// Reachability check for the health probe
    async fn ping(&self) -> Result<()>;
}

struct StoredDocument {
    doc_id: String,
    version: u32,
    content_hash: String,
    embedding: Vec<f32>,
    text: String,
    metadata: DocumentMetadata,
    terms: HashSet<String>,
    stored_at: DateTime<Utc>,
}

impl StoredDocument {
    fn to_retrieved(&self, score: f32) -> RetrievedDocument {
        let mut provenance = self.metadata.provenance.clone();
        provenance.insert("content_hash".to_string(), self.content_hash.clone());
        provenance.insert("version".to_string(), self.version.to_string());
        provenance.insert("stored_at".to_string(), self.stored_at.to_rfc3339());

        RetrievedDocument {
            doc_id: self.doc_id.clone(),
            source_category: self.metadata.source_category,
            title: self.metadata.title.clone(),
            text_excerpt: self.text.clone(),
            similarity_score: score.clamp(0.0, 1.0),
            publication_date: self.metadata.publication_date,
            provenance_metadata: provenance,
            concept_codes: self.metadata.concept_codes.clone(),
            interactions: self.metadata.interactions.clone(),
        }
    }
}

#[derive(Default)]
struct StoreState {
    /// Every version ever written, in write order
    versions: Vec<StoredDocument>,
    /// doc_id -> index of its latest version
    latest: HashMap<String, usize>,
}

/// In-process knowledge store
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    inner: RwLock<StoreState>,
}

const STOPWORDS: &[&str] = &[
    "the", "and", "of", "in", "on", "with", "for", "to", "a", "an", "or", "is", "are", "at", "by",
];

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn content_hash(text: &str, metadata: &DocumentMetadata) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(serde_json::to_vec(metadata)?);
    Ok(hex::encode(hasher.finalize()))
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct documents
    pub async fn len(&self) -> usize {
        self.inner.read().await.latest.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// (version, content hash) for every stored version of a document
    pub async fn history(&self, doc_id: &str) -> Vec<(u32, String)> {
        let state = self.inner.read().await;
        state
            .versions
            .iter()
            .filter(|d| d.doc_id == doc_id)
            .map(|d| (d.version, d.content_hash.clone()))
            .collect()
    }

    fn score(doc: &StoredDocument, query: &StoreQuery, query_terms: Option<&HashSet<String>>) -> f32 {
        let base = match (&query.input, query_terms) {
            (QueryInput::Embedding(v), _) => cosine_similarity(v, &doc.embedding).max(0.0),
            (QueryInput::Text(_), Some(wanted)) if !wanted.is_empty() => {
                let hit = wanted.iter().filter(|t| doc.terms.contains(*t)).count();
                hit as f32 / wanted.len() as f32
            }
            _ => 0.0,
        };

        let concept_hit = !query.concept_codes.is_empty()
            && doc
                .metadata
                .concept_codes
                .iter()
                .any(|c| query.concept_codes.contains(c));

        if concept_hit {
            base.max(CONCEPT_MATCH_SCORE)
        } else {
            base
        }
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn upsert(&self, record: DocumentRecord) -> Result<UpsertOutcome> {
        let hash = content_hash(&record.text, &record.metadata)?;
        let mut state = self.inner.write().await;

        let previous = state.latest.get(&record.doc_id).map(|&i| &state.versions[i]);
        let (version, outcome) = match previous {
            Some(prev) if prev.content_hash == hash => return Ok(UpsertOutcome::Unchanged),
            Some(prev) => (prev.version + 1, UpsertOutcome::Updated),
            None => (1, UpsertOutcome::Inserted),
        };

        let mut term_source = record.text.clone();
        term_source.push(' ');
        term_source.push_str(&record.metadata.title);

        let stored = StoredDocument {
            doc_id: record.doc_id.clone(),
            version,
            content_hash: hash,
            embedding: record.embedding,
            terms: terms(&term_source),
            text: record.text,
            metadata: record.metadata,
            stored_at: Utc::now(),
        };

        let index = state.versions.len();
        state.versions.push(stored);
        state.latest.insert(record.doc_id.clone(), index);

        tracing::debug!(doc_id = %record.doc_id, version = version, outcome = ?outcome, "Document stored");
        Ok(outcome)
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<RetrievedDocument>> {
        let state = self.inner.read().await;
        let query_terms = match &query.input {
            QueryInput::Text(text) => Some(terms(text)),
            QueryInput::Embedding(_) => None,
        };

        let mut hits: Vec<(f32, &StoredDocument)> = state
            .latest
            .values()
            .map(|&i| &state.versions[i])
            .filter(|doc| {
                query
                    .category_filter
                    .as_ref()
                    .map_or(true, |cats| cats.contains(&doc.metadata.source_category))
            })
            .filter_map(|doc| {
                let score = Self::score(doc, query, query_terms.as_ref());
                (score > query.min_score && score > 0.0).then_some((score, doc))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.doc_id.cmp(&b.1.doc_id))
        });
        hits.truncate(query.k);

        Ok(hits.into_iter().map(|(score, doc)| doc.to_retrieved(score)).collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medforge_common::embeddings::{Embedder, HashingEmbedder};

    async fn record(embedder: &HashingEmbedder, id: &str, category: SourceCategory, text: &str) -> DocumentRecord {
        DocumentRecord {
            doc_id: id.to_string(),
            embedding: embedder.embed(text).await.unwrap(),
            text: text.to_string(),
            metadata: DocumentMetadata::new(category, id),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_content_addressed() {
        let embedder = HashingEmbedder::new(128);
        let store = InMemoryKnowledgeStore::new();

        let doc = record(&embedder, "g1", SourceCategory::Guideline, "chest pain evaluation").await;
        assert_eq!(store.upsert(doc.clone()).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(doc).await.unwrap(), UpsertOutcome::Unchanged);

        let changed = record(&embedder, "g1", SourceCategory::Guideline, "chest pain evaluation 2024").await;
        assert_eq!(store.upsert(changed).await.unwrap(), UpsertOutcome::Updated);

        let history = store.history("g1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].0, 2);
        assert_eq!(store.len().await, 1);

        // Queries see only the latest version
        let hits = store.query(&StoreQuery::text("2024", 5)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].provenance_metadata["version"], "2");
    }

    #[tokio::test]
    async fn test_embedding_query_ranks_and_filters() {
        let embedder = HashingEmbedder::new(256);
        let store = InMemoryKnowledgeStore::new();
        store
            .upsert(record(&embedder, "g1", SourceCategory::Guideline, "acute chest pain evaluation guideline").await)
            .await
            .unwrap();
        store
            .upsert(record(&embedder, "d1", SourceCategory::DrugDb, "lisinopril monograph chest pain rare").await)
            .await
            .unwrap();
        store
            .upsert(record(&embedder, "p1", SourceCategory::InstitutionalProtocol, "otitis media pediatric protocol").await)
            .await
            .unwrap();

        let query = embedder.embed("acute chest pain").await.unwrap();
        let hits = store.query(&StoreQuery::embedding(query.clone(), 10)).await.unwrap();
        assert_eq!(hits[0].doc_id, "g1");
        assert!(hits.windows(2).all(|w| w[0].similarity_score >= w[1].similarity_score));

        let hits = store
            .query(&StoreQuery::embedding(query, 10).with_categories(vec![SourceCategory::DrugDb]))
            .await
            .unwrap();
        assert!(hits.iter().all(|d| d.source_category == SourceCategory::DrugDb));
    }

    #[tokio::test]
    async fn test_concept_codes_boost() {
        let embedder = HashingEmbedder::new(64);
        let store = InMemoryKnowledgeStore::new();
        let mut doc = record(&embedder, "d1", SourceCategory::DrugDb, "ACE inhibitor monograph").await;
        doc.metadata.concept_codes.insert("RXN:29046".into());
        store.upsert(doc).await.unwrap();

        let codes: BTreeSet<String> = ["RXN:29046".to_string()].into_iter().collect();
        let hits = store
            .query(&StoreQuery::text("Lisinopril", 5).with_concept_codes(codes))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].similarity_score, CONCEPT_MATCH_SCORE);
    }

    #[tokio::test]
    async fn test_ties_break_on_doc_id() {
        let embedder = HashingEmbedder::new(64);
        let store = InMemoryKnowledgeStore::new();
        for id in ["b", "a", "c"] {
            store
                .upsert(record(&embedder, id, SourceCategory::CaseHistory, &format!("warfarin case {}", id)).await)
                .await
                .unwrap();
        }
        let hits = store.query(&StoreQuery::text("warfarin", 10)).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
