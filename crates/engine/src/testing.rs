//! Shared test doubles and fixtures

use async_trait::async_trait;
use medforge_common::embeddings::HashingEmbedder;
use medforge_common::errors::{AppError, Result};
use medforge_common::model::{
    DocumentMetadata, InteractionRecord, InteractionSeverity, RetrievedDocument, SourceCategory,
};
use medforge_knowledge::{
    seed_documents, DocumentRecord, InMemoryKnowledgeStore, KnowledgeStore, SeedDocument,
    StoreQuery, UpsertOutcome,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) const EMBEDDING_DIM: usize = 128;

/// In-memory store whose reads can be switched off
pub(crate) struct ToggleStore {
    inner: InMemoryKnowledgeStore,
    failing: AtomicBool,
}

impl ToggleStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: InMemoryKnowledgeStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AppError::StoreUnavailable {
                message: "index offline".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KnowledgeStore for ToggleStore {
    async fn upsert(&self, record: DocumentRecord) -> Result<UpsertOutcome> {
        self.inner.upsert(record).await
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<RetrievedDocument>> {
        self.check()?;
        self.inner.query(query).await
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

/// Guideline and drug documents for the chest-pain case
pub(crate) fn chest_pain_corpus() -> Vec<SeedDocument> {
    let mut guideline = DocumentMetadata::new(
        SourceCategory::Guideline,
        "AHA/ACC chest pain evaluation guideline",
    );
    guideline.concept_codes = BTreeSet::from([
        "SCT:29857009".to_string(),
        "SCT:394659003".to_string(),
        "SCT:22298006".to_string(),
    ]);
    guideline
        .provenance
        .insert("publisher".to_string(), "AHA/ACC".to_string());

    let mut lisinopril = DocumentMetadata::new(SourceCategory::DrugDb, "Lisinopril monograph");
    lisinopril.concept_codes = BTreeSet::from(["RXN:29046".to_string()]);
    lisinopril.interactions = vec![
        InteractionRecord {
            subject: "lisinopril".into(),
            object: "spironolactone".into(),
            severity: InteractionSeverity::High,
            description: "Additive hyperkalemia risk".into(),
        },
        InteractionRecord {
            subject: "lisinopril".into(),
            object: "aspirin".into(),
            severity: InteractionSeverity::Low,
            description: "High-dose aspirin may blunt the antihypertensive effect".into(),
        },
    ];

    vec![
        SeedDocument {
            doc_id: "aha-chest-pain-2021".into(),
            text: "Acute chest pain with shortness of breath in a patient with hypertension \
                   warrants evaluation for acute coronary syndrome. Obtain a 12-lead ECG \
                   within 10 minutes and high-sensitivity troponin."
                .into(),
            metadata: guideline,
        },
        SeedDocument {
            doc_id: "lisinopril-monograph".into(),
            text: "Lisinopril is an ACE inhibitor for hypertension and heart failure. \
                   Monitor potassium with potassium-sparing diuretics."
                .into(),
            metadata: lisinopril,
        },
    ]
}

pub(crate) async fn seeded_store() -> ToggleStore {
    let store = ToggleStore::new();
    let embedder = HashingEmbedder::new(EMBEDDING_DIM);
    seed_documents(chest_pain_corpus(), &store, &embedder)
        .await
        .expect("seed corpus");
    store
}

pub(crate) fn document(doc_id: &str, category: SourceCategory, score: f32) -> RetrievedDocument {
    RetrievedDocument {
        doc_id: doc_id.to_string(),
        source_category: category,
        title: doc_id.to_string(),
        text_excerpt: format!("{} excerpt", doc_id),
        similarity_score: score,
        publication_date: None,
        provenance_metadata: BTreeMap::new(),
        concept_codes: BTreeSet::new(),
        interactions: Vec::new(),
    }
}

pub(crate) fn embedder() -> HashingEmbedder {
    HashingEmbedder::new(EMBEDDING_DIM)
}
