//! Concept ontology - controlled clinical vocabulary
//!
//! Provides:
//! - `ConceptOntology` trait (lookup by text, related-concept graph)
//! - `InMemoryOntology` with code, term and relation indexes
//! - `lexical_similarity` used to rank term matches

use crate::vocabulary;
use medforge_common::errors::Result;
use medforge_common::model::EntityType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;

/// Candidates below this lexical similarity are not returned by lookup
const MIN_LOOKUP_SIMILARITY: f32 = 0.2;

/// A coded concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyConcept {
    /// System-prefixed code, e.g. `SCT:29857009`, `RXN:29046`
    pub code: String,

    /// Preferred term
    pub label: String,

    #[serde(default)]
    pub synonyms: Vec<String>,

    pub semantic_type: EntityType,

    /// Relative usage frequency in [0, 1]
    #[serde(default)]
    pub frequency: f32,

    /// Codes of related concepts; relations are symmetric once indexed
    #[serde(default)]
    pub related: Vec<String>,
}

/// A lookup hit
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptCandidate {
    pub concept: OntologyConcept,
    pub lexical_similarity: f32,
}

/// Trait for concept lookup
#[async_trait::async_trait]
pub trait ConceptOntology: Send + Sync {
    /// Concepts whose terms resemble `text`, best first
    async fn lookup(&self, text: &str) -> Result<Vec<ConceptCandidate>>;

    /// Codes related to `code`; empty for unknown codes
    async fn related(&self, code: &str) -> Result<BTreeSet<String>>;

    async fn concept(&self, code: &str) -> Result<Option<OntologyConcept>>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn normalize(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn trigrams(text: &str) -> HashSet<String> {
    let padded: Vec<char> = format!("  {} ", text).chars().collect();
    padded.windows(3).map(|w| w.iter().collect()).collect()
}

fn dice<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    2.0 * shared as f32 / (a.len() + b.len()) as f32
}

/// Similarity of two terms in [0, 1].
///
/// 1.0 for equal normalized terms; whole-word containment scores 0.6-0.9 by
/// length ratio; otherwise the better of word and character-trigram overlap.
pub fn lexical_similarity(a: &str, b: &str) -> f32 {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let padded_long = format!(" {} ", long);
    if padded_long.contains(&format!(" {} ", short)) {
        return 0.6 + 0.3 * (short.len() as f32 / long.len() as f32);
    }

    let words_a: HashSet<&str> = a.split(' ').collect();
    let words_b: HashSet<&str> = b.split(' ').collect();
    let word_score = dice(&words_a, &words_b) * 0.8;
    let char_score = dice(&trigrams(&a), &trigrams(&b)) * 0.7;
    word_score.max(char_score)
}

#[derive(Default)]
struct OntologyIndex {
    by_code: HashMap<String, OntologyConcept>,
    /// normalized term -> codes
    by_term: HashMap<String, BTreeSet<String>>,
    relations: HashMap<String, BTreeSet<String>>,
}

impl OntologyIndex {
    fn insert(&mut self, concept: OntologyConcept) {
        for term in std::iter::once(&concept.label).chain(concept.synonyms.iter()) {
            self.by_term
                .entry(normalize(term))
                .or_default()
                .insert(concept.code.clone());
        }
        for other in &concept.related {
            self.relations
                .entry(concept.code.clone())
                .or_default()
                .insert(other.clone());
            self.relations
                .entry(other.clone())
                .or_default()
                .insert(concept.code.clone());
        }
        self.by_code.insert(concept.code.clone(), concept);
    }
}

/// In-process ontology
pub struct InMemoryOntology {
    inner: RwLock<OntologyIndex>,
}

impl InMemoryOntology {
    /// Empty ontology
    pub fn new() -> Self {
        Self::from_concepts(Vec::new())
    }

    /// Ontology preloaded with the built-in clinical vocabulary
    pub fn with_defaults() -> Self {
        Self::from_concepts(vocabulary::default_concepts())
    }

    pub fn from_concepts(concepts: Vec<OntologyConcept>) -> Self {
        let mut index = OntologyIndex::default();
        for concept in concepts {
            index.insert(concept);
        }
        Self {
            inner: RwLock::new(index),
        }
    }

    /// Add or replace a concept
    pub async fn insert(&self, concept: OntologyConcept) {
        self.inner.write().await.insert(concept);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_code.len()
    }
}

impl Default for InMemoryOntology {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait::async_trait]
impl ConceptOntology for InMemoryOntology {
    async fn lookup(&self, text: &str) -> Result<Vec<ConceptCandidate>> {
        let index = self.inner.read().await;
        let mut best: HashMap<&str, f32> = HashMap::new();

        // Exact term hits first, then fuzzy scoring over every term
        if let Some(codes) = index.by_term.get(&normalize(text)) {
            for code in codes {
                best.insert(code.as_str(), 1.0);
            }
        }
        for (term, codes) in &index.by_term {
            let score = lexical_similarity(text, term);
            if score < MIN_LOOKUP_SIMILARITY {
                continue;
            }
            for code in codes {
                let entry = best.entry(code.as_str()).or_insert(0.0);
                if score > *entry {
                    *entry = score;
                }
            }
        }

        let mut candidates: Vec<ConceptCandidate> = best
            .into_iter()
            .filter_map(|(code, score)| {
                index.by_code.get(code).map(|concept| ConceptCandidate {
                    concept: concept.clone(),
                    lexical_similarity: score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.lexical_similarity
                .partial_cmp(&a.lexical_similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.concept.code.cmp(&b.concept.code))
        });
        Ok(candidates)
    }

    async fn related(&self, code: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .inner
            .read()
            .await
            .relations
            .get(code)
            .cloned()
            .unwrap_or_default())
    }

    async fn concept(&self, code: &str) -> Result<Option<OntologyConcept>> {
        Ok(self.inner.read().await.by_code.get(code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_similarity_bands() {
        assert_eq!(lexical_similarity("Chest Pain", "chest pain"), 1.0);

        let contained = lexical_similarity("pain", "chest pain");
        assert!(contained >= 0.6 && contained < 0.9);

        let typo = lexical_similarity("lisinopirl", "lisinopril");
        assert!(typo > 0.3 && typo < 0.6);

        assert!(lexical_similarity("fever", "lisinopril") < 0.2);
        assert_eq!(lexical_similarity("", "x"), 0.0);
    }

    #[tokio::test]
    async fn test_lookup_exact_synonym() {
        let ontology = InMemoryOntology::with_defaults();
        let hits = ontology.lookup("shortness of breath").await.unwrap();
        assert_eq!(hits[0].concept.code, "SCT:267036007");
        assert_eq!(hits[0].lexical_similarity, 1.0);

        let hits = ontology.lookup("Zestril").await.unwrap();
        assert_eq!(hits[0].concept.label, "Lisinopril");
    }

    #[tokio::test]
    async fn test_relations_are_symmetric() {
        let ontology = InMemoryOntology::from_concepts(vec![
            OntologyConcept {
                code: "A".into(),
                label: "alpha".into(),
                synonyms: vec![],
                semantic_type: EntityType::Disease,
                frequency: 0.5,
                related: vec!["B".into()],
            },
            OntologyConcept {
                code: "B".into(),
                label: "beta".into(),
                synonyms: vec![],
                semantic_type: EntityType::Symptom,
                frequency: 0.5,
                related: vec![],
            },
        ]);
        assert!(ontology.related("B").await.unwrap().contains("A"));
        assert!(ontology.related("A").await.unwrap().contains("B"));
        assert!(ontology.related("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_text_yields_nothing() {
        let ontology = InMemoryOntology::with_defaults();
        assert!(ontology.lookup("qqqq zzzz").await.unwrap().is_empty());
    }
}
