//! Context assembly - pack retrieved documents into a token budget
//!
//! Provides:
//! - Category-priority ordering (guidelines first)
//! - Budget enforcement that drops from the lowest-priority category first,
//!   least similar document first
//! - Extension with feedback documents
//! - The per-category cap, held across the first retrieval, feedback rounds
//!   and the evidence union

use crate::retrieval::rank_order;
use medforge_common::config::ContextConfig;
use medforge_common::model::{
    ContextBundle, ExtractedEntity, LinkingResult, RetrievedDocument, SourceCategory,
};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

pub struct ContextAssembler {
    config: ContextConfig,
    /// Maximum documents per source category (N)
    per_category_cap: usize,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig, per_category_cap: usize) -> Self {
        Self {
            config,
            per_category_cap: per_category_cap.max(1),
        }
    }

    /// Whether `bundle` can take another document of `category`
    pub fn has_room(&self, bundle: &ContextBundle, category: SourceCategory) -> bool {
        category_count(bundle, category) < self.per_category_cap
    }

    /// Build the bundle for the reasoning stages
    pub fn assemble(
        &self,
        documents: Vec<RetrievedDocument>,
        entities: Vec<ExtractedEntity>,
        linking: &LinkingResult,
    ) -> ContextBundle {
        let retrieval_empty = documents.is_empty();
        let mut bundle = ContextBundle {
            documents: Vec::new(),
            entities,
            concepts: linking.linked.clone(),
            token_count: 0,
            token_budget: self.config.token_budget,
            dropped_doc_ids: Vec::new(),
            retrieval_empty,
        };
        self.pack(&mut bundle, documents);

        tracing::debug!(
            documents = bundle.documents.len(),
            tokens = bundle.token_count,
            dropped = bundle.dropped_doc_ids.len(),
            "Context assembled"
        );
        bundle
    }

    /// Add feedback documents, re-applying order, dedupe, category cap and
    /// budget. Documents already in the bundle keep their category slots.
    ///
    /// Returns the ids of the documents that made it into the bundle.
    pub fn extend(&self, bundle: &mut ContextBundle, mut extra: Vec<RetrievedDocument>) -> Vec<String> {
        let known: HashSet<String> = bundle.documents.iter().map(|d| d.doc_id.clone()).collect();
        let mut seen = known.clone();
        let mut per_category: HashMap<SourceCategory, usize> = HashMap::new();
        for doc in &bundle.documents {
            *per_category.entry(doc.source_category).or_insert(0) += 1;
        }

        extra.sort_by(rank_order);
        let mut fresh = Vec::new();
        for doc in extra {
            if !seen.insert(doc.doc_id.clone()) {
                continue;
            }
            let count = per_category.entry(doc.source_category).or_insert(0);
            if *count >= self.per_category_cap {
                bundle.dropped_doc_ids.push(doc.doc_id);
                continue;
            }
            *count += 1;
            fresh.push(doc);
        }
        if fresh.is_empty() {
            return Vec::new();
        }

        let mut candidates = std::mem::take(&mut bundle.documents);
        candidates.extend(fresh);
        self.pack(bundle, candidates);

        if !bundle.documents.is_empty() {
            bundle.retrieval_empty = false;
        }

        bundle
            .documents
            .iter()
            .filter(|d| !known.contains(&d.doc_id))
            .map(|d| d.doc_id.clone())
            .collect()
    }

    /// `ceil(chars / chars_per_token)`
    pub fn estimate_tokens(&self, text: &str) -> usize {
        let per_token = self.config.chars_per_token.max(1);
        text.chars().count().div_ceil(per_token)
    }

    fn pack(&self, bundle: &mut ContextBundle, documents: Vec<RetrievedDocument>) {
        let mut documents: Vec<RetrievedDocument> = documents
            .into_iter()
            .map(|mut doc| {
                doc.text_excerpt = truncate_chars(&doc.text_excerpt, self.config.excerpt_chars);
                doc
            })
            .collect();
        documents.sort_by(priority_order);

        let mut per_category: HashMap<SourceCategory, usize> = HashMap::new();
        let mut documents: Vec<RetrievedDocument> = documents
            .into_iter()
            .filter_map(|doc| {
                let count = per_category.entry(doc.source_category).or_insert(0);
                if *count >= self.per_category_cap {
                    bundle.dropped_doc_ids.push(doc.doc_id);
                    return None;
                }
                *count += 1;
                Some(doc)
            })
            .collect();

        let mut total: usize = documents.iter().map(|d| self.estimate_tokens(&d.text_excerpt)).sum();

        // Sorted by priority then similarity, so the tail is always the next to go
        while total > self.config.token_budget {
            match documents.pop() {
                Some(dropped) => {
                    total -= self.estimate_tokens(&dropped.text_excerpt);
                    bundle.dropped_doc_ids.push(dropped.doc_id);
                }
                None => break,
            }
        }

        bundle.documents = documents;
        bundle.token_count = total;
    }
}

fn category_count(bundle: &ContextBundle, category: SourceCategory) -> usize {
    bundle
        .documents
        .iter()
        .filter(|d| d.source_category == category)
        .count()
}

/// Category priority, then similarity descending, then `doc_id`
fn priority_order(a: &RetrievedDocument, b: &RetrievedDocument) -> Ordering {
    a.source_category
        .priority()
        .cmp(&b.source_category.priority())
        .then_with(|| rank_order(a, b))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn doc(id: &str, category: SourceCategory, score: f32, chars: usize) -> RetrievedDocument {
        RetrievedDocument {
            doc_id: id.to_string(),
            source_category: category,
            title: id.to_string(),
            text_excerpt: "x".repeat(chars),
            similarity_score: score,
            publication_date: None,
            provenance_metadata: BTreeMap::new(),
            concept_codes: BTreeSet::new(),
            interactions: Vec::new(),
        }
    }

    fn assembler(token_budget: usize) -> ContextAssembler {
        ContextAssembler::new(
            ContextConfig {
                token_budget,
                ..ContextConfig::default()
            },
            3,
        )
    }

    fn ids(bundle: &ContextBundle) -> Vec<&str> {
        bundle.documents.iter().map(|d| d.doc_id.as_str()).collect()
    }

    #[test]
    fn test_orders_by_category_priority() {
        let bundle = assembler(3000).assemble(
            vec![
                doc("protocol", SourceCategory::InstitutionalProtocol, 0.99, 40),
                doc("drug", SourceCategory::DrugDb, 0.5, 40),
                doc("guide-low", SourceCategory::Guideline, 0.3, 40),
                doc("guide-high", SourceCategory::Guideline, 0.8, 40),
            ],
            Vec::new(),
            &LinkingResult::default(),
        );
        assert_eq!(ids(&bundle), vec!["guide-high", "guide-low", "drug", "protocol"]);
        assert_eq!(bundle.token_count, 40);
        assert!(!bundle.retrieval_empty);
    }

    #[test]
    fn test_budget_drops_lowest_priority_first() {
        // 100 chars -> 25 tokens each; budget fits two
        let bundle = assembler(50).assemble(
            vec![
                doc("guide", SourceCategory::Guideline, 0.2, 100),
                doc("history-a", SourceCategory::CaseHistory, 0.9, 100),
                doc("history-b", SourceCategory::CaseHistory, 0.4, 100),
            ],
            Vec::new(),
            &LinkingResult::default(),
        );
        assert_eq!(ids(&bundle), vec!["guide", "history-a"]);
        assert_eq!(bundle.dropped_doc_ids, vec!["history-b".to_string()]);
        assert!(bundle.token_count <= bundle.token_budget);
    }

    #[test]
    fn test_excerpts_trimmed_on_char_boundary() {
        let mut long = doc("g", SourceCategory::Guideline, 0.9, 0);
        long.text_excerpt = "é".repeat(700);
        let bundle = assembler(3000).assemble(vec![long], Vec::new(), &LinkingResult::default());
        assert_eq!(bundle.documents[0].text_excerpt.chars().count(), 600);
    }

    #[test]
    fn test_empty_retrieval_flagged() {
        let bundle = assembler(3000).assemble(Vec::new(), Vec::new(), &LinkingResult::default());
        assert!(bundle.retrieval_empty);
        assert!(bundle.is_empty());
    }

    #[test]
    fn test_extend_dedupes_and_reports_added() {
        let assembler = assembler(3000);
        let mut bundle = assembler.assemble(
            vec![doc("drug", SourceCategory::DrugDb, 0.5, 40)],
            Vec::new(),
            &LinkingResult::default(),
        );

        let added = assembler.extend(
            &mut bundle,
            vec![
                doc("drug", SourceCategory::DrugDb, 0.9, 40),
                doc("guide", SourceCategory::Guideline, 0.6, 40),
            ],
        );
        assert_eq!(added, vec!["guide".to_string()]);
        assert_eq!(ids(&bundle), vec!["guide", "drug"]);
        assert_eq!(bundle.get("drug").unwrap().similarity_score, 0.5);
    }

    #[test]
    fn test_token_estimate_rounds_up() {
        let assembler = assembler(3000);
        assert_eq!(assembler.estimate_tokens("abcde"), 2);
        assert_eq!(assembler.estimate_tokens(""), 0);
    }

    #[test]
    fn test_assemble_caps_each_category() {
        let bundle = assembler(3000).assemble(
            (0..5)
                .map(|i| doc(&format!("drug-{}", i), SourceCategory::DrugDb, 0.9 - i as f32 * 0.1, 40))
                .collect(),
            Vec::new(),
            &LinkingResult::default(),
        );
        assert_eq!(ids(&bundle), vec!["drug-0", "drug-1", "drug-2"]);
        assert_eq!(bundle.dropped_doc_ids, vec!["drug-3".to_string(), "drug-4".to_string()]);
    }

    #[test]
    fn test_extend_respects_category_cap() {
        let assembler = assembler(3000);
        let mut bundle = assembler.assemble(
            vec![
                doc("warfarin-0", SourceCategory::DrugDb, 0.6, 40),
                doc("warfarin-1", SourceCategory::DrugDb, 0.5, 40),
                doc("warfarin-2", SourceCategory::DrugDb, 0.4, 40),
            ],
            Vec::new(),
            &LinkingResult::default(),
        );
        assert!(!assembler.has_room(&bundle, SourceCategory::DrugDb));

        let added = assembler.extend(
            &mut bundle,
            vec![
                doc("ibuprofen-0", SourceCategory::DrugDb, 0.95, 40),
                doc("ibuprofen-1", SourceCategory::DrugDb, 0.9, 40),
                doc("guide", SourceCategory::Guideline, 0.3, 40),
            ],
        );
        assert_eq!(added, vec!["guide".to_string()]);
        let drug_docs = bundle
            .documents
            .iter()
            .filter(|d| d.source_category == SourceCategory::DrugDb)
            .count();
        assert_eq!(drug_docs, 3);
        assert!(bundle.dropped_doc_ids.contains(&"ibuprofen-0".to_string()));
        assert!(bundle.get("warfarin-2").is_some());
    }
}
