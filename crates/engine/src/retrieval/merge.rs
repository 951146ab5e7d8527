//! Merging of query batches with a per-category diversity cap
//!
//! - Deduplicates by `doc_id`, keeping the best similarity
//! - Records which queries matched in `provenance_metadata["matched_by"]`
//! - Caps each source category so no single source dominates the top-K

use medforge_common::model::{RetrievedDocument, SourceCategory};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Provenance key listing the queries that matched a document
pub const MATCHED_BY: &str = "matched_by";

/// One query's results, tagged with where the query came from
#[derive(Debug, Clone)]
pub struct QueryBatch {
    pub origin: String,
    pub documents: Vec<RetrievedDocument>,
}

impl QueryBatch {
    pub fn new(origin: impl Into<String>, documents: Vec<RetrievedDocument>) -> Self {
        Self {
            origin: origin.into(),
            documents,
        }
    }
}

/// Merge parameters
#[derive(Debug, Clone)]
pub struct DiversityMerge {
    /// Final result size (K)
    pub top_k: usize,

    /// Maximum documents per source category (N)
    pub per_category_cap: usize,
}

impl Default for DiversityMerge {
    fn default() -> Self {
        Self {
            top_k: 12,
            per_category_cap: 3,
        }
    }
}

/// Similarity descending, then `doc_id` ascending
pub fn rank_order(a: &RetrievedDocument, b: &RetrievedDocument) -> Ordering {
    b.similarity_score
        .partial_cmp(&a.similarity_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

impl DiversityMerge {
    pub fn new(top_k: usize, per_category_cap: usize) -> Self {
        Self {
            top_k,
            per_category_cap,
        }
    }

    /// Merge batches into the final diversified, ranked list
    pub fn merge(&self, batches: Vec<QueryBatch>) -> Vec<RetrievedDocument> {
        let mut by_id: HashMap<String, (RetrievedDocument, BTreeSet<String>)> = HashMap::new();

        for batch in batches {
            for doc in batch.documents {
                match by_id.get_mut(&doc.doc_id) {
                    Some((existing, origins)) => {
                        origins.insert(batch.origin.clone());
                        if doc.similarity_score > existing.similarity_score {
                            existing.similarity_score = doc.similarity_score;
                        }
                    }
                    None => {
                        let origins = BTreeSet::from([batch.origin.clone()]);
                        by_id.insert(doc.doc_id.clone(), (doc, origins));
                    }
                }
            }
        }

        let mut merged: Vec<RetrievedDocument> = by_id
            .into_values()
            .map(|(mut doc, origins)| {
                let matched_by = origins.into_iter().collect::<Vec<_>>().join(",");
                doc.provenance_metadata.insert(MATCHED_BY.to_string(), matched_by);
                doc
            })
            .collect();
        merged.sort_by(rank_order);

        self.diversify(merged)
    }

    /// Take documents best-first, skipping any whose category is full
    pub fn diversify(&self, ranked: Vec<RetrievedDocument>) -> Vec<RetrievedDocument> {
        let mut per_category: HashMap<SourceCategory, usize> = HashMap::new();
        let mut selected = Vec::with_capacity(self.top_k.min(ranked.len()));

        for doc in ranked {
            if selected.len() >= self.top_k {
                break;
            }
            let count = per_category.entry(doc.source_category).or_insert(0);
            if *count >= self.per_category_cap {
                continue;
            }
            *count += 1;
            selected.push(doc);
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn doc(id: &str, category: SourceCategory, score: f32) -> RetrievedDocument {
        RetrievedDocument {
            doc_id: id.to_string(),
            source_category: category,
            title: id.to_string(),
            text_excerpt: String::new(),
            similarity_score: score,
            publication_date: None,
            provenance_metadata: BTreeMap::new(),
            concept_codes: BTreeSet::new(),
            interactions: Vec::new(),
        }
    }

    #[test]
    fn test_dedupe_keeps_best_score_and_origins() {
        let merge = DiversityMerge::default();
        let results = merge.merge(vec![
            QueryBatch::new("case_text", vec![doc("a", SourceCategory::Guideline, 0.4)]),
            QueryBatch::new(
                "concept:SCT:1",
                vec![
                    doc("a", SourceCategory::Guideline, 0.85),
                    doc("b", SourceCategory::DrugDb, 0.5),
                ],
            ),
        ]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].doc_id, "a");
        assert_eq!(results[0].similarity_score, 0.85);
        assert_eq!(
            results[0].provenance_metadata[MATCHED_BY],
            "case_text,concept:SCT:1"
        );
    }

    #[test]
    fn test_category_cap_applied() {
        let merge = DiversityMerge::new(12, 3);
        let guidelines: Vec<RetrievedDocument> = (0..6)
            .map(|i| doc(&format!("g{}", i), SourceCategory::Guideline, 0.9 - i as f32 * 0.01))
            .collect();
        let mut batch = guidelines;
        batch.push(doc("d0", SourceCategory::DrugDb, 0.1));

        let results = merge.merge(vec![QueryBatch::new("case_text", batch)]);
        let guideline_count = results
            .iter()
            .filter(|d| d.source_category == SourceCategory::Guideline)
            .count();
        assert_eq!(guideline_count, 3);
        assert_eq!(results.len(), 4);
        assert_eq!(
            results.iter().map(|d| d.doc_id.as_str()).collect::<Vec<_>>(),
            vec!["g0", "g1", "g2", "d0"]
        );
    }

    #[test]
    fn test_top_k_and_tie_order() {
        let merge = DiversityMerge::new(2, 3);
        let results = merge.merge(vec![QueryBatch::new(
            "case_text",
            vec![
                doc("c", SourceCategory::Guideline, 0.5),
                doc("a", SourceCategory::DrugDb, 0.5),
                doc("b", SourceCategory::CaseHistory, 0.5),
            ],
        )]);
        assert_eq!(
            results.iter().map(|d| d.doc_id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }
}
