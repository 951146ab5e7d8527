use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Clinical entity categories recognised by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Disease,
    Symptom,
    Medication,
    Dosage,
    Anatomy,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Disease => "disease",
            EntityType::Symptom => "symptom",
            EntityType::Medication => "medication",
            EntityType::Dosage => "dosage",
            EntityType::Anatomy => "anatomy",
        }
    }
}

/// Whether an entity can be used without a human looking at it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    AutoAccepted,
    NeedsReview,
}

/// A span of the case text recognised as a clinical entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// Surface text exactly as it appears in the case
    pub text: String,

    pub entity_type: EntityType,

    /// Byte offsets into the original case text
    pub start: usize,
    pub end: usize,

    /// Extraction confidence in [0, 1]
    pub confidence: f32,

    /// Below the configured threshold; never the sole basis of a HIGH claim
    pub low_confidence: bool,

    pub review_status: ReviewStatus,

    /// Canonical form (abbreviation expanded, brand mapped to generic)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,

    /// For dosages: the medication this dosage belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_medication: Option<String>,
}

impl ExtractedEntity {
    /// Normalized form when present, otherwise the lowercased surface text
    pub fn canonical(&self) -> String {
        self.normalized
            .clone()
            .unwrap_or_else(|| self.text.to_lowercase())
    }
}

/// An entity resolved to an ontology concept.
///
/// Ambiguous entities produce several of these, ranked by `linker_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedConcept {
    pub entity: ExtractedEntity,
    pub concept_code: String,
    pub concept_label: String,
    pub related_codes: BTreeSet<String>,

    /// Composite of lexical similarity and ontology frequency
    pub linker_score: f32,

    /// 0 for the best candidate of its entity
    pub rank: usize,
}

/// Output of the concept linker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkingResult {
    pub linked: Vec<LinkedConcept>,

    /// Entities with no ontology candidate; still covered by text retrieval
    pub unlinked: Vec<ExtractedEntity>,
}

impl LinkingResult {
    /// Every linked concept code, in sorted order
    pub fn concept_codes(&self) -> BTreeSet<String> {
        self.linked.iter().map(|c| c.concept_code.clone()).collect()
    }

    /// Codes plus their related codes
    pub fn expanded_codes(&self) -> BTreeSet<String> {
        let mut codes = self.concept_codes();
        for concept in &self.linked {
            codes.extend(concept.related_codes.iter().cloned());
        }
        codes
    }
}

/// Confidence distribution over the extracted entities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub total: usize,
    /// confidence >= 0.9
    pub high: usize,
    /// 0.7 <= confidence < 0.9
    pub medium: usize,
    /// confidence < 0.7
    pub low: usize,
    pub needs_review: usize,
}

impl EntitySummary {
    pub fn from_entities(entities: &[ExtractedEntity]) -> Self {
        let mut summary = Self {
            total: entities.len(),
            ..Self::default()
        };
        for entity in entities {
            match entity.confidence {
                c if c >= 0.9 => summary.high += 1,
                c if c >= 0.7 => summary.medium += 1,
                _ => summary.low += 1,
            }
            if entity.review_status == ReviewStatus::NeedsReview {
                summary.needs_review += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(text: &str, confidence: f32, status: ReviewStatus) -> ExtractedEntity {
        ExtractedEntity {
            text: text.into(),
            entity_type: EntityType::Symptom,
            start: 0,
            end: text.len(),
            confidence,
            low_confidence: confidence < 0.5,
            review_status: status,
            normalized: None,
            linked_medication: None,
        }
    }

    #[test]
    fn test_summary_buckets() {
        let entities = vec![
            entity("chest pain", 0.95, ReviewStatus::AutoAccepted),
            entity("SOB", 0.8, ReviewStatus::AutoAccepted),
            entity("severe ache", 0.4, ReviewStatus::NeedsReview),
        ];
        let summary = EntitySummary::from_entities(&entities);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.medium, 1);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.needs_review, 1);
    }

    #[test]
    fn test_canonical_prefers_normalized() {
        let mut e = entity("SOB", 0.9, ReviewStatus::AutoAccepted);
        assert_eq!(e.canonical(), "sob");
        e.normalized = Some("shortness of breath".into());
        assert_eq!(e.canonical(), "shortness of breath");
    }
}
