//! Entity extraction - rule-based clinical named-entity recognition
//!
//! Provides:
//! - Lexicon, clinical shorthand and brand-name matching with normalization
//! - Suffix, dosage and descriptor heuristics at lower confidence
//! - Overlap resolution and dosage-to-medication linking
//! - Input sanity checks surfaced as `AppError::Extraction`

mod patterns;

use medforge_common::config::ExtractionConfig;
use medforge_common::errors::{AppError, Result};
use medforge_common::model::{ClinicalCase, EntityType, ExtractedEntity, ReviewStatus};
use patterns::{RuleKind, FUNCTION_WORDS, LEXICON_INDEX, LEXICON_REGEX, RULES, SUFFIX_EXCLUSIONS};
use std::cmp::Ordering;

/// Oldest plausible patient age in years
const MAX_AGE: u32 = 130;

/// A match before overlap resolution
#[derive(Debug, Clone)]
struct Candidate {
    start: usize,
    end: usize,
    entity_type: EntityType,
    confidence: f32,
    normalized: Option<&'static str>,
}

impl Candidate {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn overlaps(&self, other: &Candidate) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Extracts clinical entities from free-text case descriptions
pub struct EntityExtractor {
    config: ExtractionConfig,
}

impl EntityExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Validate the case and extract entities from its text
    pub fn extract(&self, case: &ClinicalCase) -> Result<Vec<ExtractedEntity>> {
        if let Some(age) = case.age {
            if age > MAX_AGE {
                return Err(AppError::Extraction {
                    message: format!("age {} is out of range", age),
                });
            }
        }
        self.extract_text(&case.raw_text)
    }

    /// Extract entities, ordered by span start.
    ///
    /// Unrecognized text yields an empty list; only malformed input fails.
    pub fn extract_text(&self, text: &str) -> Result<Vec<ExtractedEntity>> {
        self.check_input(text)?;

        // ASCII lowercasing keeps byte offsets aligned with `text`
        let lowered = text.to_ascii_lowercase();
        let mut candidates = Vec::new();

        for m in LEXICON_REGEX.find_iter(&lowered) {
            if let Some(entry) = LEXICON_INDEX.get(m.as_str()) {
                candidates.push(Candidate {
                    start: m.start(),
                    end: m.end(),
                    entity_type: entry.entity_type,
                    confidence: entry.confidence,
                    normalized: entry.normalized,
                });
            }
        }

        for rule in RULES.iter() {
            for m in rule.regex.find_iter(&lowered) {
                let (start, end) = match rule.kind {
                    RuleKind::Plain => (m.start(), m.end()),
                    RuleKind::Suffix if SUFFIX_EXCLUSIONS.contains(&m.as_str()) => continue,
                    RuleKind::Suffix => (m.start(), m.end()),
                    RuleKind::PainPhrase => trim_function_word(m.as_str(), m.start(), m.end()),
                };
                candidates.push(Candidate {
                    start,
                    end,
                    entity_type: rule.entity_type,
                    confidence: rule.confidence,
                    normalized: None,
                });
            }
        }

        let mut entities: Vec<ExtractedEntity> = resolve_overlaps(candidates)
            .into_iter()
            .map(|c| self.to_entity(text, c))
            .collect();
        link_dosages(&mut entities, self.config.dosage_link_window);

        tracing::debug!(
            entities = entities.len(),
            low_confidence = entities.iter().filter(|e| e.low_confidence).count(),
            "Entities extracted"
        );
        Ok(entities)
    }

    fn check_input(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(AppError::Extraction {
                message: "case text is empty".to_string(),
            });
        }

        let chars = text.chars().count();
        if chars > self.config.max_case_chars {
            return Err(AppError::Extraction {
                message: format!(
                    "case text has {} characters, limit is {}",
                    chars, self.config.max_case_chars
                ),
            });
        }

        let control = text
            .chars()
            .filter(|c| c.is_control() && !c.is_whitespace())
            .count();
        if control * 2 > chars {
            return Err(AppError::Extraction {
                message: "case text is mostly non-printable characters".to_string(),
            });
        }

        Ok(())
    }

    fn to_entity(&self, text: &str, candidate: Candidate) -> ExtractedEntity {
        let low_confidence = candidate.confidence < self.config.confidence_threshold;
        ExtractedEntity {
            text: text[candidate.start..candidate.end].to_string(),
            entity_type: candidate.entity_type,
            start: candidate.start,
            end: candidate.end,
            confidence: candidate.confidence,
            low_confidence,
            review_status: if low_confidence {
                ReviewStatus::NeedsReview
            } else {
                ReviewStatus::AutoAccepted
            },
            normalized: candidate.normalized.map(str::to_string),
            linked_medication: None,
        }
    }
}

/// Drop a leading function word ("with pain" -> "pain")
fn trim_function_word(matched: &str, start: usize, end: usize) -> (usize, usize) {
    match matched.split_once(' ') {
        Some((first, _)) if FUNCTION_WORDS.contains(&first) => (start + first.len() + 1, end),
        _ => (start, end),
    }
}

/// Keep the most confident match of each overlapping group, longer spans
/// winning ties
fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.start.cmp(&b.start))
            .then_with(|| a.entity_type.cmp(&b.entity_type))
    });

    let mut selected: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !selected.iter().any(|s| s.overlaps(&candidate)) {
            selected.push(candidate);
        }
    }

    selected.sort_by_key(|c| (c.start, c.end));
    selected
}

/// Attach each dosage to the nearest medication within `window` bytes
fn link_dosages(entities: &mut [ExtractedEntity], window: usize) {
    let medications: Vec<(usize, usize, String)> = entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Medication)
        .map(|e| (e.start, e.end, e.canonical()))
        .collect();

    for entity in entities.iter_mut().filter(|e| e.entity_type == EntityType::Dosage) {
        let nearest = medications
            .iter()
            .map(|(start, end, name)| {
                let gap = if entity.start >= *end {
                    entity.start - end
                } else {
                    start.saturating_sub(entity.end)
                };
                (gap, name)
            })
            .filter(|(gap, _)| *gap <= window)
            .min_by_key(|(gap, _)| *gap);

        entity.linked_medication = nearest.map(|(_, name)| name.clone());
    }
}
