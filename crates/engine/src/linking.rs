//! Concept linking - resolve extracted entities to ontology concepts
//!
//! Every entity is looked up concurrently under the ontology timeout. Ambiguous
//! entities keep up to `top_k` ranked candidates; an ontology failure leaves
//! the entity unlinked.

use futures::future::join_all;
use medforge_common::config::LinkingConfig;
use medforge_common::errors::{AppError, Result};
use medforge_common::model::{EntityType, ExtractedEntity, LinkedConcept, LinkingResult};
use medforge_knowledge::{ConceptCandidate, ConceptOntology};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

pub struct ConceptLinker {
    ontology: Arc<dyn ConceptOntology>,
    config: LinkingConfig,
    timeout: Duration,
}

impl ConceptLinker {
    pub fn new(ontology: Arc<dyn ConceptOntology>, config: LinkingConfig, timeout: Duration) -> Self {
        Self {
            ontology,
            config,
            timeout,
        }
    }

    /// Composite ranking score of a candidate
    pub fn score(&self, candidate: &ConceptCandidate) -> f32 {
        self.config.lexical_weight * candidate.lexical_similarity
            + self.config.frequency_weight * candidate.concept.frequency
    }

    /// Link every entity; dosages are never looked up
    pub async fn link(&self, entities: &[ExtractedEntity]) -> LinkingResult {
        let lookups = entities.iter().map(|entity| async move {
            if entity.entity_type == EntityType::Dosage {
                return (entity, Vec::new());
            }
            match self.link_entity(entity).await {
                Ok(concepts) => (entity, concepts),
                Err(e) => {
                    tracing::warn!(entity = %entity.text, error = %e, "Concept lookup failed, entity left unlinked");
                    (entity, Vec::new())
                }
            }
        });

        let mut result = LinkingResult::default();
        for (entity, concepts) in join_all(lookups).await {
            if concepts.is_empty() {
                result.unlinked.push(entity.clone());
            } else {
                result.linked.extend(concepts);
            }
        }

        tracing::debug!(
            linked = result.linked.len(),
            unlinked = result.unlinked.len(),
            "Concepts linked"
        );
        result
    }

    async fn link_entity(&self, entity: &ExtractedEntity) -> Result<Vec<LinkedConcept>> {
        let term = entity.canonical();
        let candidates = self.bounded(self.ontology.lookup(&term)).await?;

        let mut eligible: Vec<ConceptCandidate> = candidates
            .into_iter()
            .filter(|c| c.lexical_similarity >= self.config.min_lexical_similarity)
            .collect();

        // Prefer concepts of the entity's own semantic type when any exist
        if eligible.iter().any(|c| c.concept.semantic_type == entity.entity_type) {
            eligible.retain(|c| c.concept.semantic_type == entity.entity_type);
        }

        let mut scored: Vec<(f32, ConceptCandidate)> =
            eligible.into_iter().map(|c| (self.score(&c), c)).collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.concept.code.cmp(&b.1.concept.code))
        });
        scored.truncate(self.config.top_k);

        let mut linked = Vec::with_capacity(scored.len());
        for (rank, (score, candidate)) in scored.into_iter().enumerate() {
            let related = match self.bounded(self.ontology.related(&candidate.concept.code)).await {
                Ok(related) => related,
                Err(e) => {
                    tracing::warn!(code = %candidate.concept.code, error = %e, "Related concept lookup failed");
                    BTreeSet::new()
                }
            };
            linked.push(LinkedConcept {
                entity: entity.clone(),
                concept_code: candidate.concept.code,
                concept_label: candidate.concept.label,
                related_codes: related,
                linker_score: score.clamp(0.0, 1.0),
                rank,
            });
        }

        Ok(linked)
    }

    async fn bounded<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::OntologyUnavailable {
                message: format!("lookup exceeded {}ms", self.timeout.as_millis()),
            }),
        }
    }
}
