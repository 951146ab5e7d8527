//! Knowledge validation - cross-checks findings before they surface
//!
//! Provides:
//! - Retrieval support scoring (authority-weighted similarity of cited documents)
//! - Per-finding checks against the ontology and structured interaction data
//! - Suppression of contradicted findings and demotion of weak ones
//!
//! Confidence is only ever lowered here: the adjusted value is the minimum
//! of the incoming confidence, the retrieval support and the check pass
//! fraction.

use medforge_common::config::ValidationConfig;
use medforge_common::errors::AppError;
use medforge_common::metrics::record_suppressed;
use medforge_common::model::{
    AgentFinding, Citation, ClinicalCase, ContextBundle, EntityType, FindingKind,
    InteractionSeverity, RiskLevel, SuppressedFinding, ValidationEntry, ValidationOutcome,
    ValidationReport,
};
use medforge_knowledge::ConceptOntology;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Lookup similarity needed to treat a condition name as an ontology concept
const CONCEPT_MATCH_SIMILARITY: f32 = 0.8;

/// Authority-weighted mean similarity of the cited documents.
///
/// Citations that are not in the bundle are ignored; with none left the
/// configured unsupported score is used.
pub fn retrieval_support(citations: &[Citation], bundle: &ContextBundle, config: &ValidationConfig) -> f32 {
    let scores: Vec<f32> = citations
        .iter()
        .filter_map(|c| bundle.get(&c.doc_id))
        .map(|doc| config.authority.weight(doc.source_category) * doc.similarity_score)
        .collect();

    if scores.is_empty() {
        return config.unsupported_retrieval_score;
    }
    (scores.iter().sum::<f32>() / scores.len() as f32).clamp(0.0, 1.0)
}

/// Everything validation looks at for one request
pub struct ValidationInput<'a> {
    pub findings: Vec<AgentFinding>,
    pub bundle: &'a ContextBundle,
    pub case: &'a ClinicalCase,
    pub safety_level: RiskLevel,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Passed or demoted findings, confidence adjusted
    pub retained: Vec<AgentFinding>,
    pub suppressed: Vec<SuppressedFinding>,
    pub report: ValidationReport,
}

#[derive(Debug, Default)]
struct Checks {
    passed: u32,
    total: u32,
    reasons: Vec<String>,
    contradiction: Option<String>,
}

impl Checks {
    fn record(&mut self, passed: bool, failure: impl FnOnce() -> String) {
        self.total += 1;
        if passed {
            self.passed += 1;
        } else {
            self.reasons.push(failure());
        }
    }

    fn contradict(&mut self, reason: String) {
        self.total += 1;
        self.reasons.push(reason.clone());
        self.contradiction.get_or_insert(reason);
    }

    fn pass_fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.passed as f32 / self.total as f32
        }
    }
}

pub struct Validator {
    ontology: Arc<dyn ConceptOntology>,
    config: ValidationConfig,
    timeout: Duration,
}

impl Validator {
    pub fn new(ontology: Arc<dyn ConceptOntology>, config: ValidationConfig, timeout: Duration) -> Self {
        Self {
            ontology,
            config,
            timeout,
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate every finding, in order
    pub async fn validate(&self, input: ValidationInput<'_>) -> ValidationResult {
        let threshold = self.config.surface_thresholds.for_level(input.safety_level);
        let case_codes: BTreeSet<String> = input
            .bundle
            .concepts
            .iter()
            .map(|c| c.concept_code.clone())
            .collect();
        let patient_meds = patient_medications(input.case, input.bundle);

        let mut result = ValidationResult::default();
        for mut finding in input.findings {
            let mut checks = Checks::default();
            self.check_citations(&finding, input.bundle, &mut checks);

            match &finding.kind {
                FindingKind::DifferentialDiagnosis {
                    condition,
                    concept_code,
                    ..
                } => {
                    self.check_ontology(condition, concept_code.as_deref(), &case_codes, &mut checks)
                        .await
                }
                FindingKind::DrugInteractionAlert { drugs, .. } => {
                    self.check_interaction(&finding, drugs, input.bundle, &mut checks)
                }
                FindingKind::RecommendedAction { action, .. } => {
                    check_action_safety(action, &patient_meds, input.bundle, &mut checks)
                }
                FindingKind::PatientExplanation { .. } => {}
            }

            if finding.severity == RiskLevel::High {
                check_entity_basis(&mut finding, input.bundle, &patient_meds, &mut checks);
            }

            let pre_confidence = finding.confidence;
            let support = retrieval_support(&finding.citations, input.bundle, &self.config);
            let adjusted = pre_confidence.min(support).min(checks.pass_fraction()).clamp(0.0, 1.0);
            finding.confidence = adjusted;

            let outcome = if checks.contradiction.is_some() {
                ValidationOutcome::Failed
            } else if adjusted < threshold {
                ValidationOutcome::Demoted
            } else {
                ValidationOutcome::Pass
            };

            result.report.entries.push(ValidationEntry {
                finding_id: finding.id.clone(),
                outcome,
                checks_passed: checks.passed,
                checks_total: checks.total,
                pre_confidence,
                adjusted_confidence: adjusted,
                reasons: checks.reasons.clone(),
            });

            match outcome {
                ValidationOutcome::Failed => {
                    let reason = checks.contradiction.unwrap_or_default();
                    let err = AppError::ValidationFailed {
                        finding_id: finding.id.clone(),
                        reason: reason.clone(),
                    };
                    tracing::warn!(stage = %finding.stage, error = %err, "Finding suppressed");
                    record_suppressed(finding.stage);
                    result.suppressed.push(SuppressedFinding {
                        finding_id: finding.id.clone(),
                        stage: finding.stage,
                        headline: finding.headline(),
                        reason,
                    });
                }
                ValidationOutcome::Demoted => {
                    tracing::debug!(
                        finding_id = %finding.id,
                        confidence = adjusted,
                        threshold = threshold,
                        "Finding demoted below surface threshold"
                    );
                    finding.demoted = true;
                    result.retained.push(finding);
                }
                ValidationOutcome::Pass => result.retained.push(finding),
            }
        }

        tracing::debug!(
            retained = result.retained.len(),
            suppressed = result.suppressed.len(),
            demoted = result.report.count(ValidationOutcome::Demoted),
            "Validation complete"
        );
        result
    }

    fn check_citations(&self, finding: &AgentFinding, bundle: &ContextBundle, checks: &mut Checks) {
        let grounded = !finding.citations.is_empty()
            && finding.citations.iter().all(|c| bundle.get(&c.doc_id).is_some());
        checks.record(grounded, || {
            if finding.citations.is_empty() {
                "no supporting document".to_string()
            } else {
                "cites a document outside the context".to_string()
            }
        });
    }

    /// The condition must relate to something in the case. Skipped when the
    /// condition is not a known concept or the ontology cannot answer.
    async fn check_ontology(
        &self,
        condition: &str,
        concept_code: Option<&str>,
        case_codes: &BTreeSet<String>,
        checks: &mut Checks,
    ) {
        if case_codes.is_empty() {
            return;
        }

        let Some(code) = self.resolve_code(condition, concept_code).await else {
            return;
        };

        let related = match tokio::time::timeout(self.timeout, self.ontology.related(&code)).await {
            Ok(Ok(related)) => related,
            _ => {
                tracing::warn!(code = %code, "Ontology relations unavailable, skipping relation check");
                return;
            }
        };

        let connected = case_codes.contains(&code) || related.iter().any(|r| case_codes.contains(r));
        checks.record(connected, || {
            format!("{} ({}) is not related to any case concept", condition, code)
        });
    }

    /// A carried code is confirmed with the ontology; a missing or unknown one
    /// falls back to a name lookup. `None` skips the relation check.
    async fn resolve_code(&self, condition: &str, concept_code: Option<&str>) -> Option<String> {
        if let Some(code) = concept_code {
            match tokio::time::timeout(self.timeout, self.ontology.concept(code)).await {
                Ok(Ok(Some(concept))) => return Some(concept.code),
                Ok(Ok(None)) => {
                    tracing::debug!(code = %code, "Carried concept code unknown, looking up by name");
                }
                Ok(Err(e)) => {
                    tracing::warn!(code = %code, error = %e, "Ontology concept fetch failed, skipping relation check");
                    return None;
                }
                Err(_) => {
                    tracing::warn!(code = %code, "Ontology concept fetch timed out, skipping relation check");
                    return None;
                }
            }
        }

        match tokio::time::timeout(self.timeout, self.ontology.lookup(condition)).await {
            Ok(Ok(candidates)) => candidates
                .into_iter()
                .find(|c| c.lexical_similarity >= CONCEPT_MATCH_SIMILARITY)
                .map(|c| c.concept.code),
            Ok(Err(e)) => {
                tracing::warn!(condition = %condition, error = %e, "Ontology lookup failed, skipping relation check");
                None
            }
            Err(_) => {
                tracing::warn!(condition = %condition, "Ontology lookup timed out, skipping relation check");
                None
            }
        }
    }

    fn check_interaction(
        &self,
        finding: &AgentFinding,
        drugs: &[String],
        bundle: &ContextBundle,
        checks: &mut Checks,
    ) {
        let [a, b] = match drugs {
            [a, b, ..] => [a, b],
            _ => {
                checks.record(false, || "interaction names fewer than two drugs".to_string());
                return;
            }
        };

        let best_cited_authority = finding
            .citations
            .iter()
            .filter_map(|c| bundle.get(&c.doc_id))
            .map(|doc| self.config.authority.weight(doc.source_category))
            .fold(0.0_f32, f32::max);

        let records: Vec<_> = bundle.interactions().filter(|(_, r)| r.involves(a, b)).collect();

        let contradiction = records.iter().find(|(doc, record)| {
            record.severity == InteractionSeverity::None
                && self.config.authority.weight(doc.source_category) >= best_cited_authority
        });
        if let Some((doc, _)) = contradiction {
            checks.contradict(format!(
                "{} records no clinically significant interaction between {} and {}",
                doc.doc_id, a, b
            ));
            return;
        }

        let confirmed = records.iter().any(|(_, r)| r.severity > InteractionSeverity::None);
        checks.record(confirmed, || {
            format!("no structured interaction data for {} + {}", a, b)
        });
    }
}

/// Case medications plus medication entities, lowercased and deduplicated
pub(crate) fn patient_medications(case: &ClinicalCase, bundle: &ContextBundle) -> Vec<String> {
    let mut meds: Vec<String> = Vec::new();
    let candidates = case.medications.iter().map(|m| m.trim().to_lowercase()).chain(
        bundle
            .entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Medication)
            .map(|e| e.canonical()),
    );
    for med in candidates {
        if !med.is_empty() && !meds.contains(&med) {
            meds.push(med);
        }
    }
    meds
}

/// Whole-word, case-insensitive containment
pub(crate) fn mentions_term(text: &str, term: &str) -> bool {
    let normalize = |s: &str| {
        let words: Vec<String> = s
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();
        format!(" {} ", words.join(" "))
    };
    let term = normalize(term);
    if term.trim().is_empty() {
        return false;
    }
    normalize(text).contains(&term)
}

/// An action that introduces a drug with a HIGH/CRITICAL interaction against
/// a current medication is contradicted by the structured data.
fn check_action_safety(action: &str, patient_meds: &[String], bundle: &ContextBundle, checks: &mut Checks) {
    for (doc, record) in bundle.interactions() {
        if record.severity < InteractionSeverity::High {
            continue;
        }
        let pairs = [
            (&record.subject, &record.object),
            (&record.object, &record.subject),
        ];
        for (current, proposed) in pairs {
            let on_current = patient_meds.iter().any(|m| m.eq_ignore_ascii_case(current));
            let already_taking = patient_meds.iter().any(|m| m.eq_ignore_ascii_case(proposed));
            if on_current && !already_taking && mentions_term(action, proposed) {
                checks.contradict(format!(
                    "{} has a {:?} interaction with current medication {} ({})",
                    proposed, record.severity, current, doc.doc_id
                ));
                return;
            }
        }
    }
    checks.record(true, String::new);
}

/// HIGH claims need at least one confident entity or a listed medication behind them
fn check_entity_basis(
    finding: &mut AgentFinding,
    bundle: &ContextBundle,
    patient_meds: &[String],
    checks: &mut Checks,
) {
    let confident: Vec<String> = bundle
        .entities
        .iter()
        .filter(|e| !e.low_confidence)
        .flat_map(|e| [e.canonical(), e.text.to_lowercase()])
        .collect();

    let strong = if finding.evidence.is_empty() {
        !confident.is_empty() || !patient_meds.is_empty()
    } else {
        finding.evidence.iter().any(|term| {
            let term = term.trim().to_lowercase();
            !term.is_empty()
                && (confident
                    .iter()
                    .any(|e| e == &term || mentions_term(&term, e) || mentions_term(e, &term))
                    || patient_meds.contains(&term))
        })
    };

    if !strong {
        finding.severity = RiskLevel::Medium;
    }
    checks.record(strong, || {
        "HIGH severity rests only on low-confidence entities; capped to MEDIUM".to_string()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::document;
    use async_trait::async_trait;
    use medforge_common::errors::Result;
    use medforge_common::model::{
        ExtractedEntity, InteractionRecord, LinkedConcept, ReviewStatus, SourceCategory, StageName,
        Urgency,
    };
    use medforge_knowledge::{ConceptCandidate, InMemoryOntology, OntologyConcept};

    struct DownOntology;

    #[async_trait]
    impl ConceptOntology for DownOntology {
        async fn lookup(&self, _text: &str) -> Result<Vec<ConceptCandidate>> {
            Err(AppError::OntologyUnavailable {
                message: "down".into(),
            })
        }

        async fn related(&self, _code: &str) -> Result<BTreeSet<String>> {
            Err(AppError::OntologyUnavailable {
                message: "down".into(),
            })
        }

        async fn concept(&self, _code: &str) -> Result<Option<OntologyConcept>> {
            Ok(None)
        }
    }

    fn validator() -> Validator {
        Validator::new(
            Arc::new(InMemoryOntology::with_defaults()),
            ValidationConfig::default(),
            Duration::from_millis(500),
        )
    }

    fn entity(text: &str, entity_type: EntityType, confidence: f32) -> ExtractedEntity {
        ExtractedEntity {
            text: text.into(),
            entity_type,
            start: 0,
            end: text.len(),
            confidence,
            low_confidence: confidence < 0.5,
            review_status: if confidence < 0.5 {
                ReviewStatus::NeedsReview
            } else {
                ReviewStatus::AutoAccepted
            },
            normalized: None,
            linked_medication: None,
        }
    }

    fn concept(code: &str, label: &str) -> LinkedConcept {
        LinkedConcept {
            entity: entity(&label.to_lowercase(), EntityType::Symptom, 0.9),
            concept_code: code.into(),
            concept_label: label.into(),
            related_codes: BTreeSet::new(),
            linker_score: 0.9,
            rank: 0,
        }
    }

    fn chest_pain_bundle() -> ContextBundle {
        let mut drug = document("lisinopril-monograph", SourceCategory::DrugDb, 0.8);
        drug.interactions = vec![InteractionRecord {
            subject: "lisinopril".into(),
            object: "spironolactone".into(),
            severity: InteractionSeverity::High,
            description: "hyperkalemia".into(),
        }];
        ContextBundle {
            documents: vec![document("aha-chest-pain-2021", SourceCategory::Guideline, 0.9), drug],
            entities: vec![
                entity("chest pain", EntityType::Symptom, 0.9),
                entity("lisinopril", EntityType::Medication, 0.9),
            ],
            concepts: vec![concept("SCT:29857009", "Chest pain"), concept("SCT:38341003", "Hypertension")],
            ..ContextBundle::default()
        }
    }

    fn cite(bundle: &ContextBundle, doc_id: &str) -> Vec<Citation> {
        vec![Citation::from_document(bundle.get(doc_id).unwrap())]
    }

    fn differential(id: &str, condition: &str, confidence: f32) -> AgentFinding {
        AgentFinding::new(
            id,
            StageName::ClinicalReasoning,
            FindingKind::DifferentialDiagnosis {
                condition: condition.into(),
                probability: 0.5,
                concept_code: None,
            },
            RiskLevel::High,
        )
        .with_confidence(confidence)
        .with_evidence(vec!["chest pain".into()])
    }

    fn input<'a>(findings: Vec<AgentFinding>, bundle: &'a ContextBundle, case: &'a ClinicalCase) -> ValidationInput<'a> {
        ValidationInput {
            findings,
            bundle,
            case,
            safety_level: RiskLevel::Medium,
        }
    }

    #[test]
    fn test_retrieval_support_weights_authority() {
        let bundle = chest_pain_bundle();
        let config = ValidationConfig::default();

        let guideline = retrieval_support(&cite(&bundle, "aha-chest-pain-2021"), &bundle, &config);
        assert!((guideline - 0.9).abs() < 1e-6);

        let mut both = cite(&bundle, "aha-chest-pain-2021");
        both.extend(cite(&bundle, "lisinopril-monograph"));
        let mixed = retrieval_support(&both, &bundle, &config);
        assert!((mixed - (0.9 + 0.9 * 0.8) / 2.0).abs() < 1e-6);

        assert_eq!(retrieval_support(&[], &bundle, &config), 0.25);
    }

    #[tokio::test]
    async fn test_related_cited_differential_passes() {
        let bundle = chest_pain_bundle();
        let case = ClinicalCase::new("chest pain").with_medications(["lisinopril"]);
        let finding = differential("clinical_reasoning-1", "Acute coronary syndrome", 0.8)
            .with_citations(cite(&bundle, "aha-chest-pain-2021"));

        let result = validator().validate(input(vec![finding], &bundle, &case)).await;
        let entry = result.report.get("clinical_reasoning-1").unwrap();
        assert_eq!(entry.outcome, ValidationOutcome::Pass);
        assert_eq!(entry.checks_passed, entry.checks_total);
        assert!((result.retained[0].confidence - 0.8).abs() < 1e-6);
        assert_eq!(result.retained[0].severity, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_stale_concept_code_falls_back_to_name() {
        let bundle = chest_pain_bundle();
        let case = ClinicalCase::new("chest pain");
        let coded = |code: &str| {
            AgentFinding::new(
                "clinical_reasoning-1",
                StageName::ClinicalReasoning,
                FindingKind::DifferentialDiagnosis {
                    condition: "Acute coronary syndrome".into(),
                    probability: 0.5,
                    concept_code: Some(code.into()),
                },
                RiskLevel::High,
            )
            .with_confidence(0.8)
            .with_evidence(vec!["chest pain".into()])
            .with_citations(cite(&bundle, "aha-chest-pain-2021"))
        };

        for code in ["SCT:29857009", "SCT:unknown"] {
            let result = validator().validate(input(vec![coded(code)], &bundle, &case)).await;
            let entry = result.report.get("clinical_reasoning-1").unwrap();
            assert_eq!(entry.outcome, ValidationOutcome::Pass);
            assert_eq!(entry.checks_passed, entry.checks_total);
        }
    }

    #[tokio::test]
    async fn test_unrelated_uncited_differential_is_demoted() {
        let bundle = chest_pain_bundle();
        let case = ClinicalCase::new("chest pain");
        let finding = differential("clinical_reasoning-1", "Urinary tract infection", 0.9);

        let result = validator().validate(input(vec![finding], &bundle, &case)).await;
        let entry = result.report.get("clinical_reasoning-1").unwrap();
        assert_eq!(entry.outcome, ValidationOutcome::Demoted);
        assert!(entry.adjusted_confidence <= 0.25);
        assert!(result.retained[0].demoted);
        assert!(!result.retained[0].supported);
    }

    #[tokio::test]
    async fn test_confidence_never_increases() {
        let bundle = chest_pain_bundle();
        let case = ClinicalCase::new("chest pain");
        let findings = vec![
            differential("a", "Acute coronary syndrome", 0.3).with_citations(cite(&bundle, "aha-chest-pain-2021")),
            differential("b", "Pulmonary embolism", 1.0),
            differential("c", "Gastroesophageal reflux disease", 0.0),
        ];
        let pre: Vec<f32> = findings.iter().map(|f| f.confidence).collect();

        let result = validator().validate(input(findings, &bundle, &case)).await;
        for (entry, pre) in result.report.entries.iter().zip(pre) {
            assert_eq!(entry.pre_confidence, pre);
            assert!(entry.adjusted_confidence <= pre);
            assert!((0.0..=1.0).contains(&entry.adjusted_confidence));
        }
    }

    #[tokio::test]
    async fn test_explicit_no_interaction_record_suppresses_alert() {
        let mut bundle = chest_pain_bundle();
        let mut label = document("fda-label-aspirin", SourceCategory::Guideline, 0.7);
        label.interactions = vec![InteractionRecord {
            subject: "aspirin".into(),
            object: "lisinopril".into(),
            severity: InteractionSeverity::None,
            description: String::new(),
        }];
        bundle.documents.push(label);
        let case = ClinicalCase::new("on lisinopril and aspirin");

        let alert = AgentFinding::new(
            "drug_interaction-1",
            StageName::DrugInteraction,
            FindingKind::DrugInteractionAlert {
                drugs: vec!["lisinopril".into(), "aspirin".into()],
                severity: InteractionSeverity::Moderate,
                description: "claimed interaction".into(),
            },
            RiskLevel::Medium,
        )
        .with_confidence(0.7)
        .with_citations(cite(&bundle, "lisinopril-monograph"));

        let result = validator().validate(input(vec![alert], &bundle, &case)).await;
        assert!(result.retained.is_empty());
        assert_eq!(result.suppressed.len(), 1);
        assert!(result.suppressed[0].reason.contains("fda-label-aspirin"));
        assert_eq!(result.report.count(ValidationOutcome::Failed), 1);
    }

    #[tokio::test]
    async fn test_action_conflicting_with_current_medication_fails() {
        let bundle = chest_pain_bundle();
        let case = ClinicalCase::new("on lisinopril").with_medications(["Lisinopril"]);
        let action = AgentFinding::new(
            "clinical_reasoning-2",
            StageName::ClinicalReasoning,
            FindingKind::RecommendedAction {
                action: "Start spironolactone 25 mg daily".into(),
                urgency: Urgency::Routine,
            },
            RiskLevel::Low,
        )
        .with_confidence(0.8)
        .with_citations(cite(&bundle, "lisinopril-monograph"));

        let result = validator().validate(input(vec![action], &bundle, &case)).await;
        assert_eq!(result.suppressed.len(), 1);
        assert_eq!(result.suppressed[0].stage, StageName::ClinicalReasoning);
    }

    #[tokio::test]
    async fn test_high_claim_on_weak_entities_capped_to_medium() {
        let mut bundle = chest_pain_bundle();
        bundle.entities = vec![entity("sudden onset", EntityType::Symptom, 0.4)];
        let case = ClinicalCase::new("sudden onset at rest");
        let finding = differential("clinical_reasoning-1", "Acute coronary syndrome", 0.9)
            .with_evidence(vec!["sudden onset".into()])
            .with_citations(cite(&bundle, "aha-chest-pain-2021"));

        let result = validator().validate(input(vec![finding], &bundle, &case)).await;
        assert_eq!(result.retained[0].severity, RiskLevel::Medium);
        let entry = result.report.get("clinical_reasoning-1").unwrap();
        assert!(entry.checks_passed < entry.checks_total);
    }

    #[tokio::test]
    async fn test_ontology_outage_skips_relation_check() {
        let bundle = chest_pain_bundle();
        let case = ClinicalCase::new("chest pain");
        let validator = Validator::new(Arc::new(DownOntology), ValidationConfig::default(), Duration::from_millis(100));
        let finding = differential("clinical_reasoning-1", "Acute coronary syndrome", 0.8)
            .with_citations(cite(&bundle, "aha-chest-pain-2021"));

        let result = validator.validate(input(vec![finding], &bundle, &case)).await;
        let entry = result.report.get("clinical_reasoning-1").unwrap();
        // citation + entity basis only
        assert_eq!(entry.checks_total, 2);
        assert_eq!(entry.outcome, ValidationOutcome::Pass);
    }

    #[test]
    fn test_mentions_term_whole_words() {
        assert!(mentions_term("Give aspirin 325 mg now", "aspirin"));
        assert!(!mentions_term("aspirinate", "aspirin"));
        assert!(mentions_term("low dose potassium chloride", "Potassium Chloride"));
        assert!(!mentions_term("anything", ""));
    }
}
