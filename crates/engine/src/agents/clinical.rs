//! Stage 1: clinical reasoning
//!
//! Ranked differentials (probabilities summing to at most one) and
//! recommended actions, each citing the bundle.

use super::parse::{parse_response, resolve_citations, ActionItem, ClinicalResponse, DifferentialItem};
use super::{finding_id, prompt, FeedbackBudget, StageOutput, StageRun};
use medforge_common::model::{
    AgentFinding, ContextBundle, FindingKind, RiskLevel, SourceCategory, StageName, Urgency,
};
use std::cmp::Ordering;

const STAGE: StageName = StageName::ClinicalReasoning;

pub(crate) async fn run(run: &StageRun<'_>, mut bundle: ContextBundle, mut budget: FeedbackBudget) -> StageOutput {
    if !run.has_backend() {
        return StageOutput::degraded(bundle, "no generative backend available");
    }

    if !bundle.has_category(SourceCategory::Guideline) {
        let query = guideline_query(&bundle, &run.case.raw_text);
        run.feedback(STAGE, &mut budget, &mut bundle, &query, vec![SourceCategory::Guideline])
            .await;
    }

    let config = run.config();
    let request = prompt::clinical_reasoning(run.case, &bundle, config.max_differentials, config.max_tokens);
    let raw = match run.generate(STAGE, &request).await {
        Ok(raw) => raw,
        Err(e) => return StageOutput::degraded(bundle, e.to_string()),
    };
    let response: ClinicalResponse = match parse_response(&raw) {
        Ok(response) => response,
        Err(e) => return StageOutput::degraded(bundle, format!("unparseable response: {}", e)),
    };

    let mut findings = differentials(run, &bundle, response.differentials);
    let offset = findings.len();
    findings.extend(actions(run, &bundle, response.actions, offset));

    tracing::debug!(
        findings = findings.len(),
        documents = bundle.documents.len(),
        "Clinical reasoning complete"
    );
    StageOutput {
        findings,
        bundle,
        degraded: None,
    }
}

/// Linked concept labels, or the case text when nothing linked
fn guideline_query(bundle: &ContextBundle, case_text: &str) -> String {
    let mut labels: Vec<&str> = bundle
        .concepts
        .iter()
        .filter(|c| c.rank == 0)
        .map(|c| c.concept_label.as_str())
        .collect();
    labels.dedup();
    if labels.is_empty() {
        case_text.to_string()
    } else {
        labels.join(" ")
    }
}

/// Code of the best-ranked linked concept named by `condition`, by label or
/// by the entity it was linked from
fn linked_code(bundle: &ContextBundle, condition: &str) -> Option<String> {
    let wanted = condition.to_lowercase();
    bundle
        .concepts
        .iter()
        .filter(|c| c.concept_label.to_lowercase() == wanted || c.entity.canonical() == wanted)
        .min_by_key(|c| c.rank)
        .map(|c| c.concept_code.clone())
}

/// Clamp each probability to [0, 1] and scale the set down if it sums above 1
pub(crate) fn normalize_probabilities(probabilities: &mut [f32]) {
    for p in probabilities.iter_mut() {
        *p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    }
    let sum: f32 = probabilities.iter().sum();
    if sum > 1.0 {
        for p in probabilities.iter_mut() {
            *p /= sum;
        }
    }
}

fn severity_for(item: &DifferentialItem, probability: f32) -> RiskLevel {
    match item.severity.as_deref().map(|s| s.trim().to_ascii_uppercase()) {
        Some(s) if s == "HIGH" => RiskLevel::High,
        Some(s) if s == "MEDIUM" || s == "MODERATE" => RiskLevel::Medium,
        Some(s) if s == "LOW" => RiskLevel::Low,
        _ if probability >= 0.5 => RiskLevel::High,
        _ if probability >= 0.2 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

fn differentials(run: &StageRun<'_>, bundle: &ContextBundle, items: Vec<DifferentialItem>) -> Vec<AgentFinding> {
    let config = run.config();
    let mut items: Vec<DifferentialItem> = items
        .into_iter()
        .filter(|item| !item.condition.trim().is_empty())
        .collect();

    let mut probabilities: Vec<f32> = items.iter().map(|i| i.probability).collect();
    normalize_probabilities(&mut probabilities);
    for (item, p) in items.iter_mut().zip(probabilities) {
        item.probability = p;
    }

    items.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.condition.cmp(&b.condition))
    });
    items.truncate(config.max_differentials);

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let citations = resolve_citations(&item.citations, bundle);
            let backend_confidence = item.confidence.unwrap_or(config.default_backend_confidence);
            let confidence = run.confidence(&citations, bundle, backend_confidence);
            let severity = severity_for(&item, item.probability);
            let condition = item.condition.trim().to_string();
            let concept_code = linked_code(bundle, &condition);

            AgentFinding::new(
                finding_id(STAGE, i),
                STAGE,
                FindingKind::DifferentialDiagnosis {
                    condition,
                    probability: item.probability,
                    concept_code,
                },
                severity,
            )
            .with_citations(citations)
            .with_backend_confidence(item.confidence)
            .with_evidence(item.evidence)
            .with_confidence(confidence)
        })
        .collect()
}

fn actions(run: &StageRun<'_>, bundle: &ContextBundle, items: Vec<ActionItem>, offset: usize) -> Vec<AgentFinding> {
    let config = run.config();
    items
        .into_iter()
        .filter(|item| !item.action.trim().is_empty())
        .enumerate()
        .map(|(i, item)| {
            let urgency = item.urgency.as_deref().map_or(Urgency::Routine, Urgency::parse);
            let citations = resolve_citations(&item.citations, bundle);
            let backend_confidence = item.confidence.unwrap_or(config.default_backend_confidence);
            let confidence = run.confidence(&citations, bundle, backend_confidence);

            AgentFinding::new(
                finding_id(STAGE, offset + i),
                STAGE,
                FindingKind::RecommendedAction {
                    action: item.action.trim().to_string(),
                    urgency,
                },
                urgency.severity(),
            )
            .with_citations(citations)
            .with_backend_confidence(item.confidence)
            .with_evidence(item.evidence)
            .with_confidence(confidence)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use medforge_common::model::{EntityType, ExtractedEntity, LinkedConcept, ReviewStatus};
    use std::collections::BTreeSet;

    fn linked(text: &str, code: &str, label: &str, rank: usize) -> LinkedConcept {
        LinkedConcept {
            entity: ExtractedEntity {
                text: text.into(),
                entity_type: EntityType::Disease,
                start: 0,
                end: text.len(),
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
            rank,
        }
    }

    #[test]
    fn test_linked_code_by_label_or_entity() {
        let bundle = ContextBundle {
            concepts: vec![
                linked("htn", "SCT:0000", "Hypertensive crisis", 1),
                linked("htn", "SCT:38341003", "Hypertension", 0),
            ],
            ..ContextBundle::default()
        };
        assert_eq!(linked_code(&bundle, "hypertension").as_deref(), Some("SCT:38341003"));
        assert_eq!(linked_code(&bundle, "HTN").as_deref(), Some("SCT:38341003"));
        assert_eq!(linked_code(&bundle, "Pulmonary embolism"), None);
    }

    #[test]
    fn test_probabilities_clamped_and_scaled() {
        let mut p = vec![0.8, 0.6, -0.2, 1.4];
        normalize_probabilities(&mut p);
        // clamped to [0.8, 0.6, 0.0, 1.0], sum 2.4
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(p[2], 0.0);
        assert!(p[3] > p[0] && p[0] > p[1]);

        let mut under = vec![0.3, 0.2];
        normalize_probabilities(&mut under);
        assert_eq!(under, vec![0.3, 0.2]);

        let mut nan = vec![f32::NAN, 0.4];
        normalize_probabilities(&mut nan);
        assert_eq!(nan, vec![0.0, 0.4]);
    }

    #[test]
    fn test_severity_from_label_or_probability() {
        let mut item = DifferentialItem {
            condition: "ACS".into(),
            ..DifferentialItem::default()
        };
        assert_eq!(severity_for(&item, 0.6), RiskLevel::High);
        assert_eq!(severity_for(&item, 0.3), RiskLevel::Medium);
        assert_eq!(severity_for(&item, 0.1), RiskLevel::Low);

        item.severity = Some("high".into());
        assert_eq!(severity_for(&item, 0.05), RiskLevel::High);
    }
}
