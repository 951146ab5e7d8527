//! Result aggregation - findings to the final recommendation record
//!
//! Provides:
//! - Partitioning of supported and unsupported findings
//! - Presentation ordering (demoted findings last)
//! - Risk stratification and weakest-link confidence
//! - Citation deduplication
//! - The labeled rule-based record for FALLBACK

use chrono::Utc;
use medforge_common::model::{
    AgentFinding, Citation, ClinicalRecommendation, EntitySummary, FindingKind, OperatingMode,
    RiskLevel, StageName, SuppressedFinding, ValidationReport, FALLBACK_LABEL,
};
use std::cmp::Ordering;
use std::time::Instant;
use uuid::Uuid;

/// Minimum confidence across retained HIGH/MEDIUM findings.
///
/// Falls back to the minimum across all findings when none are HIGH or
/// MEDIUM, and to 0.0 when there are none.
pub fn weakest_link(findings: &[AgentFinding]) -> f32 {
    min_confidence(findings.iter().filter(|f| f.severity >= RiskLevel::Medium))
        .or_else(|| min_confidence(findings.iter()))
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

fn min_confidence<'a>(findings: impl Iterator<Item = &'a AgentFinding>) -> Option<f32> {
    findings.map(|f| f.confidence).reduce(f32::min)
}

/// Everything the aggregator needs from one pipeline run
#[derive(Debug)]
pub struct AggregateInput {
    pub case_id: Uuid,
    /// Retained findings, including the patient explanation
    pub findings: Vec<AgentFinding>,
    pub suppressed: Vec<SuppressedFinding>,
    pub report: ValidationReport,
    pub degraded: Vec<StageName>,
    /// The plan left clinical reasoning out, so nothing assessed the presentation
    pub reasoning_skipped: bool,
    pub entity_summary: EntitySummary,
    pub mode: OperatingMode,
    pub started: Instant,
}

#[derive(Debug, Default, Clone)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(&self, input: AggregateInput) -> ClinicalRecommendation {
        self.assemble(input, false)
    }

    /// Rule output carries no citations, so it is surfaced rather than set aside
    fn assemble(&self, input: AggregateInput, surface_uncited: bool) -> ClinicalRecommendation {
        let overall_confidence = weakest_link(&input.findings);
        let incomplete = !input.degraded.is_empty() || input.reasoning_skipped;
        let risk_level = risk_level(&input.findings, incomplete);

        let mut differentials = Vec::new();
        let mut actions = Vec::new();
        let mut alerts = Vec::new();
        let mut unsupported = Vec::new();
        let mut explanation = None;

        for finding in input.findings {
            match &finding.kind {
                FindingKind::PatientExplanation { .. } => {
                    explanation.get_or_insert(finding);
                }
                _ if !finding.supported && !surface_uncited => unsupported.push(finding),
                FindingKind::DifferentialDiagnosis { .. } => differentials.push(finding),
                FindingKind::RecommendedAction { .. } => actions.push(finding),
                FindingKind::DrugInteractionAlert { .. } => alerts.push(finding),
            }
        }

        differentials.sort_by(differential_order);
        actions.sort_by(action_order);
        alerts.sort_by(alert_order);

        let citations = collect_citations(
            differentials
                .iter()
                .chain(actions.iter())
                .chain(alerts.iter())
                .chain(explanation.iter()),
        );

        let requires_human_review = input.mode == OperatingMode::Fallback
            || !input.suppressed.is_empty()
            || incomplete
            || !unsupported.is_empty()
            || differentials
                .iter()
                .chain(actions.iter())
                .chain(alerts.iter())
                .any(|f| f.demoted);

        ClinicalRecommendation {
            id: Uuid::new_v4(),
            case_id: input.case_id,
            risk_level,
            differentials,
            actions,
            interaction_alerts: alerts,
            patient_explanation: explanation,
            unsupported_findings: unsupported,
            overall_confidence,
            citations,
            operating_mode: input.mode,
            processing_latency_ms: input.started.elapsed().as_millis() as u64,
            label: None,
            degraded_stages: input.degraded,
            suppressed_findings: input.suppressed,
            requires_human_review,
            entity_summary: input.entity_summary,
            validation: input.report,
            error: None,
            generated_at: Utc::now(),
        }
    }

    /// Record for FALLBACK mode: rule output only, no citations, labeled
    pub fn fallback(
        &self,
        case_id: Uuid,
        findings: Vec<AgentFinding>,
        entity_summary: EntitySummary,
        started: Instant,
    ) -> ClinicalRecommendation {
        let findings = findings
            .into_iter()
            .map(|mut f| {
                f.citations.clear();
                f.supported = false;
                f
            })
            .collect();
        let mut record = self.assemble(
            AggregateInput {
                case_id,
                findings,
                suppressed: Vec::new(),
                report: ValidationReport::default(),
                degraded: Vec::new(),
                reasoning_skipped: false,
                entity_summary,
                mode: OperatingMode::Fallback,
                started,
            },
            true,
        );

        if record.findings().next().is_none() {
            record.risk_level = RiskLevel::Medium;
        }
        record.citations.clear();
        record.label = Some(FALLBACK_LABEL.to_string());
        record.requires_human_review = true;
        record
    }
}

/// Highest severity among non-explanation findings. With nothing to go on
/// and an incomplete run, the case is not presumed safe.
fn risk_level(findings: &[AgentFinding], incomplete: bool) -> RiskLevel {
    let max = findings
        .iter()
        .filter(|f| !matches!(f.kind, FindingKind::PatientExplanation { .. }))
        .map(|f| f.severity)
        .max();
    match max {
        Some(level) => level,
        None if incomplete => RiskLevel::Medium,
        None => RiskLevel::Low,
    }
}

fn collect_citations<'a>(findings: impl Iterator<Item = &'a AgentFinding>) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();
    for citation in findings.flat_map(|f| f.citations.iter()) {
        if !citations.iter().any(|c| c.doc_id == citation.doc_id) {
            citations.push(citation.clone());
        }
    }
    citations
}

fn probability(finding: &AgentFinding) -> f32 {
    match finding.kind {
        FindingKind::DifferentialDiagnosis { probability, .. } => probability,
        _ => 0.0,
    }
}

fn differential_order(a: &AgentFinding, b: &AgentFinding) -> Ordering {
    a.demoted
        .cmp(&b.demoted)
        .then_with(|| {
            probability(b)
                .partial_cmp(&probability(a))
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.headline().cmp(&b.headline()))
}

fn action_order(a: &AgentFinding, b: &AgentFinding) -> Ordering {
    let urgency = |f: &AgentFinding| match &f.kind {
        FindingKind::RecommendedAction { urgency, .. } => Some(*urgency),
        _ => None,
    };
    a.demoted
        .cmp(&b.demoted)
        .then_with(|| urgency(a).cmp(&urgency(b)))
        .then_with(|| a.id.cmp(&b.id))
}

fn alert_order(a: &AgentFinding, b: &AgentFinding) -> Ordering {
    let severity = |f: &AgentFinding| match &f.kind {
        FindingKind::DrugInteractionAlert { severity, .. } => Some(*severity),
        _ => None,
    };
    a.demoted
        .cmp(&b.demoted)
        .then_with(|| severity(b).cmp(&severity(a)))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use medforge_common::model::{FindingSource, InteractionSeverity, Urgency};

    fn differential(id: &str, condition: &str, probability: f32, severity: RiskLevel, confidence: f32) -> AgentFinding {
        AgentFinding::new(
            id,
            StageName::ClinicalReasoning,
            FindingKind::DifferentialDiagnosis {
                condition: condition.into(),
                probability,
                concept_code: None,
            },
            severity,
        )
        .with_confidence(confidence)
        .with_citations(vec![Citation {
            doc_id: format!("doc-{}", id),
            excerpt: String::new(),
        }])
    }

    fn input(findings: Vec<AgentFinding>) -> AggregateInput {
        AggregateInput {
            case_id: Uuid::new_v4(),
            findings,
            suppressed: Vec::new(),
            report: ValidationReport::default(),
            degraded: Vec::new(),
            reasoning_skipped: false,
            entity_summary: EntitySummary::default(),
            mode: OperatingMode::Full,
            started: Instant::now(),
        }
    }

    #[test]
    fn test_weakest_link() {
        let findings = vec![
            differential("a", "A", 0.3, RiskLevel::High, 0.9),
            differential("b", "B", 0.3, RiskLevel::Medium, 0.6),
            differential("c", "C", 0.3, RiskLevel::High, 0.95),
        ];
        assert!((weakest_link(&findings) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_weakest_link_ignores_low_unless_alone() {
        let findings = vec![
            differential("a", "A", 0.3, RiskLevel::High, 0.8),
            differential("b", "B", 0.1, RiskLevel::Low, 0.2),
        ];
        assert!((weakest_link(&findings) - 0.8).abs() < 1e-6);

        let low_only = vec![differential("b", "B", 0.1, RiskLevel::Low, 0.2)];
        assert!((weakest_link(&low_only) - 0.2).abs() < 1e-6);
        assert_eq!(weakest_link(&[]), 0.0);
    }

    #[test]
    fn test_ordering_and_partitioning() {
        let mut demoted = differential("d", "Demoted", 0.9, RiskLevel::Medium, 0.3);
        demoted.demoted = true;
        let mut uncited = differential("u", "Uncited", 0.2, RiskLevel::Low, 0.25);
        uncited.citations.clear();
        uncited.supported = false;

        let rec = ResultAggregator::new().aggregate(input(vec![
            differential("b", "Beta", 0.2, RiskLevel::Medium, 0.7),
            demoted,
            differential("a", "Alpha", 0.5, RiskLevel::High, 0.8),
            uncited,
        ]));

        let order: Vec<&str> = rec.differentials.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "d"]);
        assert_eq!(rec.unsupported_findings.len(), 1);
        assert_eq!(rec.risk_level, RiskLevel::High);
        assert!(rec.requires_human_review);
        assert_eq!(rec.citations.len(), 3);
        assert!(rec.label.is_none());
    }

    #[test]
    fn test_alerts_by_severity_and_actions_by_urgency() {
        let alert = |id: &str, severity: InteractionSeverity| {
            AgentFinding::new(
                id,
                StageName::DrugInteraction,
                FindingKind::DrugInteractionAlert {
                    drugs: vec!["x".into(), "y".into()],
                    severity,
                    description: String::new(),
                },
                RiskLevel::Medium,
            )
            .with_citations(vec![Citation {
                doc_id: "drug".into(),
                excerpt: String::new(),
            }])
        };
        let action = |id: &str, urgency: Urgency| {
            AgentFinding::new(
                id,
                StageName::ClinicalReasoning,
                FindingKind::RecommendedAction {
                    action: id.into(),
                    urgency,
                },
                urgency.severity(),
            )
            .with_citations(vec![Citation {
                doc_id: "guide".into(),
                excerpt: String::new(),
            }])
        };

        let rec = ResultAggregator::new().aggregate(input(vec![
            alert("low", InteractionSeverity::Low),
            alert("critical", InteractionSeverity::Critical),
            action("routine", Urgency::Routine),
            action("now", Urgency::Immediate),
        ]));
        assert_eq!(rec.interaction_alerts[0].id, "critical");
        assert_eq!(rec.actions[0].id, "now");
        assert_eq!(rec.citations.len(), 2);
        assert!(!rec.requires_human_review);
    }

    #[test]
    fn test_fallback_record_is_labeled_and_uncited() {
        let rule = AgentFinding::new(
            "clinical_reasoning-1",
            StageName::ClinicalReasoning,
            FindingKind::RecommendedAction {
                action: "Obtain ECG".into(),
                urgency: Urgency::Immediate,
            },
            RiskLevel::High,
        )
        .with_source(FindingSource::Rules)
        .with_confidence(0.5);

        let rec = ResultAggregator::new().fallback(
            Uuid::new_v4(),
            vec![rule],
            EntitySummary::default(),
            Instant::now(),
        );
        assert_eq!(rec.operating_mode, OperatingMode::Fallback);
        assert_eq!(rec.label.as_deref(), Some(FALLBACK_LABEL));
        assert!(rec.citations.is_empty());
        assert_eq!(rec.actions.len(), 1);
        assert_eq!(rec.risk_level, RiskLevel::High);
        assert!(rec.requires_human_review);
        assert!((rec.overall_confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_degraded_run_is_not_presumed_safe() {
        let mut inp = input(Vec::new());
        inp.degraded = vec![StageName::ClinicalReasoning];
        let rec = ResultAggregator::new().aggregate(inp);
        assert_eq!(rec.risk_level, RiskLevel::Medium);
        assert_eq!(rec.overall_confidence, 0.0);
        assert!(rec.requires_human_review);
    }

    #[test]
    fn test_skipped_reasoning_is_not_presumed_safe() {
        let mut inp = input(Vec::new());
        inp.mode = OperatingMode::Minimal;
        inp.reasoning_skipped = true;
        let rec = ResultAggregator::new().aggregate(inp);
        assert_eq!(rec.risk_level, RiskLevel::Medium);
        assert!(rec.requires_human_review);
        assert!(rec.degraded_stages.is_empty());
    }
}
