//! Stage 4: patient education
//!
//! Plain-language explanation built only from findings that survived
//! validation with support and without demotion.

use super::parse::{parse_response, EducationResponse};
use super::{finding_id, prompt, StageOutput, StageRun};
use medforge_common::model::{AgentFinding, Citation, FindingKind, RiskLevel, StageName};

const STAGE: StageName = StageName::PatientEducation;

/// Findings an explanation may draw on
pub(crate) fn explainable(findings: &[AgentFinding]) -> Vec<AgentFinding> {
    findings
        .iter()
        .filter(|f| f.supported && !f.demoted)
        .filter(|f| !matches!(f.kind, FindingKind::PatientExplanation { .. }))
        .cloned()
        .collect()
}

pub(crate) async fn run(run: &StageRun<'_>, validated: &[AgentFinding]) -> StageOutput {
    let basis = explainable(validated);
    if basis.is_empty() {
        return StageOutput::default();
    }
    if !run.has_backend() {
        return StageOutput::degraded(Default::default(), "no generative backend available");
    }

    let request = prompt::patient_education(&basis, run.config().max_tokens);
    let raw = match run.generate(STAGE, &request).await {
        Ok(raw) => raw,
        Err(e) => return StageOutput::degraded(Default::default(), e.to_string()),
    };
    let response: EducationResponse = match parse_response(&raw) {
        Ok(response) => response,
        Err(e) => {
            return StageOutput::degraded(Default::default(), format!("unparseable response: {}", e))
        }
    };
    let text = response.explanation.trim();
    if text.is_empty() {
        return StageOutput::degraded(Default::default(), "empty explanation");
    }

    let mut citations: Vec<Citation> = Vec::new();
    for citation in basis.iter().flat_map(|f| f.citations.iter()) {
        if !citations.iter().any(|c| c.doc_id == citation.doc_id) {
            citations.push(citation.clone());
        }
    }

    let weakest = basis.iter().map(|f| f.confidence).fold(1.0_f32, f32::min);
    let backend_confidence = response
        .confidence
        .unwrap_or(run.config().default_backend_confidence);

    let finding = AgentFinding::new(
        finding_id(STAGE, 0),
        STAGE,
        FindingKind::PatientExplanation {
            text: text.to_string(),
        },
        RiskLevel::Low,
    )
    .with_citations(citations)
    .with_backend_confidence(response.confidence)
    .with_evidence(basis.iter().map(|f| f.id.clone()).collect())
    .with_confidence(weakest.min(backend_confidence));

    StageOutput {
        findings: vec![finding],
        bundle: Default::default(),
        degraded: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medforge_common::model::Urgency;

    fn action(id: &str, supported: bool, demoted: bool) -> AgentFinding {
        let mut finding = AgentFinding::new(
            id,
            StageName::ClinicalReasoning,
            FindingKind::RecommendedAction {
                action: "Obtain ECG".into(),
                urgency: Urgency::Immediate,
            },
            RiskLevel::High,
        );
        finding.supported = supported;
        finding.demoted = demoted;
        finding
    }

    #[test]
    fn test_only_supported_undemoted_findings_are_explained() {
        let findings = vec![
            action("a", true, false),
            action("b", false, false),
            action("c", true, true),
        ];
        let basis = explainable(&findings);
        assert_eq!(basis.len(), 1);
        assert_eq!(basis[0].id, "a");
    }
}
