//! Stage 2: drug interactions
//!
//! Structured interaction records in the bundle are authoritative and always
//! evaluated. With a backend available, the stage also asks for interactions
//! between pairs the structured data does not cover.

use super::parse::{parse_response, resolve_citations, InteractionResponse};
use super::{finding_id, prompt, FeedbackBudget, StageOutput, StageRun};
use crate::validation::patient_medications;
use medforge_common::model::{
    AgentFinding, Citation, ContextBundle, FindingKind, FindingSource, InteractionRecord,
    InteractionSeverity, RiskLevel, SourceCategory, StageName,
};

const STAGE: StageName = StageName::DrugInteraction;

pub(crate) async fn run(run: &StageRun<'_>, mut bundle: ContextBundle, mut budget: FeedbackBudget) -> StageOutput {
    let medications = patient_medications(run.case, &bundle);
    if medications.len() < 2 {
        return StageOutput {
            bundle,
            ..StageOutput::default()
        };
    }

    let uncovered: Vec<&str> = medications
        .iter()
        .filter(|med| !is_covered(med, &bundle))
        .map(String::as_str)
        .collect();
    if !uncovered.is_empty() {
        let query = format!("{} interactions", uncovered.join(" "));
        run.feedback(STAGE, &mut budget, &mut bundle, &query, vec![SourceCategory::DrugDb])
            .await;
    }

    let mut findings = Vec::new();
    let mut unknown_pairs = Vec::new();
    let mut known_pairs = Vec::new();
    for (i, a) in medications.iter().enumerate() {
        for b in &medications[i + 1..] {
            match structured_alert(run, &bundle, a, b, findings.len()) {
                PairStatus::Alert(finding) => {
                    known_pairs.push((a.clone(), b.clone()));
                    findings.push(*finding);
                }
                PairStatus::NoInteraction => known_pairs.push((a.clone(), b.clone())),
                PairStatus::Unknown => unknown_pairs.push((a.clone(), b.clone())),
            }
        }
    }

    if unknown_pairs.is_empty() || !run.has_backend() {
        tracing::debug!(alerts = findings.len(), unknown_pairs = unknown_pairs.len(), "Structured interaction check complete");
        return StageOutput {
            findings,
            bundle,
            degraded: None,
        };
    }

    let request = prompt::drug_interaction(run.case, &medications, &known_pairs, &bundle, run.config().max_tokens);
    let generated = match run.generate(STAGE, &request).await {
        Ok(raw) => parse_response::<InteractionResponse>(&raw)
            .map_err(|e| format!("unparseable response: {}", e)),
        Err(e) => Err(e.to_string()),
    };

    // Structured alerts stand even when the backend part fails
    let response = match generated {
        Ok(response) => response,
        Err(reason) => {
            return StageOutput {
                findings,
                bundle,
                degraded: Some(reason),
            }
        }
    };

    for item in response.interactions {
        let [a, b] = match item.drugs.as_slice() {
            [a, b] => [a.trim().to_lowercase(), b.trim().to_lowercase()],
            _ => continue,
        };
        let pair_unknown = unknown_pairs
            .iter()
            .any(|(x, y)| (x == &a && y == &b) || (x == &b && y == &a));
        if !pair_unknown {
            continue;
        }
        let severity = match InteractionSeverity::parse(&item.severity) {
            Some(InteractionSeverity::None) | None => continue,
            Some(severity) => severity,
        };

        let citations = resolve_citations(&item.citations, &bundle);
        let backend_confidence = item.confidence.unwrap_or(run.config().default_backend_confidence);
        let confidence = run.confidence(&citations, &bundle, backend_confidence);
        let finding = AgentFinding::new(
            finding_id(STAGE, findings.len()),
            STAGE,
            FindingKind::DrugInteractionAlert {
                drugs: vec![a.clone(), b.clone()],
                severity,
                description: item.description.trim().to_string(),
            },
            risk_for(severity),
        )
        .with_citations(citations)
        .with_backend_confidence(item.confidence)
        .with_evidence(vec![a, b])
        .with_confidence(confidence);
        findings.push(finding);
    }

    tracing::debug!(alerts = findings.len(), "Drug interaction check complete");
    StageOutput {
        findings,
        bundle,
        degraded: None,
    }
}

enum PairStatus {
    Alert(Box<AgentFinding>),
    /// Structured data explicitly records no significant interaction
    NoInteraction,
    Unknown,
}

/// Any bundled document with interaction data or a title naming the drug
fn is_covered(medication: &str, bundle: &ContextBundle) -> bool {
    bundle.documents.iter().any(|doc| {
        doc.interactions.iter().any(|r| r.mentions(medication))
            || doc.title.to_lowercase().contains(medication)
    })
}

pub(crate) fn risk_for(severity: InteractionSeverity) -> RiskLevel {
    match severity {
        InteractionSeverity::Critical | InteractionSeverity::High => RiskLevel::High,
        InteractionSeverity::Moderate => RiskLevel::Medium,
        InteractionSeverity::Low | InteractionSeverity::None => RiskLevel::Low,
    }
}

fn structured_alert(run: &StageRun<'_>, bundle: &ContextBundle, a: &str, b: &str, index: usize) -> PairStatus {
    let records: Vec<(Citation, &InteractionRecord)> = bundle
        .interactions()
        .filter(|(_, r)| r.involves(a, b))
        .map(|(doc, r)| (Citation::from_document(doc), r))
        .collect();
    if records.is_empty() {
        return PairStatus::Unknown;
    }

    let Some(worst) = records
        .iter()
        .map(|(_, r)| *r)
        .filter(|r| r.severity > InteractionSeverity::None)
        .max_by_key(|r| r.severity)
    else {
        return PairStatus::NoInteraction;
    };

    let mut citations: Vec<Citation> = Vec::new();
    for (citation, record) in &records {
        if record.severity > InteractionSeverity::None && !citations.iter().any(|c| c.doc_id == citation.doc_id) {
            citations.push(citation.clone());
        }
    }

    let backend_confidence = run.config().structured_data_confidence;
    let confidence = run.confidence(&citations, bundle, backend_confidence);
    let finding = AgentFinding::new(
        finding_id(STAGE, index),
        STAGE,
        FindingKind::DrugInteractionAlert {
            drugs: vec![a.to_string(), b.to_string()],
            severity: worst.severity,
            description: worst.description.clone(),
        },
        risk_for(worst.severity),
    )
    .with_citations(citations)
    .with_source(FindingSource::StructuredData)
    .with_evidence(vec![a.to_string(), b.to_string()])
    .with_confidence(confidence);

    PairStatus::Alert(Box::new(finding))
}
