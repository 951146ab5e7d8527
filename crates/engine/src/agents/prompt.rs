//! Prompt construction for the generative stages.
//!
//! Every system prompt carries a `Stage: <name>` line so recorded answers can
//! be replayed per stage.

use medforge_common::llm::GenerationRequest;
use medforge_common::model::{AgentFinding, ClinicalCase, ContextBundle, StageName};
use std::fmt::Write;

const CITATION_RULES: &str = "Cite sources by their number ([1], [2], ...) or doc_id. \
    Only cite documents listed under Context. If no document supports a claim, \
    return an empty citations list for it. Do not invent sources.";

pub(crate) fn system_prompt(stage: StageName, task: &str, schema: &str) -> String {
    format!(
        "You are a clinical decision support assistant.\n\
         Stage: {}\n\
         {}\n\
         {}\n\
         Respond with a single JSON object and nothing else, matching:\n{}",
        stage, task, CITATION_RULES, schema
    )
}

/// Case text plus structured fields
pub(crate) fn render_case(case: &ClinicalCase) -> String {
    let mut out = format!("Case:\n{}\n", case.raw_text.trim());
    if let Some(age) = case.age {
        let _ = writeln!(out, "Age: {}", age);
    }
    if let Some(sex) = case.sex {
        let _ = writeln!(out, "Sex: {:?}", sex);
    }
    if let Some(vitals) = &case.vitals {
        let mut parts = Vec::new();
        if let Some(hr) = vitals.heart_rate {
            parts.push(format!("HR {}", hr));
        }
        if let (Some(sys), Some(dia)) = (vitals.systolic_bp, vitals.diastolic_bp) {
            parts.push(format!("BP {}/{}", sys, dia));
        }
        if let Some(rr) = vitals.respiratory_rate {
            parts.push(format!("RR {}", rr));
        }
        if let Some(t) = vitals.temperature_c {
            parts.push(format!("T {:.1}C", t));
        }
        if let Some(spo2) = vitals.spo2 {
            parts.push(format!("SpO2 {}%", spo2));
        }
        if !parts.is_empty() {
            let _ = writeln!(out, "Vitals: {}", parts.join(", "));
        }
    }
    if !case.medications.is_empty() {
        let _ = writeln!(out, "Current medications: {}", case.medications.join(", "));
    }
    out
}

/// Numbered context documents
pub(crate) fn render_context(bundle: &ContextBundle) -> String {
    if bundle.documents.is_empty() {
        return "Context:\n(no documents retrieved)\n".to_string();
    }
    let mut out = String::from("Context:\n");
    for (i, doc) in bundle.documents.iter().enumerate() {
        let _ = write!(
            out,
            "\n[{}] doc_id={} ({}) {}\n{}\n",
            i + 1,
            doc.doc_id,
            doc.source_category.as_str(),
            doc.title,
            doc.text_excerpt
        );
    }
    out
}

fn render_concepts(bundle: &ContextBundle) -> String {
    let mut labels: Vec<String> = bundle
        .concepts
        .iter()
        .filter(|c| c.rank == 0)
        .map(|c| format!("{} ({})", c.concept_label, c.concept_code))
        .collect();
    labels.dedup();
    if labels.is_empty() {
        String::new()
    } else {
        format!("Recognised concepts: {}\n", labels.join("; "))
    }
}

pub(crate) fn clinical_reasoning(
    case: &ClinicalCase,
    bundle: &ContextBundle,
    max_differentials: usize,
    max_tokens: u32,
) -> GenerationRequest {
    let system = system_prompt(
        StageName::ClinicalReasoning,
        &format!(
            "Produce at most {} differential diagnoses with probabilities that sum to at most 1, \
             and the recommended next actions with urgency (immediate, urgent or routine).",
            max_differentials
        ),
        r#"{"differentials":[{"condition":str,"probability":num,"severity":"HIGH|MEDIUM|LOW","confidence":num,"citations":[num|str],"evidence":[str]}],
 "actions":[{"action":str,"urgency":"immediate|urgent|routine","confidence":num,"citations":[num|str],"evidence":[str]}]}"#,
    );

    let prompt = format!(
        "{}{}\n{}\nTask: rank the differential diagnosis for this case.",
        render_case(case),
        render_concepts(bundle),
        render_context(bundle)
    );
    GenerationRequest::new(system, prompt, max_tokens)
}

pub(crate) fn drug_interaction(
    case: &ClinicalCase,
    medications: &[String],
    known_pairs: &[(String, String)],
    bundle: &ContextBundle,
    max_tokens: u32,
) -> GenerationRequest {
    let system = system_prompt(
        StageName::DrugInteraction,
        "Identify clinically relevant interactions between the listed medications that are \
         NOT already listed as known. Severity is one of LOW, MODERATE, HIGH, CRITICAL.",
        r#"{"interactions":[{"drugs":[str,str],"severity":str,"description":str,"confidence":num,"citations":[num|str]}]}"#,
    );

    let known = if known_pairs.is_empty() {
        "none".to_string()
    } else {
        known_pairs
            .iter()
            .map(|(a, b)| format!("{} + {}", a, b))
            .collect::<Vec<_>>()
            .join("; ")
    };

    let prompt = format!(
        "{}Medications under review: {}\nKnown interactions: {}\n\n{}\nTask: list additional interactions.",
        render_case(case),
        medications.join(", "),
        known,
        render_context(bundle)
    );
    GenerationRequest::new(system, prompt, max_tokens)
}

pub(crate) fn patient_education(findings: &[AgentFinding], max_tokens: u32) -> GenerationRequest {
    let system = system_prompt(
        StageName::PatientEducation,
        "Explain the validated findings below to the patient in plain language at a \
         sixth-grade reading level. Do not add diagnoses, drugs or advice that are not listed.",
        r#"{"explanation":str,"confidence":num}"#,
    );

    let mut prompt = String::from("Validated findings:\n");
    for finding in findings {
        let _ = writeln!(prompt, "- {}", finding.headline());
    }
    prompt.push_str("\nTask: write the patient explanation.");
    GenerationRequest::new(system, prompt, max_tokens)
}
