//! Rule-based alert check used when no reasoning path is available
//!
//! Provides:
//! - `FallbackRules` trait, the seam for an external rules engine
//! - `KeywordRules`: red-flag keyword groups, vital-sign thresholds and a
//!   static table of dangerous drug pairs
//!
//! Output is uncited by construction and always labeled as rule-based.

use async_trait::async_trait;
use medforge_common::errors::Result;
use medforge_common::model::{
    AgentFinding, ClinicalCase, EntityType, ExtractedEntity, FindingKind, FindingSource,
    InteractionSeverity, StageName, Urgency,
};

use crate::agents::finding_id;
use crate::validation::mentions_term;

/// External rule-based alert check
#[async_trait]
pub trait FallbackRules: Send + Sync {
    async fn evaluate(&self, case: &ClinicalCase, entities: &[ExtractedEntity]) -> Result<Vec<AgentFinding>>;
}

/// A red-flag presentation: every group must have at least one term present
struct RedFlag {
    groups: &'static [&'static [&'static str]],
    action: &'static str,
    urgency: Urgency,
}

#[rustfmt::skip]
const RED_FLAGS: &[RedFlag] = &[
    RedFlag {
        groups: &[&["chest pain", "chest pressure", "chest tightness", "cp"],
                  &["shortness of breath", "sob", "dyspnea", "diaphoresis", "sweating", "radiating", "jaw", "left arm", "nausea"]],
        action: "Possible acute coronary syndrome: obtain 12-lead ECG and troponin immediately",
        urgency: Urgency::Immediate,
    },
    RedFlag {
        groups: &[&["facial droop", "slurred speech", "aphasia", "hemiparesis", "unilateral weakness", "one-sided weakness"]],
        action: "Possible stroke: activate stroke protocol and establish last-known-well time",
        urgency: Urgency::Immediate,
    },
    RedFlag {
        groups: &[&["fever", "febrile", "rigors"],
                  &["confusion", "hypotension", "altered mental status", "lethargy"]],
        action: "Possible sepsis: obtain lactate and blood cultures, start sepsis pathway",
        urgency: Urgency::Immediate,
    },
    RedFlag {
        groups: &[&["chest pain", "chest pressure", "chest tightness", "cp"]],
        action: "Chest pain: urgent clinical evaluation with ECG",
        urgency: Urgency::Urgent,
    },
    RedFlag {
        groups: &[&["shortness of breath", "sob", "dyspnea", "difficulty breathing"]],
        action: "Dyspnea: urgent assessment of oxygenation and work of breathing",
        urgency: Urgency::Urgent,
    },
];

#[rustfmt::skip]
const DANGEROUS_PAIRS: &[(&str, &str, InteractionSeverity, &str)] = &[
    ("sildenafil", "nitroglycerin", InteractionSeverity::Critical, "Severe hypotension"),
    ("warfarin", "aspirin", InteractionSeverity::High, "Major bleeding risk"),
    ("lisinopril", "spironolactone", InteractionSeverity::High, "Hyperkalemia"),
    ("warfarin", "ibuprofen", InteractionSeverity::High, "Major bleeding risk"),
    ("clopidogrel", "omeprazole", InteractionSeverity::Moderate, "Reduced antiplatelet effect"),
];

/// Confidence assigned to every rule-based finding
const RULE_CONFIDENCE: f32 = 0.5;

/// Default keyword and threshold rules
#[derive(Debug, Default, Clone)]
pub struct KeywordRules;

impl KeywordRules {
    pub fn new() -> Self {
        Self
    }

    fn action(&self, index: usize, action: &str, urgency: Urgency) -> AgentFinding {
        AgentFinding::new(
            finding_id(StageName::ClinicalReasoning, index),
            StageName::ClinicalReasoning,
            FindingKind::RecommendedAction {
                action: action.to_string(),
                urgency,
            },
            urgency.severity(),
        )
        .with_source(FindingSource::Rules)
        .with_confidence(RULE_CONFIDENCE)
    }

    fn vital_alerts(case: &ClinicalCase) -> Vec<(String, Urgency)> {
        let Some(vitals) = &case.vitals else {
            return Vec::new();
        };
        let mut alerts = Vec::new();
        if let Some(spo2) = vitals.spo2.filter(|s| *s < 90) {
            alerts.push((format!("Hypoxemia (SpO2 {}%): supplemental oxygen and urgent assessment", spo2), Urgency::Immediate));
        }
        if let Some(sbp) = vitals.systolic_bp.filter(|s| *s >= 180) {
            alerts.push((format!("Severely elevated blood pressure ({} mmHg systolic): assess for end-organ damage", sbp), Urgency::Urgent));
        }
        if let Some(sbp) = vitals.systolic_bp.filter(|s| *s < 90) {
            alerts.push((format!("Hypotension ({} mmHg systolic): assess perfusion", sbp), Urgency::Immediate));
        }
        if let Some(hr) = vitals.heart_rate.filter(|h| *h > 130) {
            alerts.push((format!("Marked tachycardia ({} bpm): obtain ECG", hr), Urgency::Urgent));
        }
        if let Some(t) = vitals.temperature_c.filter(|t| *t >= 39.5) {
            alerts.push((format!("High fever ({:.1} C): evaluate for serious infection", t), Urgency::Urgent));
        }
        alerts
    }
}

#[async_trait]
impl FallbackRules for KeywordRules {
    async fn evaluate(&self, case: &ClinicalCase, entities: &[ExtractedEntity]) -> Result<Vec<AgentFinding>> {
        let text = case.raw_text.to_lowercase();
        let present = |term: &str| mentions_term(&text, term);

        let mut findings = Vec::new();
        let mut chest_pain_flagged = false;
        for flag in RED_FLAGS {
            if !flag.groups.iter().all(|group| group.iter().any(|term| present(*term))) {
                continue;
            }
            // The bare chest pain rule only fires when nothing more specific did
            let is_chest = flag.groups[0].contains(&"chest pain");
            if is_chest && chest_pain_flagged {
                continue;
            }
            chest_pain_flagged |= is_chest;
            findings.push(self.action(findings.len(), flag.action, flag.urgency));
        }

        for (action, urgency) in Self::vital_alerts(case) {
            findings.push(self.action(findings.len(), &action, urgency));
        }

        let mut medications: Vec<String> = case.medications.iter().map(|m| m.trim().to_lowercase()).collect();
        for entity in entities.iter().filter(|e| e.entity_type == EntityType::Medication) {
            let med = entity.canonical();
            if !medications.contains(&med) {
                medications.push(med);
            }
        }

        for (a, b, severity, description) in DANGEROUS_PAIRS {
            if medications.iter().any(|m| m.as_str() == *a) && medications.iter().any(|m| m.as_str() == *b) {
                let finding = AgentFinding::new(
                    finding_id(StageName::DrugInteraction, findings.len()),
                    StageName::DrugInteraction,
                    FindingKind::DrugInteractionAlert {
                        drugs: vec![a.to_string(), b.to_string()],
                        severity: *severity,
                        description: description.to_string(),
                    },
                    crate::agents::risk_for(*severity),
                )
                .with_source(FindingSource::Rules)
                .with_confidence(RULE_CONFIDENCE);
                findings.push(finding);
            }
        }

        tracing::debug!(findings = findings.len(), "Fallback rules evaluated");
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medforge_common::model::{RiskLevel, Vitals};

    #[tokio::test]
    async fn test_acs_red_flag_beats_bare_chest_pain() {
        let case = ClinicalCase::new("45F with chest pain radiating to the jaw, SOB");
        let findings = KeywordRules::new().evaluate(&case, &[]).await.unwrap();

        let actions: Vec<&AgentFinding> = findings
            .iter()
            .filter(|f| matches!(f.kind, FindingKind::RecommendedAction { .. }))
            .collect();
        assert!(actions[0].headline().contains("acute coronary syndrome"));
        assert_eq!(actions[0].severity, RiskLevel::High);
        assert!(!findings.iter().any(|f| f.headline().starts_with("Chest pain:")));
        assert!(findings.iter().all(|f| f.citations.is_empty() && f.source == FindingSource::Rules));
    }

    #[tokio::test]
    async fn test_vitals_and_dangerous_pairs() {
        let case = ClinicalCase::new("feels unwell")
            .with_vitals(Vitals {
                spo2: Some(86),
                ..Vitals::default()
            })
            .with_medications(["Warfarin", "aspirin"]);
        let findings = KeywordRules::new().evaluate(&case, &[]).await.unwrap();

        assert!(findings.iter().any(|f| f.headline().contains("SpO2 86%")));
        let alert = findings
            .iter()
            .find(|f| matches!(f.kind, FindingKind::DrugInteractionAlert { .. }))
            .unwrap();
        assert_eq!(alert.severity, RiskLevel::High);
        assert_eq!(alert.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_benign_text_yields_nothing() {
        let case = ClinicalCase::new("routine follow-up, no complaints");
        assert!(KeywordRules::new().evaluate(&case, &[]).await.unwrap().is_empty());
    }
}
