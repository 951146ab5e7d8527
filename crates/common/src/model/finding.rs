use super::document::{Citation, InteractionSeverity};
use super::recommendation::RiskLevel;
use serde::{Deserialize, Serialize};

/// Reasoning stages of the agent pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    ClinicalReasoning,
    DrugInteraction,
    KnowledgeValidation,
    PatientEducation,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::ClinicalReasoning => "clinical_reasoning",
            StageName::DrugInteraction => "drug_interaction",
            StageName::KnowledgeValidation => "knowledge_validation",
            StageName::PatientEducation => "patient_education",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Immediate,
    Urgent,
    Routine,
}

impl Urgency {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "immediate" | "emergent" | "stat" => Urgency::Immediate,
            "urgent" | "soon" => Urgency::Urgent,
            _ => Urgency::Routine,
        }
    }

    pub fn severity(&self) -> RiskLevel {
        match self {
            Urgency::Immediate => RiskLevel::High,
            Urgency::Urgent => RiskLevel::Medium,
            Urgency::Routine => RiskLevel::Low,
        }
    }
}

/// What a finding claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FindingKind {
    DifferentialDiagnosis {
        condition: String,
        probability: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        concept_code: Option<String>,
    },
    RecommendedAction {
        action: String,
        urgency: Urgency,
    },
    DrugInteractionAlert {
        drugs: Vec<String>,
        severity: InteractionSeverity,
        description: String,
    },
    PatientExplanation {
        text: String,
    },
}

/// How a finding was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSource {
    Backend,
    StructuredData,
    Rules,
}

/// A typed claim produced by one reasoning stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFinding {
    /// Stable within a request, e.g. `clinical_reasoning-2`
    pub id: String,

    pub stage: StageName,

    pub kind: FindingKind,

    pub citations: Vec<Citation>,

    /// Clinical severity of the claim
    pub severity: RiskLevel,

    /// Confidence in [0, 1]; only ever lowered after creation
    pub confidence: f32,

    /// Self-reported confidence from the language backend, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_confidence: Option<f32>,

    /// Case terms the claim rests on
    #[serde(default)]
    pub evidence: Vec<String>,

    pub source: FindingSource,

    /// False when no retrieved document backs the claim
    pub supported: bool,

    /// Retained but below the surface threshold for the request's safety level
    pub demoted: bool,
}

impl AgentFinding {
    pub fn new(id: impl Into<String>, stage: StageName, kind: FindingKind, severity: RiskLevel) -> Self {
        Self {
            id: id.into(),
            stage,
            kind,
            citations: Vec::new(),
            severity,
            confidence: 0.0,
            backend_confidence: None,
            evidence: Vec::new(),
            source: FindingSource::Backend,
            supported: false,
            demoted: false,
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.supported = !citations.is_empty();
        self.citations = citations;
        self
    }

    pub fn with_backend_confidence(mut self, confidence: Option<f32>) -> Self {
        self.backend_confidence = confidence.map(|c| c.clamp(0.0, 1.0));
        self
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_source(mut self, source: FindingSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Short human-readable statement of the claim
    pub fn headline(&self) -> String {
        match &self.kind {
            FindingKind::DifferentialDiagnosis {
                condition,
                probability,
                ..
            } => format!("{} ({:.0}%)", condition, probability * 100.0),
            FindingKind::RecommendedAction { action, .. } => action.clone(),
            FindingKind::DrugInteractionAlert {
                drugs, severity, ..
            } => format!("{:?} interaction: {}", severity, drugs.join(" + ")),
            FindingKind::PatientExplanation { text } => text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// All checks passed or the finding stays above the surface threshold
    Pass,
    /// Retained, flagged, ordered last
    Demoted,
    /// Contradicted by an authoritative source; suppressed
    Failed,
}

/// Validation result for one finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub finding_id: String,
    pub outcome: ValidationOutcome,
    pub checks_passed: u32,
    pub checks_total: u32,
    pub pre_confidence: f32,
    pub adjusted_confidence: f32,
    pub reasons: Vec<String>,
}

impl ValidationEntry {
    pub fn pass_fraction(&self) -> f32 {
        if self.checks_total == 0 {
            1.0
        } else {
            self.checks_passed as f32 / self.checks_total as f32
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub entries: Vec<ValidationEntry>,
}

impl ValidationReport {
    pub fn get(&self, finding_id: &str) -> Option<&ValidationEntry> {
        self.entries.iter().find(|e| e.finding_id == finding_id)
    }

    pub fn count(&self, outcome: ValidationOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citations_mark_support() {
        let finding = AgentFinding::new(
            "clinical_reasoning-1",
            StageName::ClinicalReasoning,
            FindingKind::DifferentialDiagnosis {
                condition: "Acute coronary syndrome".into(),
                probability: 0.6,
                concept_code: None,
            },
            RiskLevel::High,
        );
        assert!(!finding.supported);

        let finding = finding.with_citations(vec![Citation {
            doc_id: "aha-chest-pain".into(),
            excerpt: "...".into(),
        }]);
        assert!(finding.supported);
        assert!(matches!(finding.kind, FindingKind::DifferentialDiagnosis { .. }));
    }

    #[test]
    fn test_urgency_parse_and_severity() {
        assert_eq!(Urgency::parse("STAT"), Urgency::Immediate);
        assert_eq!(Urgency::parse("whenever"), Urgency::Routine);
        assert_eq!(Urgency::Immediate.severity(), RiskLevel::High);
    }

    #[test]
    fn test_kind_serializes_tagged() {
        let kind = FindingKind::PatientExplanation {
            text: "hello".into(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "patient_explanation");
    }
}
