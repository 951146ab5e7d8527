use super::document::Citation;
use super::entity::EntitySummary;
use super::finding::{AgentFinding, StageName, ValidationReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label carried by output that was not produced by the retrieval pipeline
pub const FALLBACK_LABEL: &str = "rule-based, uncited";

/// Risk stratification; also the caller's requested safety level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Medium
    }
}

/// Degradation tier. Declaration order runs from most to least capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum OperatingMode {
    Full = 0,
    Basic = 1,
    Minimal = 2,
    Fallback = 3,
}

impl OperatingMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => OperatingMode::Full,
            1 => OperatingMode::Basic,
            2 => OperatingMode::Minimal,
            _ => OperatingMode::Fallback,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Full => "FULL",
            OperatingMode::Basic => "BASIC",
            OperatingMode::Minimal => "MINIMAL",
            OperatingMode::Fallback => "FALLBACK",
        }
    }

    /// The less capable of two tiers
    pub fn lowest(self, other: OperatingMode) -> OperatingMode {
        self.max(other)
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding removed by validation, kept for the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressedFinding {
    pub finding_id: String,
    pub stage: StageName,
    pub headline: String,
    pub reason: String,
}

/// Final, serializable result of one analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalRecommendation {
    pub id: Uuid,
    pub case_id: Uuid,
    pub risk_level: RiskLevel,

    /// Ranked by probability; demoted entries last
    pub differentials: Vec<AgentFinding>,
    pub actions: Vec<AgentFinding>,
    pub interaction_alerts: Vec<AgentFinding>,
    pub patient_explanation: Option<AgentFinding>,

    /// Findings with no supporting document, reported separately
    pub unsupported_findings: Vec<AgentFinding>,

    /// Weakest-link confidence in [0, 1]
    pub overall_confidence: f32,

    /// Every document cited by a surfaced finding, deduplicated
    pub citations: Vec<Citation>,

    pub operating_mode: OperatingMode,
    pub processing_latency_ms: u64,

    /// Set for rule-based or error output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    pub degraded_stages: Vec<StageName>,
    pub suppressed_findings: Vec<SuppressedFinding>,
    pub requires_human_review: bool,
    pub entity_summary: EntitySummary,
    pub validation: ValidationReport,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub generated_at: DateTime<Utc>,
}

impl ClinicalRecommendation {
    /// Minimal, clearly labeled output for when every backend path failed
    pub fn exhausted(case_id: Uuid, reason: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            risk_level: RiskLevel::High,
            differentials: Vec::new(),
            actions: Vec::new(),
            interaction_alerts: Vec::new(),
            patient_explanation: None,
            unsupported_findings: Vec::new(),
            overall_confidence: 0.0,
            citations: Vec::new(),
            operating_mode: OperatingMode::Fallback,
            processing_latency_ms: latency_ms,
            label: Some(format!("{}; analysis unavailable", FALLBACK_LABEL)),
            degraded_stages: Vec::new(),
            suppressed_findings: Vec::new(),
            requires_human_review: true,
            entity_summary: EntitySummary::default(),
            validation: ValidationReport::default(),
            error: Some(reason.into()),
            generated_at: Utc::now(),
        }
    }

    /// All surfaced findings in presentation order
    pub fn findings(&self) -> impl Iterator<Item = &AgentFinding> {
        self.differentials
            .iter()
            .chain(self.actions.iter())
            .chain(self.interaction_alerts.iter())
            .chain(self.patient_explanation.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_roundtrips_through_u8() {
        for mode in [
            OperatingMode::Full,
            OperatingMode::Basic,
            OperatingMode::Minimal,
            OperatingMode::Fallback,
        ] {
            assert_eq!(OperatingMode::from_u8(mode.as_u8()), mode);
        }
    }

    #[test]
    fn test_lowest_picks_less_capable() {
        assert_eq!(
            OperatingMode::Full.lowest(OperatingMode::Minimal),
            OperatingMode::Minimal
        );
        assert_eq!(
            OperatingMode::Fallback.lowest(OperatingMode::Basic),
            OperatingMode::Fallback
        );
    }

    #[test]
    fn test_exhausted_is_labeled_and_flagged() {
        let rec = ClinicalRecommendation::exhausted(Uuid::new_v4(), "all backends down", 12);
        assert_eq!(rec.risk_level, RiskLevel::High);
        assert_eq!(rec.overall_confidence, 0.0);
        assert!(rec.requires_human_review);
        assert!(rec.label.as_deref().unwrap_or_default().starts_with(FALLBACK_LABEL));
        assert!(rec.citations.is_empty());
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"HIGH\"");
    }
}
