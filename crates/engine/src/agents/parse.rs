//! Backend response parsing
//!
//! Backends are asked for one JSON object but routinely wrap it in prose or
//! code fences. The outermost `{...}` is taken and deserialized leniently:
//! missing fields default, citations may be numbers, `"[n]"` strings or doc ids.

use medforge_common::errors::{AppError, Result};
use medforge_common::model::{Citation, ContextBundle};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// A citation as written by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum CitationRef {
    Index(usize),
    Id(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DifferentialItem {
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub probability: f32,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub citations: Vec<CitationRef>,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ActionItem {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub citations: Vec<CitationRef>,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ClinicalResponse {
    #[serde(default)]
    pub differentials: Vec<DifferentialItem>,
    #[serde(default)]
    pub actions: Vec<ActionItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct InteractionItem {
    #[serde(default)]
    pub drugs: Vec<String>,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub citations: Vec<CitationRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct InteractionResponse {
    #[serde(default)]
    pub interactions: Vec<InteractionItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct EducationResponse {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Slice out the outermost JSON object
fn outermost_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse the JSON object embedded in a backend response
pub(crate) fn parse_response<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let json = outermost_object(raw).ok_or_else(|| AppError::Internal {
        message: "backend response contained no JSON object".to_string(),
    })?;
    Ok(serde_json::from_str(json)?)
}

/// Resolve citation references against the bundle, dropping unknown ones.
///
/// The result is deduplicated and keeps first-mention order.
pub(crate) fn resolve_citations(refs: &[CitationRef], bundle: &ContextBundle) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();
    for reference in refs {
        let doc = match reference {
            CitationRef::Index(n) => n.checked_sub(1).and_then(|i| bundle.documents.get(i)),
            CitationRef::Id(raw) => {
                let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
                match trimmed.parse::<usize>() {
                    Ok(n) => n.checked_sub(1).and_then(|i| bundle.documents.get(i)),
                    Err(_) => bundle.get(trimmed),
                }
            }
        };
        match doc {
            Some(doc) if !citations.iter().any(|c| c.doc_id == doc.doc_id) => {
                citations.push(Citation::from_document(doc));
            }
            Some(_) => {}
            None => tracing::debug!(reference = ?reference, "Dropping unresolvable citation"),
        }
    }
    citations
}
