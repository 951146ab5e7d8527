use super::entity::{ExtractedEntity, LinkedConcept};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Where a knowledge document comes from.
///
/// Declaration order is context priority: guidelines first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Guideline,
    DrugDb,
    CaseHistory,
    InstitutionalProtocol,
}

impl SourceCategory {
    pub const ALL: [SourceCategory; 4] = [
        SourceCategory::Guideline,
        SourceCategory::DrugDb,
        SourceCategory::CaseHistory,
        SourceCategory::InstitutionalProtocol,
    ];

    /// Context priority, 0 is highest
    pub fn priority(&self) -> u8 {
        match self {
            SourceCategory::Guideline => 0,
            SourceCategory::DrugDb => 1,
            SourceCategory::CaseHistory => 2,
            SourceCategory::InstitutionalProtocol => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Guideline => "guideline",
            SourceCategory::DrugDb => "drug_db",
            SourceCategory::CaseHistory => "case_history",
            SourceCategory::InstitutionalProtocol => "institutional_protocol",
        }
    }
}

/// Severity of a drug-drug interaction.
///
/// `None` is an explicit "no clinically significant interaction" record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionSeverity {
    None,
    Low,
    Moderate,
    High,
    Critical,
}

impl InteractionSeverity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "low" | "minor" => Some(Self::Low),
            "moderate" => Some(Self::Moderate),
            "high" | "major" => Some(Self::High),
            "critical" | "contraindicated" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Structured interaction data carried by a drug document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub subject: String,
    pub object: String,
    pub severity: InteractionSeverity,
    #[serde(default)]
    pub description: String,
}

impl InteractionRecord {
    /// True if this record is about the unordered pair `{a, b}`
    pub fn involves(&self, a: &str, b: &str) -> bool {
        let (s, o) = (self.subject.as_str(), self.object.as_str());
        (s.eq_ignore_ascii_case(a) && o.eq_ignore_ascii_case(b))
            || (s.eq_ignore_ascii_case(b) && o.eq_ignore_ascii_case(a))
    }

    pub fn mentions(&self, drug: &str) -> bool {
        self.subject.eq_ignore_ascii_case(drug) || self.object.eq_ignore_ascii_case(drug)
    }
}

/// Metadata stored alongside a document in the knowledge store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_category: SourceCategory,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub publication_date: Option<NaiveDate>,

    /// Publisher, version, URL and similar
    #[serde(default)]
    pub provenance: BTreeMap<String, String>,

    /// Ontology codes the document is indexed under
    #[serde(default)]
    pub concept_codes: BTreeSet<String>,

    #[serde(default)]
    pub interactions: Vec<InteractionRecord>,
}

impl DocumentMetadata {
    pub fn new(source_category: SourceCategory, title: impl Into<String>) -> Self {
        Self {
            source_category,
            title: title.into(),
            publication_date: None,
            provenance: BTreeMap::new(),
            concept_codes: BTreeSet::new(),
            interactions: Vec::new(),
        }
    }
}

/// A document returned by a knowledge-store query. Identity is `doc_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub doc_id: String,
    pub source_category: SourceCategory,
    pub title: String,
    pub text_excerpt: String,
    pub similarity_score: f32,
    pub publication_date: Option<NaiveDate>,
    pub provenance_metadata: BTreeMap<String, String>,
    pub concept_codes: BTreeSet<String>,
    pub interactions: Vec<InteractionRecord>,
}

/// Prioritized, budgeted context handed to the reasoning stages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextBundle {
    pub documents: Vec<RetrievedDocument>,
    pub entities: Vec<ExtractedEntity>,
    pub concepts: Vec<LinkedConcept>,
    pub token_count: usize,
    pub token_budget: usize,

    /// Documents that did not fit the budget
    pub dropped_doc_ids: Vec<String>,

    /// Retrieval returned nothing (or did not run)
    pub retrieval_empty: bool,
}

impl ContextBundle {
    pub fn get(&self, doc_id: &str) -> Option<&RetrievedDocument> {
        self.documents.iter().find(|d| d.doc_id == doc_id)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn has_category(&self, category: SourceCategory) -> bool {
        self.documents.iter().any(|d| d.source_category == category)
    }

    /// Every structured interaction record in the bundle with its document
    pub fn interactions(&self) -> impl Iterator<Item = (&RetrievedDocument, &InteractionRecord)> {
        self.documents
            .iter()
            .flat_map(|doc| doc.interactions.iter().map(move |record| (doc, record)))
    }
}

/// Reference from a claim to the document that supports it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub excerpt: String,
}

impl Citation {
    const EXCERPT_CHARS: usize = 200;

    pub fn from_document(doc: &RetrievedDocument) -> Self {
        Self {
            doc_id: doc.doc_id.clone(),
            excerpt: doc.text_excerpt.chars().take(Self::EXCERPT_CHARS).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_priority_matches_declaration_order() {
        let mut categories = SourceCategory::ALL.to_vec();
        categories.reverse();
        categories.sort();
        assert_eq!(categories, SourceCategory::ALL.to_vec());
        assert_eq!(SourceCategory::Guideline.priority(), 0);
        assert_eq!(SourceCategory::InstitutionalProtocol.priority(), 3);
    }

    #[test]
    fn test_interaction_pair_is_unordered() {
        let record = InteractionRecord {
            subject: "Lisinopril".into(),
            object: "spironolactone".into(),
            severity: InteractionSeverity::High,
            description: "hyperkalemia".into(),
        };
        assert!(record.involves("spironolactone", "lisinopril"));
        assert!(record.mentions("LISINOPRIL"));
        assert!(!record.involves("lisinopril", "aspirin"));
    }

    #[test]
    fn test_severity_parse_aliases() {
        assert_eq!(InteractionSeverity::parse("Major"), Some(InteractionSeverity::High));
        assert_eq!(
            InteractionSeverity::parse("contraindicated"),
            Some(InteractionSeverity::Critical)
        );
        assert_eq!(InteractionSeverity::parse("unknown"), None);
    }
}
