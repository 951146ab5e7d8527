use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patient sex as recorded in the structured case fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
    Other,
}

/// Optional vital signs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub heart_rate: Option<u32>,
    pub systolic_bp: Option<u32>,
    pub diastolic_bp: Option<u32>,
    pub respiratory_rate: Option<u32>,
    pub temperature_c: Option<f32>,
    pub spo2: Option<u32>,
}

/// A single clinical case submitted for analysis.
///
/// Immutable once built; lives for the duration of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalCase {
    /// Request-scoped identifier
    pub id: Uuid,

    /// Free-text case description
    pub raw_text: String,

    /// Age in years
    pub age: Option<u32>,

    pub sex: Option<Sex>,

    pub vitals: Option<Vitals>,

    /// Current medication list, as supplied by the caller
    pub medications: Vec<String>,
}

impl ClinicalCase {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_text: raw_text.into(),
            age: None,
            sex: None,
            vitals: None,
            medications: Vec::new(),
        }
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn with_vitals(mut self, vitals: Vitals) -> Self {
        self.vitals = Some(vitals);
        self
    }

    pub fn with_medications<I, S>(mut self, medications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.medications = medications.into_iter().map(Into::into).collect();
        self
    }
}
