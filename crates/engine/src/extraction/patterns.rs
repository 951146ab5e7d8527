//! Rule tables for clinical entity recognition.
//!
//! Matching runs on an ASCII-lowercased copy of the case text, so byte
//! offsets line up with the original.

use medforge_common::model::EntityType;
use regex_lite::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

pub(crate) struct LexiconEntry {
    pub term: &'static str,
    pub entity_type: EntityType,
    pub normalized: Option<&'static str>,
    pub confidence: f32,
}

const fn term(term: &'static str, entity_type: EntityType, confidence: f32) -> LexiconEntry {
    LexiconEntry {
        term,
        entity_type,
        normalized: None,
        confidence,
    }
}

const fn alias(
    term: &'static str,
    entity_type: EntityType,
    normalized: &'static str,
    confidence: f32,
) -> LexiconEntry {
    LexiconEntry {
        term,
        entity_type,
        normalized: Some(normalized),
        confidence,
    }
}

use EntityType::{Anatomy, Disease, Medication, Symptom};

#[rustfmt::skip]
pub(crate) const LEXICON: &[LexiconEntry] = &[
    // Symptoms
    term("chest pain", Symptom, 0.9), term("chest pressure", Symptom, 0.9), term("chest tightness", Symptom, 0.9),
    term("shortness of breath", Symptom, 0.9), term("dyspnea", Symptom, 0.9), term("fever", Symptom, 0.9),
    term("chills", Symptom, 0.9), term("fatigue", Symptom, 0.9), term("weakness", Symptom, 0.85),
    term("nausea", Symptom, 0.9), term("vomiting", Symptom, 0.9), term("diarrhea", Symptom, 0.9),
    term("constipation", Symptom, 0.9), term("cough", Symptom, 0.9), term("headache", Symptom, 0.9),
    term("dizziness", Symptom, 0.9), term("lightheadedness", Symptom, 0.9), term("vertigo", Symptom, 0.9),
    term("rash", Symptom, 0.85), term("itching", Symptom, 0.85), term("pruritus", Symptom, 0.9),
    term("swelling", Symptom, 0.85), term("edema", Symptom, 0.9), term("bleeding", Symptom, 0.85),
    term("numbness", Symptom, 0.85), term("tingling", Symptom, 0.85), term("palpitations", Symptom, 0.9),
    term("syncope", Symptom, 0.9), term("diaphoresis", Symptom, 0.9), term("sweating", Symptom, 0.85),
    term("abdominal pain", Symptom, 0.9), term("back pain", Symptom, 0.9), term("insomnia", Symptom, 0.85),
    alias("sob", Symptom, "shortness of breath", 0.8), alias("cp", Symptom, "chest pain", 0.75),
    alias("doe", Symptom, "dyspnea", 0.7),

    // Disorders
    term("hypertension", Disease, 0.9), term("diabetes", Disease, 0.9), term("diabetes mellitus", Disease, 0.9),
    term("type 2 diabetes", Disease, 0.9), term("asthma", Disease, 0.9), term("copd", Disease, 0.9),
    term("pneumonia", Disease, 0.9), term("bronchitis", Disease, 0.9), term("arthritis", Disease, 0.85),
    term("osteoporosis", Disease, 0.85), term("cancer", Disease, 0.85), term("sepsis", Disease, 0.9),
    term("stroke", Disease, 0.9), term("myocardial infarction", Disease, 0.9), term("heart attack", Disease, 0.85),
    term("heart failure", Disease, 0.9), term("congestive heart failure", Disease, 0.9),
    term("atrial fibrillation", Disease, 0.9), term("anemia", Disease, 0.9), term("hypothyroidism", Disease, 0.9),
    term("hyperthyroidism", Disease, 0.9), term("hyperlipidemia", Disease, 0.9), term("angina", Disease, 0.9),
    term("pulmonary embolism", Disease, 0.9), term("coronary artery disease", Disease, 0.9),
    term("chronic kidney disease", Disease, 0.9), term("gerd", Disease, 0.85), term("dementia", Disease, 0.85),
    term("epilepsy", Disease, 0.85), term("depression", Disease, 0.8), term("anxiety", Disease, 0.75),
    alias("htn", Disease, "hypertension", 0.8), alias("dm", Disease, "diabetes mellitus", 0.75),
    alias("t2dm", Disease, "type 2 diabetes mellitus", 0.8), alias("mi", Disease, "myocardial infarction", 0.75),
    alias("chf", Disease, "congestive heart failure", 0.8), alias("cad", Disease, "coronary artery disease", 0.8),
    alias("afib", Disease, "atrial fibrillation", 0.8), alias("cva", Disease, "stroke", 0.8),
    alias("ckd", Disease, "chronic kidney disease", 0.8), alias("hld", Disease, "hyperlipidemia", 0.75),
    alias("pe", Disease, "pulmonary embolism", 0.55),

    // Medications (generic)
    term("metformin", Medication, 0.9), term("insulin", Medication, 0.9), term("aspirin", Medication, 0.9),
    term("ibuprofen", Medication, 0.9), term("acetaminophen", Medication, 0.9), term("amoxicillin", Medication, 0.9),
    term("lisinopril", Medication, 0.9), term("metoprolol", Medication, 0.9), term("atorvastatin", Medication, 0.9),
    term("omeprazole", Medication, 0.9), term("esomeprazole", Medication, 0.9), term("levothyroxine", Medication, 0.9),
    term("gabapentin", Medication, 0.9), term("prednisone", Medication, 0.9), term("hydrochlorothiazide", Medication, 0.9),
    term("furosemide", Medication, 0.9), term("amlodipine", Medication, 0.9), term("losartan", Medication, 0.9),
    term("simvastatin", Medication, 0.9), term("pantoprazole", Medication, 0.9), term("warfarin", Medication, 0.9),
    term("tramadol", Medication, 0.9), term("clopidogrel", Medication, 0.9), term("spironolactone", Medication, 0.9),
    term("nitroglycerin", Medication, 0.9), term("heparin", Medication, 0.9), term("sildenafil", Medication, 0.9),
    term("amiodarone", Medication, 0.9), term("potassium chloride", Medication, 0.9),

    // Medications (brand and shorthand)
    alias("tylenol", Medication, "acetaminophen", 0.9), alias("advil", Medication, "ibuprofen", 0.9),
    alias("motrin", Medication, "ibuprofen", 0.9), alias("lipitor", Medication, "atorvastatin", 0.9),
    alias("zocor", Medication, "simvastatin", 0.9), alias("prilosec", Medication, "omeprazole", 0.9),
    alias("nexium", Medication, "esomeprazole", 0.9), alias("zestril", Medication, "lisinopril", 0.9),
    alias("coumadin", Medication, "warfarin", 0.9), alias("plavix", Medication, "clopidogrel", 0.9),
    alias("lasix", Medication, "furosemide", 0.9), alias("glucophage", Medication, "metformin", 0.9),
    alias("asa", Medication, "aspirin", 0.8), alias("hctz", Medication, "hydrochlorothiazide", 0.8),
    alias("ntg", Medication, "nitroglycerin", 0.8), alias("kcl", Medication, "potassium chloride", 0.8),

    // Anatomy
    term("head", Anatomy, 0.8), term("chest", Anatomy, 0.85), term("heart", Anatomy, 0.85),
    term("lung", Anatomy, 0.85), term("lungs", Anatomy, 0.85), term("liver", Anatomy, 0.85),
    term("kidney", Anatomy, 0.85), term("stomach", Anatomy, 0.85), term("abdomen", Anatomy, 0.85),
    term("arm", Anatomy, 0.8), term("left arm", Anatomy, 0.85), term("right arm", Anatomy, 0.85),
    term("leg", Anatomy, 0.8), term("back", Anatomy, 0.7), term("neck", Anatomy, 0.8), term("jaw", Anatomy, 0.8),
    term("throat", Anatomy, 0.8), term("shoulder", Anatomy, 0.8), term("skin", Anatomy, 0.8),
    term("cardiac", Anatomy, 0.75), term("pulmonary", Anatomy, 0.75), term("hepatic", Anatomy, 0.75),
    term("renal", Anatomy, 0.75), term("gastric", Anatomy, 0.75), term("cerebral", Anatomy, 0.75),
    term("thoracic", Anatomy, 0.75), term("abdominal", Anatomy, 0.75),
];

/// One alternation over every lexicon term, longest terms first
pub(crate) static LEXICON_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let mut terms: Vec<&str> = LEXICON.iter().map(|e| e.term).collect();
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = terms
        .iter()
        .map(|t| regex_lite::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternation)).expect("lexicon pattern compiles")
});

pub(crate) static LEXICON_INDEX: LazyLock<HashMap<&'static str, &'static LexiconEntry>> =
    LazyLock::new(|| LEXICON.iter().map(|e| (e.term, e)).collect());

/// How a pattern match is turned into an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuleKind {
    /// The whole match is the entity
    Plain,
    /// "<word> pain": drop the leading word when it is a function word
    PainPhrase,
    /// Suffix heuristics; words in `SUFFIX_EXCLUSIONS` are skipped
    Suffix,
}

pub(crate) struct PatternRule {
    pub regex: Regex,
    pub entity_type: EntityType,
    pub confidence: f32,
    pub kind: RuleKind,
}

fn rule(pattern: &str, entity_type: EntityType, confidence: f32, kind: RuleKind) -> PatternRule {
    PatternRule {
        regex: Regex::new(pattern).expect("rule pattern compiles"),
        entity_type,
        confidence,
        kind,
    }
}

pub(crate) static RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    vec![
        rule(
            r"\b\d+(?:\.\d+)?\s?(?:mg|mcg|g|ml|units?|iu|tablets?|puffs?)\b",
            EntityType::Dosage,
            0.85,
            RuleKind::Plain,
        ),
        rule(
            r"\b(?:once|twice|three times|four times)\s+(?:daily|a day|per day)\b",
            EntityType::Dosage,
            0.85,
            RuleKind::Plain,
        ),
        rule(r"\b(?:bid|tid|qid|prn|qd|qhs|qod)\b", EntityType::Dosage, 0.8, RuleKind::Plain),
        rule(
            r"\b(?:every|each)\s+\d+\s+(?:hours?|days?|weeks?)\b",
            EntityType::Dosage,
            0.8,
            RuleKind::Plain,
        ),
        rule(
            r"\b[a-z]{3,}(?:olol|pril|sartan|statin|pine|zole|cillin|mycin|vir|mab|nib|pram|zepam|parin|xaban)\b",
            EntityType::Medication,
            0.6,
            RuleKind::Suffix,
        ),
        rule(
            r"\b[a-z]{3,}(?:itis|osis|emia|oma|pathy)\b",
            EntityType::Disease,
            0.6,
            RuleKind::Suffix,
        ),
        rule(
            r"\b(?:[a-z]+\s)?(?:pain|ache|soreness|tenderness|discomfort)\b",
            EntityType::Symptom,
            0.6,
            RuleKind::PainPhrase,
        ),
        rule(
            r"\b(?:pain|ache|soreness|tenderness|discomfort)\b",
            EntityType::Symptom,
            0.5,
            RuleKind::Plain,
        ),
        rule(
            r"\b(?:severe|sharp|dull|burning|throbbing|stabbing|crushing|sudden|intermittent|constant)\s+[a-z]+\b",
            EntityType::Symptom,
            0.4,
            RuleKind::Plain,
        ),
    ]
});

/// Words carrying a clinical suffix that are not clinical entities
pub(crate) const SUFFIX_EXCLUSIONS: &[&str] =
    &["diagnosis", "prognosis", "diploma", "sympathy", "empathy"];

/// Leading words dropped from "<word> pain" phrases
pub(crate) const FUNCTION_WORDS: &[&str] = &[
    "with", "of", "and", "no", "in", "on", "the", "a", "has", "had", "for", "denies", "reports",
    "some", "any", "her", "his", "new", "to", "or", "but",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicon_terms_unique_and_lowercase() {
        let mut seen = std::collections::HashSet::new();
        for entry in LEXICON {
            assert!(seen.insert(entry.term), "duplicate term {}", entry.term);
            assert_eq!(entry.term, entry.term.to_ascii_lowercase());
            assert!((0.0..=1.0).contains(&entry.confidence));
        }
    }

    #[test]
    fn test_lexicon_prefers_longest_term() {
        let m = LEXICON_REGEX.find("acute chest pain today").unwrap();
        assert_eq!(m.as_str(), "chest pain");
    }

    #[test]
    fn test_rules_compile() {
        assert_eq!(RULES.len(), 9);
        assert!(RULES[0].regex.is_match("10 mg"));
        assert!(RULES[4].regex.is_match("ramipril"));
    }
}
