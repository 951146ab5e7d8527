//! Built-in clinical vocabulary
//!
//! A compact SNOMED CT (`SCT:`) / RxNorm (`RXN:`) coded subset covering common
//! presentations, cardiometabolic conditions and frequently prescribed drugs.
//! Deployments extend it through `knowledge.ontology_path`.

use crate::ontology::OntologyConcept;
use medforge_common::model::EntityType;

type Row = (
    &'static str,
    &'static str,
    EntityType,
    f32,
    &'static [&'static str],
    &'static [&'static str],
);

const CHEST_PAIN: &str = "SCT:29857009";
const DYSPNEA: &str = "SCT:267036007";
const FEVER: &str = "SCT:386661006";
const HYPERTENSION: &str = "SCT:38341003";
const ACS: &str = "SCT:394659003";
const MI: &str = "SCT:22298006";
const ANGINA: &str = "SCT:194828000";
const PE: &str = "SCT:59282003";
const DISSECTION: &str = "SCT:308546005";
const GERD: &str = "SCT:235595009";
const HEART_FAILURE: &str = "SCT:84114007";
const PNEUMONIA: &str = "SCT:233604007";
const AFIB: &str = "SCT:49436004";
const STROKE: &str = "SCT:230690007";
const HYPERKALEMIA: &str = "SCT:14140009";
const DIABETES: &str = "SCT:44054006";

const LISINOPRIL: &str = "RXN:29046";
const ASPIRIN: &str = "RXN:1191";
const NITROGLYCERIN: &str = "RXN:4917";
const HEPARIN: &str = "RXN:5224";
const WARFARIN: &str = "RXN:11289";
const SPIRONOLACTONE: &str = "RXN:9997";
const METFORMIN: &str = "RXN:6809";

#[rustfmt::skip]
const ROWS: &[Row] = &[
    // Findings
    (CHEST_PAIN, "Chest pain", EntityType::Symptom, 0.9, &["chest discomfort", "chest pressure", "chest tightness"],
        &[ACS, MI, ANGINA, PE, DISSECTION, GERD, "SCT:64109004", "SCT:371631005"]),
    (DYSPNEA, "Dyspnea", EntityType::Symptom, 0.85, &["shortness of breath", "breathlessness", "difficulty breathing"],
        &[PE, HEART_FAILURE, PNEUMONIA, "SCT:195967001", "SCT:13645005", ACS]),
    (FEVER, "Fever", EntityType::Symptom, 0.8, &["pyrexia", "febrile"], &[PNEUMONIA, "SCT:91302008", "SCT:68566005"]),
    ("SCT:49727002", "Cough", EntityType::Symptom, 0.8, &[], &[PNEUMONIA, "SCT:195967001", "SCT:13645005"]),
    ("SCT:25064002", "Headache", EntityType::Symptom, 0.8, &["cephalalgia"], &[HYPERTENSION, STROKE]),
    ("SCT:422587007", "Nausea", EntityType::Symptom, 0.7, &[], &[MI, GERD]),
    ("SCT:271594007", "Syncope", EntityType::Symptom, 0.5, &["fainting", "passed out"], &[AFIB, PE, DISSECTION]),
    ("SCT:80313002", "Palpitations", EntityType::Symptom, 0.55, &[], &[AFIB, "SCT:371631005"]),
    ("SCT:52613005", "Diaphoresis", EntityType::Symptom, 0.5, &["sweating", "excessive sweating"], &[MI, ACS]),
    ("SCT:21522001", "Abdominal pain", EntityType::Symptom, 0.75, &["stomach pain"], &[GERD]),
    ("SCT:267038008", "Edema", EntityType::Symptom, 0.55, &["swelling", "leg swelling"], &[HEART_FAILURE]),
    ("SCT:84229001", "Fatigue", EntityType::Symptom, 0.7, &["tiredness"], &["SCT:271737000", HEART_FAILURE]),
    ("SCT:404640003", "Dizziness", EntityType::Symptom, 0.7, &["lightheadedness"], &[AFIB, STROKE]),

    // Disorders
    (HYPERTENSION, "Hypertension", EntityType::Disease, 0.95, &["high blood pressure", "hypertensive disorder"],
        &[ACS, MI, STROKE, HEART_FAILURE, DISSECTION, LISINOPRIL, "RXN:17767", "RXN:52175"]),
    (ACS, "Acute coronary syndrome", EntityType::Disease, 0.6, &["acs"], &[MI, ANGINA, ASPIRIN, NITROGLYCERIN, "RXN:32968", HEPARIN]),
    (MI, "Myocardial infarction", EntityType::Disease, 0.6, &["heart attack", "stemi", "nstemi"], &[ASPIRIN, "RXN:32968", HEPARIN]),
    (ANGINA, "Angina pectoris", EntityType::Disease, 0.55, &["angina"], &[NITROGLYCERIN]),
    (PE, "Pulmonary embolism", EntityType::Disease, 0.35, &[], &[HEPARIN, WARFARIN]),
    (DISSECTION, "Aortic dissection", EntityType::Disease, 0.15, &[], &[]),
    (GERD, "Gastroesophageal reflux disease", EntityType::Disease, 0.7, &["gerd", "acid reflux", "heartburn"], &["RXN:7646"]),
    ("SCT:64109004", "Costochondritis", EntityType::Disease, 0.3, &[], &[]),
    ("SCT:371631005", "Panic disorder", EntityType::Disease, 0.4, &["panic attack"], &[]),
    (DIABETES, "Type 2 diabetes mellitus", EntityType::Disease, 0.9, &["diabetes", "diabetes mellitus", "t2dm"],
        &[METFORMIN, "RXN:5856", HYPERTENSION]),
    (HEART_FAILURE, "Heart failure", EntityType::Disease, 0.6, &["chf", "congestive heart failure"],
        &[LISINOPRIL, "RXN:4603", SPIRONOLACTONE]),
    (PNEUMONIA, "Pneumonia", EntityType::Disease, 0.6, &[], &["RXN:723"]),
    ("SCT:195967001", "Asthma", EntityType::Disease, 0.7, &[], &[]),
    ("SCT:13645005", "Chronic obstructive pulmonary disease", EntityType::Disease, 0.6, &["copd", "emphysema"], &[]),
    (AFIB, "Atrial fibrillation", EntityType::Disease, 0.6, &["afib", "a fib"], &[WARFARIN, "RXN:6918", "RXN:703", STROKE]),
    (STROKE, "Stroke", EntityType::Disease, 0.5, &["cva", "cerebrovascular accident"], &[]),
    ("SCT:91302008", "Sepsis", EntityType::Disease, 0.3, &[], &[]),
    ("SCT:68566005", "Urinary tract infection", EntityType::Disease, 0.6, &["uti"], &[]),
    (HYPERKALEMIA, "Hyperkalemia", EntityType::Disease, 0.3, &[], &[LISINOPRIL, SPIRONOLACTONE, "RXN:8591"]),
    ("SCT:41291007", "Angioedema", EntityType::Disease, 0.2, &[], &[LISINOPRIL]),
    ("SCT:271737000", "Anemia", EntityType::Disease, 0.6, &["anaemia"], &[]),
    ("SCT:55822004", "Hyperlipidemia", EntityType::Disease, 0.85, &["high cholesterol", "dyslipidemia"], &["RXN:83367", "RXN:36567"]),

    // Substances
    (LISINOPRIL, "Lisinopril", EntityType::Medication, 0.8, &["zestril", "prinivil"], &[HYPERKALEMIA, "SCT:41291007"]),
    (METFORMIN, "Metformin", EntityType::Medication, 0.85, &["glucophage"], &[]),
    (ASPIRIN, "Aspirin", EntityType::Medication, 0.9, &["asa", "acetylsalicylic acid"], &[]),
    (WARFARIN, "Warfarin", EntityType::Medication, 0.5, &["coumadin"], &[]),
    ("RXN:83367", "Atorvastatin", EntityType::Medication, 0.8, &["lipitor"], &[]),
    ("RXN:36567", "Simvastatin", EntityType::Medication, 0.6, &["zocor"], &[]),
    (SPIRONOLACTONE, "Spironolactone", EntityType::Medication, 0.4, &["aldactone"], &[]),
    ("RXN:5640", "Ibuprofen", EntityType::Medication, 0.8, &["advil", "motrin"], &[]),
    ("RXN:161", "Acetaminophen", EntityType::Medication, 0.9, &["tylenol", "paracetamol"], &[]),
    (NITROGLYCERIN, "Nitroglycerin", EntityType::Medication, 0.5, &["ntg", "nitro"], &[]),
    ("RXN:32968", "Clopidogrel", EntityType::Medication, 0.5, &["plavix"], &[]),
    ("RXN:6918", "Metoprolol", EntityType::Medication, 0.7, &["lopressor", "toprol"], &[]),
    ("RXN:17767", "Amlodipine", EntityType::Medication, 0.75, &["norvasc"], &[]),
    ("RXN:7646", "Omeprazole", EntityType::Medication, 0.75, &["prilosec"], &[]),
    ("RXN:283742", "Esomeprazole", EntityType::Medication, 0.5, &["nexium"], &[]),
    (HEPARIN, "Heparin", EntityType::Medication, 0.5, &[], &[]),
    ("RXN:8591", "Potassium chloride", EntityType::Medication, 0.4, &["kcl"], &[]),
    ("RXN:136411", "Sildenafil", EntityType::Medication, 0.3, &["viagra"], &[NITROGLYCERIN]),
    ("RXN:703", "Amiodarone", EntityType::Medication, 0.3, &[], &[]),
    ("RXN:52175", "Losartan", EntityType::Medication, 0.7, &["cozaar"], &[]),
    ("RXN:4603", "Furosemide", EntityType::Medication, 0.6, &["lasix"], &[]),
    ("RXN:5856", "Insulin", EntityType::Medication, 0.6, &[], &[]),
    ("RXN:723", "Amoxicillin", EntityType::Medication, 0.7, &[], &[]),

    // Body structures
    ("SCT:51185008", "Chest", EntityType::Anatomy, 0.6, &["thorax", "chest wall"], &[]),
    ("SCT:80891009", "Heart", EntityType::Anatomy, 0.6, &["cardiac"], &[]),
    ("SCT:39607008", "Lung", EntityType::Anatomy, 0.6, &["lungs", "pulmonary"], &[]),
    ("SCT:40983000", "Arm", EntityType::Anatomy, 0.5, &["left arm", "right arm"], &[]),
    ("SCT:69536005", "Head", EntityType::Anatomy, 0.5, &[], &[]),
    ("SCT:818983003", "Abdomen", EntityType::Anatomy, 0.6, &["belly"], &[]),
    ("SCT:64033007", "Kidney", EntityType::Anatomy, 0.5, &["kidneys", "renal"], &[]),
];

pub(crate) fn default_concepts() -> Vec<OntologyConcept> {
    ROWS.iter()
        .map(|(code, label, semantic_type, frequency, synonyms, related)| OntologyConcept {
            code: code.to_string(),
            label: label.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            semantic_type: *semantic_type,
            frequency: *frequency,
            related: related.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_unique_and_relations_resolve() {
        let concepts = default_concepts();
        let codes: HashSet<&str> = concepts.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes.len(), concepts.len());

        for concept in &concepts {
            for related in &concept.related {
                assert!(codes.contains(related.as_str()), "{} -> {}", concept.code, related);
            }
            assert!((0.0..=1.0).contains(&concept.frequency));
        }
    }
}
