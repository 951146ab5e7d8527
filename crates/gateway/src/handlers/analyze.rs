//! Case analysis handler

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use medforge_common::{
    errors::{AppError, Result},
    model::{ClinicalCase, ClinicalRecommendation, OperatingMode, RiskLevel, Sex, Vitals},
};
use medforge_engine::{cancel_pair, AnalyzeRequest};

/// Request body for `POST /v1/analyze`
#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeBody {
    /// Free-text case description. Emptiness is reported by extraction.
    #[validate(length(max = 100000))]
    pub case_text: String,

    #[validate(range(max = 130))]
    pub age: Option<u32>,

    pub sex: Option<Sex>,

    pub vitals: Option<Vitals>,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub medications: Vec<String>,

    /// Cap on the operating mode for this request
    pub mode_hint: Option<OperatingMode>,

    #[serde(default)]
    pub safety_level: RiskLevel,
}

impl AnalyzeBody {
    fn into_request(self) -> AnalyzeRequest {
        let mut case = ClinicalCase::new(self.case_text).with_medications(self.medications);
        if let Some(age) = self.age {
            case = case.with_age(age);
        }
        if let Some(sex) = self.sex {
            case = case.with_sex(sex);
        }
        if let Some(vitals) = self.vitals {
            case = case.with_vitals(vitals);
        }

        let request = AnalyzeRequest::new(case).with_safety_level(self.safety_level);
        match self.mode_hint {
            Some(hint) => request.with_mode_hint(hint),
            None => request,
        }
    }
}

/// Analyze one clinical case.
///
/// The run is cancelled once `server.request_timeout_secs` elapses.
pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<ClinicalRecommendation>> {
    body.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let (handle, signal) = cancel_pair();
    let deadline = state.config.request_timeout();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        handle.cancel();
    });

    let result = state
        .analyzer
        .analyze_with_cancel(body.into_request(), signal)
        .await;
    timer.abort();

    Ok(Json(result?))
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use crate::handlers::test_support::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn post(body: Value) -> (StatusCode, Value) {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::post("/v1/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_fallback_hint_returns_labeled_record() {
        let (status, body) = post(json!({
            "case_text": "45F with chest pain radiating to the jaw, SOB",
            "mode_hint": "FALLBACK",
            "safety_level": "HIGH"
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["operating_mode"], "FALLBACK");
        assert_eq!(body["citations"].as_array().unwrap().len(), 0);
        assert!(body["label"].is_string());
        assert_eq!(body["requires_human_review"], true);
    }

    #[tokio::test]
    async fn test_structured_fields_reach_the_case() {
        let (status, body) = post(json!({
            "case_text": "feels unwell",
            "age": 70,
            "vitals": {"spo2": 85},
            "medications": ["warfarin", "aspirin"],
            "mode_hint": "FALLBACK"
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["interaction_alerts"].as_array().unwrap().len() >= 1);
        assert!(!body["actions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_case_is_bad_request() {
        let (status, body) = post(json!({"case_text": "   "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "EXTRACTION_ERROR");
    }

    #[tokio::test]
    async fn test_implausible_age_rejected_by_validation() {
        let (status, body) = post(json!({"case_text": "chest pain", "age": 400})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
