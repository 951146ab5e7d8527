//! Operating mode inspection

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use medforge_common::model::OperatingMode;
use medforge_engine::mode::{HealthSnapshot, ModeTransition};

#[derive(Serialize)]
pub struct ModeResponse {
    pub mode: OperatingMode,
    pub health: HealthSnapshot,
    /// Tier the next request will be promoted to, if a probe found one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_promotion: Option<OperatingMode>,
    /// Most recent transitions, oldest first
    pub transitions: Vec<ModeTransition>,
}

/// Current operating mode, collaborator health and transition log
pub async fn mode(State(state): State<AppState>) -> Json<ModeResponse> {
    let controller = state.analyzer.mode();
    Json(ModeResponse {
        mode: controller.current(),
        health: controller.health(),
        pending_promotion: controller.pending_promotion(),
        transitions: controller.transitions(),
    })
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use crate::handlers::test_support::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use medforge_engine::Component;
    use serde_json::Value;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_mode_reflects_demotion() {
        let state = test_state();
        state
            .analyzer
            .mode()
            .report_failure(Component::Store, "index offline");

        let response = create_router(state)
            .oneshot(Request::get("/v1/mode").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["mode"], "BASIC");
        assert_eq!(body["health"]["store"], false);
        assert_eq!(body["transitions"].as_array().unwrap().len(), 1);
        assert_eq!(body["transitions"][0]["from"], "FULL");
    }
}
