//! Operating mode control - the degradation state machine
//!
//! Provides:
//! - `ModeController`: single writer of the process-wide `OperatingMode`
//! - `ExecutionPlan`: per-request snapshot of what the mode allows
//! - Health probing with promotion deferred to the next request
//! - A bounded transition log
//!
//! Requests read the mode once, in `begin_request`, and never observe a
//! change afterwards. Demotions apply immediately for later requests;
//! promotions found by the probe wait for the next `begin_request`.

use medforge_common::config::ModeConfig;
use medforge_common::llm::{BackendSet, LanguageBackend};
use medforge_common::metrics::record_mode_transition;
use medforge_common::model::{OperatingMode, StageName};
use medforge_knowledge::KnowledgeStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// External collaborator whose health drives the mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Store,
    Primary,
    Secondary,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Store => "store",
            Component::Primary => "primary",
            Component::Secondary => "secondary",
        }
    }
}

/// Which generative backend a request uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    Primary,
    Secondary,
}

impl BackendChoice {
    pub fn component(self) -> Component {
        match self {
            BackendChoice::Primary => Component::Primary,
            BackendChoice::Secondary => Component::Secondary,
        }
    }

    /// Resolve to the configured backend
    pub fn resolve(self, backends: &BackendSet) -> Option<Arc<dyn LanguageBackend>> {
        match self {
            BackendChoice::Primary => backends.primary.clone(),
            BackendChoice::Secondary => backends.secondary.clone(),
        }
    }
}

/// Last known reachability of each collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub store: bool,
    pub primary: bool,
    pub secondary: bool,
}

impl HealthSnapshot {
    fn set(&mut self, component: Component, healthy: bool) {
        match component {
            Component::Store => self.store = healthy,
            Component::Primary => self.primary = healthy,
            Component::Secondary => self.secondary = healthy,
        }
    }

    /// Best tier these collaborators support
    pub fn tier(&self) -> OperatingMode {
        match (self.store, self.primary, self.secondary) {
            (true, true, _) => OperatingMode::Full,
            (_, true, _) | (_, _, true) => OperatingMode::Basic,
            (true, false, false) => OperatingMode::Minimal,
            (false, false, false) => OperatingMode::Fallback,
        }
    }

    fn preferred_backend(&self) -> Option<BackendChoice> {
        if self.primary {
            Some(BackendChoice::Primary)
        } else if self.secondary {
            Some(BackendChoice::Secondary)
        } else {
            None
        }
    }
}

/// What a single request is allowed to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub mode: OperatingMode,
    pub retrieval: bool,
    pub backend: Option<BackendChoice>,
    pub stages: Vec<StageName>,
}

impl ExecutionPlan {
    pub fn for_mode(mode: OperatingMode, health: HealthSnapshot) -> Self {
        match mode {
            OperatingMode::Full | OperatingMode::Basic => Self {
                mode,
                retrieval: health.store,
                backend: health.preferred_backend(),
                stages: vec![
                    StageName::ClinicalReasoning,
                    StageName::DrugInteraction,
                    StageName::KnowledgeValidation,
                    StageName::PatientEducation,
                ],
            },
            OperatingMode::Minimal => Self {
                mode,
                retrieval: health.store,
                backend: None,
                stages: vec![StageName::DrugInteraction, StageName::KnowledgeValidation],
            },
            OperatingMode::Fallback => Self {
                mode,
                retrieval: false,
                backend: None,
                stages: Vec::new(),
            },
        }
    }

    pub fn runs(&self, stage: StageName) -> bool {
        self.stages.contains(&stage)
    }

    pub fn is_fallback(&self) -> bool {
        self.mode == OperatingMode::Fallback
    }
}

/// One recorded mode change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeTransition {
    pub from: OperatingMode,
    pub to: OperatingMode,
    pub reason: String,
    pub at: DateTime<Utc>,
}

struct ControlState {
    health: HealthSnapshot,
    pending_promotion: Option<OperatingMode>,
    transitions: VecDeque<ModeTransition>,
}

pub struct ModeController {
    mode: AtomicU8,
    state: Mutex<ControlState>,
    backends: BackendSet,
    store: Arc<dyn KnowledgeStore>,
    config: ModeConfig,
    probe_timeout: Duration,
}

impl ModeController {
    /// Start at the best tier the configured collaborators allow
    pub fn new(
        backends: BackendSet,
        store: Arc<dyn KnowledgeStore>,
        config: ModeConfig,
        probe_timeout: Duration,
    ) -> Self {
        let health = HealthSnapshot {
            store: true,
            primary: backends.primary.is_some(),
            secondary: backends.secondary.is_some(),
        };
        let initial = health.tier();
        tracing::info!(mode = %initial, "Operating mode initialised");

        Self {
            mode: AtomicU8::new(initial.as_u8()),
            state: Mutex::new(ControlState {
                health,
                pending_promotion: None,
                transitions: VecDeque::with_capacity(config.transition_log_capacity),
            }),
            backends,
            store,
            config,
            probe_timeout,
        }
    }

    pub fn current(&self) -> OperatingMode {
        OperatingMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn health(&self) -> HealthSnapshot {
        self.lock().health
    }

    pub fn pending_promotion(&self) -> Option<OperatingMode> {
        self.lock().pending_promotion
    }

    /// Recorded transitions, oldest first
    pub fn transitions(&self) -> Vec<ModeTransition> {
        self.lock().transitions.iter().cloned().collect()
    }

    /// Snapshot the plan for a new request, applying any pending promotion.
    ///
    /// `mode_hint` can only lower the tier.
    pub fn begin_request(&self, mode_hint: Option<OperatingMode>) -> ExecutionPlan {
        let (mode, health) = {
            let mut state = self.lock();
            if let Some(target) = state.pending_promotion.take() {
                let current = self.current();
                if target < current {
                    self.transition(&mut state, current, target, "health probe succeeded");
                }
            }
            (self.current(), state.health)
        };

        let effective = mode_hint.map_or(mode, |hint| mode.lowest(hint));
        ExecutionPlan::for_mode(effective, health)
    }

    /// Health signal: a collaborator failed. Demotes when the tier drops.
    pub fn report_failure(&self, component: Component, reason: &str) {
        let mut state = self.lock();
        state.health.set(component, false);
        state.pending_promotion = None;

        let current = self.current();
        let target = state.health.tier();
        if target > current {
            let reason = format!("{} failed: {}", component.as_str(), reason);
            self.transition(&mut state, current, target, &reason);
        }
    }

    /// Ping every collaborator and update health.
    ///
    /// A lower tier applies at once; a higher tier becomes a pending
    /// promotion for the next request.
    pub async fn probe(&self) -> HealthSnapshot {
        let store = matches!(
            tokio::time::timeout(self.probe_timeout, self.store.ping()).await,
            Ok(Ok(()))
        );
        let primary = self.probe_backend(self.backends.primary.as_ref()).await;
        let secondary = self.probe_backend(self.backends.secondary.as_ref()).await;
        let health = HealthSnapshot {
            store,
            primary,
            secondary,
        };

        let mut state = self.lock();
        state.health = health;
        let current = self.current();
        let target = health.tier();

        if target > current {
            state.pending_promotion = None;
            self.transition(&mut state, current, target, "health probe failed");
        } else if target < current {
            if state.pending_promotion != Some(target) {
                tracing::info!(from = %current, to = %target, "Promotion pending until next request");
            }
            state.pending_promotion = Some(target);
        } else {
            state.pending_promotion = None;
        }

        tracing::debug!(store = store, primary = primary, secondary = secondary, "Health probe complete");
        health
    }

    /// Run `probe` every `probe_interval_secs` until the task is dropped
    pub async fn run_probe_loop(self: Arc<Self>) {
        if self.config.probe_interval_secs == 0 {
            return;
        }
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.probe_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.probe().await;
        }
    }

    async fn probe_backend(&self, backend: Option<&Arc<dyn LanguageBackend>>) -> bool {
        match backend {
            Some(backend) => matches!(
                tokio::time::timeout(self.probe_timeout, backend.health()).await,
                Ok(Ok(()))
            ),
            None => false,
        }
    }

    fn transition(&self, state: &mut ControlState, from: OperatingMode, to: OperatingMode, reason: &str) {
        self.mode.store(to.as_u8(), Ordering::Release);
        record_mode_transition(from, to);

        if to > from {
            tracing::warn!(from = %from, to = %to, reason = %reason, "Operating mode demoted");
        } else {
            tracing::info!(from = %from, to = %to, reason = %reason, "Operating mode promoted");
        }

        if self.config.transition_log_capacity > 0 {
            if state.transitions.len() == self.config.transition_log_capacity {
                state.transitions.pop_front();
            }
            state.transitions.push_back(ModeTransition {
                from,
                to,
                reason: reason.to_string(),
                at: Utc::now(),
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ToggleStore;
    use medforge_common::llm::{ScriptedBackend, ScriptedFailure};

    struct Fixture {
        controller: ModeController,
        store: Arc<ToggleStore>,
        primary: Arc<ScriptedBackend>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(ToggleStore::new());
        let primary = Arc::new(ScriptedBackend::new("hosted").with_default("{}"));
        let secondary = Arc::new(ScriptedBackend::new("local").with_default("{}"));
        let controller = ModeController::new(
            BackendSet::new(Some(primary.clone()), Some(secondary)),
            store.clone(),
            ModeConfig::default(),
            Duration::from_millis(200),
        );
        Fixture {
            controller,
            store,
            primary,
        }
    }

    #[test]
    fn test_plans_per_mode() {
        let healthy = HealthSnapshot {
            store: true,
            primary: true,
            secondary: true,
        };

        let full = ExecutionPlan::for_mode(OperatingMode::Full, healthy);
        assert!(full.retrieval);
        assert_eq!(full.backend, Some(BackendChoice::Primary));
        assert_eq!(full.stages.len(), 4);

        let minimal = ExecutionPlan::for_mode(OperatingMode::Minimal, healthy);
        assert_eq!(minimal.backend, None);
        assert!(minimal.runs(StageName::DrugInteraction));
        assert!(!minimal.runs(StageName::ClinicalReasoning));

        let fallback = ExecutionPlan::for_mode(OperatingMode::Fallback, healthy);
        assert!(fallback.is_fallback());
        assert!(!fallback.retrieval);
        assert!(fallback.stages.is_empty());
    }

    #[test]
    fn test_tier_from_health() {
        let tier = |store, primary, secondary| {
            HealthSnapshot {
                store,
                primary,
                secondary,
            }
            .tier()
        };
        assert_eq!(tier(true, true, true), OperatingMode::Full);
        assert_eq!(tier(false, true, true), OperatingMode::Basic);
        assert_eq!(tier(true, false, true), OperatingMode::Basic);
        assert_eq!(tier(true, false, false), OperatingMode::Minimal);
        assert_eq!(tier(false, false, false), OperatingMode::Fallback);
    }

    #[tokio::test]
    async fn test_store_failure_demotes_to_basic_without_retrieval() {
        let f = fixture();
        assert_eq!(f.controller.current(), OperatingMode::Full);

        f.controller.report_failure(Component::Store, "query timed out");
        let plan = f.controller.begin_request(None);
        assert_eq!(plan.mode, OperatingMode::Basic);
        assert!(!plan.retrieval);
        assert_eq!(plan.backend, Some(BackendChoice::Primary));

        let log = f.controller.transitions();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].from, OperatingMode::Full);
        assert!(log[0].reason.contains("store"));
    }

    #[tokio::test]
    async fn test_primary_failure_switches_to_secondary() {
        let f = fixture();
        f.controller.report_failure(Component::Primary, "rate limited");
        let plan = f.controller.begin_request(None);
        assert_eq!(plan.mode, OperatingMode::Basic);
        assert_eq!(plan.backend, Some(BackendChoice::Secondary));
        assert!(plan.retrieval);
    }

    #[tokio::test]
    async fn test_both_backends_down_never_full_or_basic() {
        let f = fixture();
        f.controller.report_failure(Component::Primary, "timeout");
        f.controller.report_failure(Component::Secondary, "unavailable");
        let plan = f.controller.begin_request(None);
        assert!(plan.mode >= OperatingMode::Minimal);
        assert_eq!(plan.backend, None);

        f.controller.report_failure(Component::Store, "unavailable");
        assert_eq!(f.controller.current(), OperatingMode::Fallback);
    }

    #[tokio::test]
    async fn test_promotion_waits_for_next_request() {
        let f = fixture();
        f.primary.set_failure(Some(ScriptedFailure::Unavailable));
        f.controller.probe().await;
        assert_eq!(f.controller.current(), OperatingMode::Basic);

        f.primary.set_failure(None);
        f.controller.probe().await;
        assert_eq!(f.controller.current(), OperatingMode::Basic);
        assert_eq!(f.controller.pending_promotion(), Some(OperatingMode::Full));

        let plan = f.controller.begin_request(None);
        assert_eq!(plan.mode, OperatingMode::Full);
        assert_eq!(f.controller.pending_promotion(), None);
    }

    #[tokio::test]
    async fn test_failure_cancels_pending_promotion() {
        let f = fixture();
        f.controller.report_failure(Component::Store, "down");
        f.controller.probe().await;
        assert_eq!(f.controller.pending_promotion(), Some(OperatingMode::Full));

        f.store.set_failing(true);
        f.controller.report_failure(Component::Store, "down again");
        assert_eq!(f.controller.begin_request(None).mode, OperatingMode::Basic);
    }

    #[tokio::test]
    async fn test_mode_hint_only_lowers() {
        let f = fixture();
        let plan = f.controller.begin_request(Some(OperatingMode::Minimal));
        assert_eq!(plan.mode, OperatingMode::Minimal);
        assert_eq!(f.controller.current(), OperatingMode::Full);

        f.controller.report_failure(Component::Primary, "x");
        f.controller.report_failure(Component::Secondary, "x");
        let plan = f.controller.begin_request(Some(OperatingMode::Full));
        assert_eq!(plan.mode, OperatingMode::Minimal);
    }

    #[tokio::test]
    async fn test_transition_log_is_bounded() {
        let store = Arc::new(ToggleStore::new());
        let primary = Arc::new(ScriptedBackend::new("hosted").with_default("{}"));
        let controller = ModeController::new(
            BackendSet::new(Some(primary.clone()), None),
            store.clone(),
            ModeConfig {
                probe_interval_secs: 0,
                transition_log_capacity: 2,
            },
            Duration::from_millis(200),
        );

        for _ in 0..3 {
            controller.report_failure(Component::Store, "down");
            controller.probe().await;
            controller.begin_request(None);
        }
        assert_eq!(controller.transitions().len(), 2);
    }
}
