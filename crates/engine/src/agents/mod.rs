//! Agent pipeline - the four reasoning stages
//!
//! Provides:
//! - Clinical reasoning (differentials and actions) and drug interaction
//!   stages, run concurrently over their own copy of the context
//! - Knowledge validation joining both
//! - Patient education over the validated findings only
//! - One feedback retrieval round per stage
//! - Bounded, at-most-once-retried backend calls that report failures to the
//!   mode controller
//!
//! A stage whose backend call fails or returns garbage is degraded: it
//! contributes no generated findings and the pipeline carries on.

mod clinical;
mod education;
mod interaction;
mod parse;
mod prompt;

pub(crate) use interaction::risk_for;

use crate::context::ContextAssembler;
use crate::mode::{BackendChoice, ExecutionPlan, ModeController};
use crate::retrieval::Retriever;
use crate::validation::{retrieval_support, ValidationInput, Validator};
use medforge_common::config::AgentsConfig;
use medforge_common::errors::{AppError, Result};
use medforge_common::llm::{bounded, BackendSet, GenerationRequest, LanguageBackend};
use medforge_common::metrics::{record_backend_call, record_stage_degraded};
use medforge_common::model::{
    AgentFinding, Citation, ClinicalCase, ContextBundle, RiskLevel, SourceCategory, StageName,
    SuppressedFinding, ValidationReport,
};
use std::sync::Arc;
use std::time::Duration;

/// A stage may ask for one extra retrieval round
#[derive(Debug)]
pub struct FeedbackBudget {
    remaining: u8,
}

impl FeedbackBudget {
    pub fn single() -> Self {
        Self { remaining: 1 }
    }

    /// Consume the round; false once spent
    pub fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// What one stage produced
#[derive(Debug, Default)]
pub(crate) struct StageOutput {
    pub findings: Vec<AgentFinding>,
    /// The stage's context, including feedback documents
    pub bundle: ContextBundle,
    pub degraded: Option<String>,
}

impl StageOutput {
    fn degraded(bundle: ContextBundle, reason: impl Into<String>) -> Self {
        Self {
            findings: Vec::new(),
            bundle,
            degraded: Some(reason.into()),
        }
    }
}

/// Result of running the pipeline for one request
#[derive(Debug, Default)]
pub struct PipelineOutput {
    /// Validated findings plus the patient explanation, if any
    pub findings: Vec<AgentFinding>,
    pub suppressed: Vec<SuppressedFinding>,
    pub report: ValidationReport,
    pub degraded: Vec<StageName>,
    /// Union of every stage's context
    pub evidence: ContextBundle,
}

/// Per-request view handed to each stage
pub(crate) struct StageRun<'a> {
    pipeline: &'a AgentPipeline,
    pub case: &'a ClinicalCase,
    pub plan: &'a ExecutionPlan,
    backend: Option<(BackendChoice, Arc<dyn LanguageBackend>)>,
}

impl<'a> StageRun<'a> {
    pub fn config(&self) -> &AgentsConfig {
        &self.pipeline.config
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Pre-validation confidence: retrieval support capped by the backend's own
    pub fn confidence(&self, citations: &[Citation], bundle: &ContextBundle, backend_confidence: f32) -> f32 {
        retrieval_support(citations, bundle, self.pipeline.validator.config())
            .min(backend_confidence)
            .clamp(0.0, 1.0)
    }

    /// Call the request's backend under the stage timeout
    pub async fn generate(&self, stage: StageName, request: &GenerationRequest) -> Result<String> {
        let (choice, backend) = self.backend.as_ref().ok_or_else(|| AppError::StageDegraded {
            stage: stage.to_string(),
            reason: "no generative backend available".to_string(),
        })?;
        self.pipeline.call_backend(stage, *choice, backend, request).await
    }

    /// Run the stage's feedback round, if retrieval is allowed and the budget
    /// is not spent. Returns the ids of documents added to `bundle`.
    pub async fn feedback(
        &self,
        stage: StageName,
        budget: &mut FeedbackBudget,
        bundle: &mut ContextBundle,
        query: &str,
        categories: Vec<SourceCategory>,
    ) -> Vec<String> {
        if !self.plan.retrieval || query.trim().is_empty() || !budget.take() {
            return Vec::new();
        }

        let documents = match self
            .pipeline
            .retriever
            .retrieve_targeted(query, Some(categories), self.pipeline.config.feedback_k)
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "Feedback retrieval failed");
                return Vec::new();
            }
        };

        let added = self.pipeline.assembler.extend(bundle, documents);
        tracing::debug!(stage = %stage, added = added.len(), "Feedback round complete");
        added
    }
}

pub struct AgentPipeline {
    backends: BackendSet,
    mode: Arc<ModeController>,
    retriever: Arc<Retriever>,
    assembler: Arc<ContextAssembler>,
    validator: Validator,
    config: AgentsConfig,
    stage_timeout: Duration,
}

impl AgentPipeline {
    pub fn new(
        backends: BackendSet,
        mode: Arc<ModeController>,
        retriever: Arc<Retriever>,
        assembler: Arc<ContextAssembler>,
        validator: Validator,
        config: AgentsConfig,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            backends,
            mode,
            retriever,
            assembler,
            validator,
            config,
            stage_timeout,
        }
    }

    /// Run the stages the plan allows
    pub async fn run(
        &self,
        case: &ClinicalCase,
        bundle: ContextBundle,
        plan: &ExecutionPlan,
        safety_level: RiskLevel,
    ) -> PipelineOutput {
        let backend = plan
            .backend
            .and_then(|choice| choice.resolve(&self.backends).map(|b| (choice, b)));
        let run = StageRun {
            pipeline: self,
            case,
            plan,
            backend,
        };

        let clinical_bundle = bundle.clone();
        let interaction_bundle = bundle.clone();
        let (clinical, interaction) = tokio::join!(
            async {
                if plan.runs(StageName::ClinicalReasoning) {
                    Some(clinical::run(&run, clinical_bundle, FeedbackBudget::single()).await)
                } else {
                    None
                }
            },
            async {
                if plan.runs(StageName::DrugInteraction) {
                    Some(interaction::run(&run, interaction_bundle, FeedbackBudget::single()).await)
                } else {
                    None
                }
            }
        );

        let mut output = PipelineOutput {
            evidence: bundle,
            ..PipelineOutput::default()
        };
        let mut candidates = Vec::new();
        for (stage, stage_output) in [
            (StageName::ClinicalReasoning, clinical),
            (StageName::DrugInteraction, interaction),
        ] {
            if let Some(stage_output) = stage_output {
                self.absorb(stage, stage_output, &mut output, &mut candidates);
            }
        }

        if !plan.runs(StageName::KnowledgeValidation) {
            return output;
        }

        let validated = self
            .validator
            .validate(ValidationInput {
                findings: candidates,
                bundle: &output.evidence,
                case,
                safety_level,
            })
            .await;
        output.findings = validated.retained;
        output.suppressed = validated.suppressed;
        output.report = validated.report;

        if plan.runs(StageName::PatientEducation) {
            let stage_output = education::run(&run, &output.findings).await;
            self.absorb(StageName::PatientEducation, stage_output, &mut output, &mut Vec::new());
        }

        output
    }

    /// Merge a stage's output into the request-level result
    fn absorb(
        &self,
        stage: StageName,
        stage_output: StageOutput,
        output: &mut PipelineOutput,
        candidates: &mut Vec<AgentFinding>,
    ) {
        if let Some(reason) = stage_output.degraded {
            let err = AppError::StageDegraded {
                stage: stage.to_string(),
                reason,
            };
            tracing::warn!(stage = %stage, error = %err, "Stage degraded");
            record_stage_degraded(stage);
            output.degraded.push(stage);
        }

        // Evidence is the union of stage contexts, still capped per category
        for doc in stage_output.bundle.documents {
            if output.evidence.get(&doc.doc_id).is_some() {
                continue;
            }
            if self.assembler.has_room(&output.evidence, doc.source_category) {
                output.evidence.documents.push(doc);
            } else {
                output.evidence.dropped_doc_ids.push(doc.doc_id);
            }
        }

        if stage == StageName::PatientEducation {
            output.findings.extend(stage_output.findings);
        } else {
            candidates.extend(stage_output.findings);
        }
    }

    async fn call_backend(
        &self,
        stage: StageName,
        choice: BackendChoice,
        backend: &Arc<dyn LanguageBackend>,
        request: &GenerationRequest,
    ) -> Result<String> {
        let attempts = self.config.retries() + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = bounded(
                backend.name(),
                self.stage_timeout,
                backend.generate(request, self.stage_timeout),
            )
            .await;
            record_backend_call(backend.name(), result.is_ok());

            match result {
                Ok(text) => return Ok(text),
                Err(e) if attempt < attempts && e.is_transient() => {
                    tracing::warn!(stage = %stage, backend = %backend.name(), error = %e, "Retrying backend call");
                }
                Err(e) => {
                    if e.is_backend_failure() {
                        self.mode.report_failure(choice.component(), &e.to_string());
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Finding ids are `<stage>-<n>`, 1-based, stable within a request
pub(crate) fn finding_id(stage: StageName, index: usize) -> String {
    format!("{}-{}", stage, index + 1)
}
