//! Analyzer - the `analyze` entry point
//!
//! Provides:
//! - `AnalyzeRequest`: case plus optional mode hint and safety level
//! - `Analyzer`: wires extraction, linking, retrieval, context assembly, the
//!   agent pipeline, validation and aggregation behind one call
//! - Cancellable analysis
//!
//! Recoverable collaborator failures never fail a request: they lower the
//! reported mode, degrade stages or route to the rule-based fallback.

use crate::aggregate::{AggregateInput, ResultAggregator};
use crate::agents::AgentPipeline;
use crate::cancel::CancelSignal;
use crate::context::ContextAssembler;
use crate::extraction::EntityExtractor;
use crate::fallback::{FallbackRules, KeywordRules};
use crate::linking::ConceptLinker;
use crate::mode::{Component, ExecutionPlan, ModeController};
use crate::retrieval::Retriever;
use crate::validation::Validator;
use medforge_common::config::{AppConfig, PipelineConfig};
use medforge_common::embeddings::{create_embedder, Embedder};
use medforge_common::errors::{AppError, Result};
use medforge_common::llm::BackendSet;
use medforge_common::metrics::record_analysis;
use medforge_common::model::{
    ClinicalCase, ClinicalRecommendation, EntitySummary, ExtractedEntity, OperatingMode, RiskLevel,
    StageName,
};
use medforge_knowledge::{ConceptOntology, KnowledgeStore};
use std::sync::Arc;
use std::time::Instant;

/// One analysis request
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub case: ClinicalCase,
    /// Caps the tier for this request; never raises it
    pub mode_hint: Option<OperatingMode>,
    /// Selects the surface threshold findings must clear
    pub safety_level: RiskLevel,
}

impl AnalyzeRequest {
    pub fn new(case: ClinicalCase) -> Self {
        Self {
            case,
            mode_hint: None,
            safety_level: RiskLevel::default(),
        }
    }

    /// Request over free text only
    pub fn from_text(case_text: impl Into<String>) -> Self {
        Self::new(ClinicalCase::new(case_text))
    }

    pub fn with_mode_hint(mut self, mode_hint: OperatingMode) -> Self {
        self.mode_hint = Some(mode_hint);
        self
    }

    pub fn with_safety_level(mut self, safety_level: RiskLevel) -> Self {
        self.safety_level = safety_level;
        self
    }
}

/// Injected collaborators
pub struct AnalyzerParts {
    pub backends: BackendSet,
    pub store: Arc<dyn KnowledgeStore>,
    pub ontology: Arc<dyn ConceptOntology>,
    pub embedder: Arc<dyn Embedder>,
    pub fallback: Arc<dyn FallbackRules>,
}

pub struct Analyzer {
    extractor: EntityExtractor,
    linker: ConceptLinker,
    retriever: Arc<Retriever>,
    assembler: Arc<ContextAssembler>,
    pipeline: AgentPipeline,
    mode: Arc<ModeController>,
    fallback: Arc<dyn FallbackRules>,
    aggregator: ResultAggregator,
    embedder: Arc<dyn Embedder>,
}

impl Analyzer {
    pub fn new(config: PipelineConfig, parts: AnalyzerParts) -> Self {
        let timeouts = &config.timeouts;
        let mode = Arc::new(ModeController::new(
            parts.backends.clone(),
            parts.store.clone(),
            config.mode.clone(),
            timeouts.probe(),
        ));
        let retriever = Arc::new(Retriever::new(
            parts.store,
            parts.embedder.clone(),
            config.retrieval.clone(),
            timeouts.store(),
        ));
        let assembler = Arc::new(ContextAssembler::new(
            config.context.clone(),
            config.retrieval.per_category_cap,
        ));
        let validator = Validator::new(
            parts.ontology.clone(),
            config.validation.clone(),
            timeouts.ontology(),
        );
        let pipeline = AgentPipeline::new(
            parts.backends,
            mode.clone(),
            retriever.clone(),
            assembler.clone(),
            validator,
            config.agents.clone(),
            timeouts.stage(),
        );

        Self {
            extractor: EntityExtractor::new(config.extraction.clone()),
            linker: ConceptLinker::new(parts.ontology, config.linking.clone(), timeouts.ontology()),
            retriever,
            assembler,
            pipeline,
            mode,
            fallback: parts.fallback,
            aggregator: ResultAggregator::new(),
            embedder: parts.embedder,
        }
    }

    /// Validate configuration and build the HTTP-backed collaborators
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn KnowledgeStore>,
        ontology: Arc<dyn ConceptOntology>,
    ) -> Result<Self> {
        config.validate()?;
        let backends = BackendSet::from_config(&config.backends)?;
        let embedder = create_embedder(&config.embedding)?;

        tracing::info!(
            primary = backends.primary.is_some(),
            secondary = backends.secondary.is_some(),
            embedder = %embedder.model_name(),
            "Analyzer configured"
        );

        Ok(Self::new(
            config.pipeline.clone(),
            AnalyzerParts {
                backends,
                store,
                ontology,
                embedder,
                fallback: Arc::new(KeywordRules::new()),
            },
        ))
    }

    pub fn mode(&self) -> &Arc<ModeController> {
        &self.mode
    }

    /// The embedder retrieval queries with; documents must be indexed with it too
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Analyze one case.
    ///
    /// Fails only on malformed input (`Extraction`).
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<ClinicalRecommendation> {
        let started = Instant::now();
        let AnalyzeRequest {
            case,
            mode_hint,
            safety_level,
        } = request;

        let entities = self.extractor.extract(&case)?;
        let entity_summary = EntitySummary::from_entities(&entities);
        let plan = self.mode.begin_request(mode_hint);

        tracing::debug!(
            case_id = %case.id,
            mode = %plan.mode,
            entities = entities.len(),
            "Request planned"
        );

        let (recommendation, documents) = if plan.is_fallback() {
            (self.run_fallback(&case, &entities, entity_summary, started).await, 0)
        } else {
            self.run_pipeline(&case, entities, entity_summary, plan, safety_level, started)
                .await
        };

        let elapsed = started.elapsed();
        record_analysis(
            elapsed.as_secs_f64(),
            recommendation.operating_mode,
            recommendation.risk_level,
            documents,
        );
        tracing::info!(
            case_id = %case.id,
            mode = %recommendation.operating_mode,
            risk = %recommendation.risk_level.as_str(),
            confidence = recommendation.overall_confidence,
            citations = recommendation.citations.len(),
            degraded = recommendation.degraded_stages.len(),
            suppressed = recommendation.suppressed_findings.len(),
            latency_ms = elapsed.as_millis() as u64,
            "Analysis complete"
        );

        Ok(recommendation)
    }

    /// `analyze`, abandoned with `Cancelled` once the signal fires
    pub async fn analyze_with_cancel(
        &self,
        request: AnalyzeRequest,
        mut cancel: CancelSignal,
    ) -> Result<ClinicalRecommendation> {
        let case_id = request.case.id;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(case_id = %case_id, "Analysis cancelled");
                Err(AppError::Cancelled)
            }
            result = self.analyze(request) => result,
        }
    }

    async fn run_pipeline(
        &self,
        case: &ClinicalCase,
        entities: Vec<ExtractedEntity>,
        entity_summary: EntitySummary,
        mut plan: ExecutionPlan,
        safety_level: RiskLevel,
        started: Instant,
    ) -> (ClinicalRecommendation, usize) {
        let linking = self.linker.link(&entities).await;

        let documents = if plan.retrieval {
            let outcome = self.retriever.retrieve(&case.raw_text, &linking).await;
            if outcome.failed_queries > 0 && !outcome.store_failed {
                tracing::warn!(
                    case_id = %case.id,
                    failed_queries = outcome.failed_queries,
                    "Retrieval ran with partial concept coverage"
                );
            }
            if outcome.store_failed {
                self.mode
                    .report_failure(Component::Store, "retrieval query failed");
                // Finish without retrieval, reported at the tier that reflects it
                plan.retrieval = false;
                plan.mode = plan.mode.lowest(OperatingMode::Basic);
            }
            outcome.documents
        } else {
            Vec::new()
        };

        if documents.is_empty() {
            tracing::warn!(case_id = %case.id, error = %AppError::RetrievalEmpty, "Reasoning without retrieved evidence");
        }

        let bundle = self.assembler.assemble(documents, entities, &linking);
        let output = self.pipeline.run(case, bundle, &plan, safety_level).await;
        let documents = output.evidence.documents.len();

        let recommendation = self.aggregator.aggregate(AggregateInput {
            case_id: case.id,
            findings: output.findings,
            suppressed: output.suppressed,
            report: output.report,
            degraded: output.degraded,
            reasoning_skipped: !plan.runs(StageName::ClinicalReasoning),
            entity_summary,
            mode: plan.mode,
            started,
        });
        (recommendation, documents)
    }

    async fn run_fallback(
        &self,
        case: &ClinicalCase,
        entities: &[ExtractedEntity],
        entity_summary: EntitySummary,
        started: Instant,
    ) -> ClinicalRecommendation {
        match self.fallback.evaluate(case, entities).await {
            Ok(findings) => self
                .aggregator
                .fallback(case.id, findings, entity_summary, started),
            Err(e) => {
                tracing::error!(case_id = %case.id, error = %e, "Fallback rules failed");
                let mut record = ClinicalRecommendation::exhausted(
                    case.id,
                    e.to_string(),
                    started.elapsed().as_millis() as u64,
                );
                record.entity_summary = entity_summary;
                record
            }
        }
    }
}
