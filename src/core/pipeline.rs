use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::composer::RecommendationComposer;
use crate::core::interpreter::QueryInterpreter;
use crate::core::retriever::CandidateRetriever;
use crate::models::{
    Enrichment, ParsedQuery, QueryResult, RecommendationResult, SearchMethod, SearchRequest,
};
use crate::services::store::EnrichmentSource;

/// Ids forwarded to the enrichment source per request
const ENRICHMENT_ID_LIMIT: usize = 20;

/// Pipeline position, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Interpreting,
    Retrieving,
    Composing,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Interpreting => "interpreting",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Composing => "composing",
            PipelineStage::Done => "done",
        }
    }
}

/// Every stage either succeeds or degrades; neither aborts the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Fallback,
}

impl StageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Success => "success",
            StageOutcome::Fallback => "fallback",
        }
    }
}

/// Interpret -> retrieve -> compose, strictly in sequence
///
/// Stages share no mutable state, so one pipeline serves concurrent requests.
#[derive(Clone)]
pub struct SearchPipeline {
    interpreter: Arc<dyn QueryInterpreter>,
    retriever: CandidateRetriever,
    composer: Arc<RecommendationComposer>,
    enrichment: Option<Arc<dyn EnrichmentSource>>,
    enrichment_timeout: Duration,
}

impl SearchPipeline {
    pub fn new(
        interpreter: Arc<dyn QueryInterpreter>,
        retriever: CandidateRetriever,
        composer: RecommendationComposer,
    ) -> Self {
        Self {
            interpreter,
            retriever,
            composer: Arc::new(composer),
            enrichment: None,
            enrichment_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_enrichment(mut self, source: Arc<dyn EnrichmentSource>, timeout: Duration) -> Self {
        self.enrichment = Some(source);
        self.enrichment_timeout = timeout;
        self
    }

    /// Run one user turn end to end. Never fails.
    pub async fn run(&self, request: &SearchRequest) -> RecommendationResult {
        let started = Instant::now();

        let stage_start = Instant::now();
        let parsed = self
            .interpreter
            .interpret(&request.message, &request.history)
            .await;
        // A failed interpretation is indistinguishable from an empty parse
        let outcome = if parsed == ParsedQuery::empty() {
            StageOutcome::Fallback
        } else {
            StageOutcome::Success
        };
        log_stage(PipelineStage::Interpreting, outcome, stage_start);
        tracing::debug!("Parsed query: {:?}", parsed);

        let stage_start = Instant::now();
        let result = self
            .retriever
            .retrieve(&parsed, request.scope_id.as_deref())
            .await;
        let outcome = match result.method {
            SearchMethod::Fallback => StageOutcome::Fallback,
            _ => StageOutcome::Success,
        };
        log_stage(PipelineStage::Retrieving, outcome, stage_start);

        let enrichment = self.enrich(&result).await;

        let stage_start = Instant::now();
        let (recommendation, outcome) = self
            .composer
            .compose_with_outcome(&request.message, &parsed, &result, &request.history, &enrichment)
            .await;
        log_stage(PipelineStage::Composing, outcome, stage_start);

        tracing::info!(
            stage = PipelineStage::Done.as_str(),
            method = recommendation.search_stats.method.as_str(),
            total_found = recommendation.search_stats.total_found,
            recommended = recommendation.profile_ids.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search complete"
        );

        recommendation
    }

    async fn enrich(&self, result: &QueryResult) -> Vec<Enrichment> {
        let Some(source) = &self.enrichment else {
            return Vec::new();
        };
        if result.profiles.is_empty() {
            return Vec::new();
        }

        let ids: Vec<String> = result
            .profiles
            .iter()
            .take(ENRICHMENT_ID_LIMIT)
            .map(|p| p.id.clone())
            .collect();

        match tokio::time::timeout(self.enrichment_timeout, source.enrich(&ids)).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                tracing::warn!("Enrichment failed, continuing without it: {}", e);
                Vec::new()
            }
            Err(_) => {
                tracing::warn!("Enrichment timed out after {:?}", self.enrichment_timeout);
                Vec::new()
            }
        }
    }
}

fn log_stage(stage: PipelineStage, outcome: StageOutcome, started: Instant) {
    tracing::info!(
        stage = stage.as_str(),
        outcome = outcome.as_str(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Pipeline stage finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::composer::ComposerSettings;
    use crate::core::interpreter::KeywordInterpreter;
    use crate::core::retriever::RetrieverSettings;
    use crate::models::{CandidateProfile, CompletenessWeights};
    use crate::services::llm::{GenerationError, GenerationRequest, TextGenerator};
    use crate::services::store::{InMemoryCandidateStore, StoreError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoFirstId {
        seen_context: Mutex<Option<String>>,
    }

    #[async_trait]
    impl TextGenerator for EchoFirstId {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            let context = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let first_id = context
                .lines()
                .find_map(|line| line.strip_prefix("- id: "))
                .unwrap_or("none")
                .to_string();
            *self.seen_context.lock().unwrap() = Some(context);
            Ok(format!("Start with this one.\n[PROFILE_IDS: {}]", first_id))
        }
    }

    struct BrokenEnrichment;

    #[async_trait]
    impl EnrichmentSource for BrokenEnrichment {
        async fn enrich(&self, _ids: &[String]) -> Result<Vec<Enrichment>, StoreError> {
            Err(StoreError::Unavailable("credits offline".to_string()))
        }
    }

    struct StaticEnrichment;

    #[async_trait]
    impl EnrichmentSource for StaticEnrichment {
        async fn enrich(&self, ids: &[String]) -> Result<Vec<Enrichment>, StoreError> {
            Ok(ids
                .iter()
                .map(|id| Enrichment {
                    profile_id: id.clone(),
                    highlights: vec![format!("credit for {}", id)],
                })
                .collect())
        }
    }

    fn pipeline(generator: Arc<EchoFirstId>) -> SearchPipeline {
        let profiles = (0..5)
            .map(|i| CandidateProfile {
                id: format!("p{}", i),
                first_name: format!("Performer{}", i),
                location: Some("atlanta-ga".to_string()),
                is_visible: true,
                ..Default::default()
            })
            .collect();
        let retriever = CandidateRetriever::new(
            Arc::new(InMemoryCandidateStore::new(profiles)),
            CompletenessWeights::default(),
            RetrieverSettings::default(),
        )
        .with_seed(Some(1));

        SearchPipeline::new(
            Arc::new(KeywordInterpreter::new()),
            retriever,
            RecommendationComposer::new(generator, ComposerSettings::default()),
        )
    }

    fn generator() -> Arc<EchoFirstId> {
        Arc::new(EchoFirstId {
            seen_context: Mutex::new(None),
        })
    }

    #[tokio::test]
    async fn test_run_returns_dossier_ids() {
        let generator = generator();
        let out = pipeline(generator.clone())
            .run(&SearchRequest::new("atlanta performers"))
            .await;

        assert_eq!(out.profile_ids.len(), 1);
        assert!(out.profile_ids[0].starts_with('p'));
        assert_eq!(out.search_stats.method, SearchMethod::Structured);
        assert_eq!(out.search_stats.total_found, 5);
        assert!(out.search_stats.filters_applied.iter().any(|f| f.starts_with("location: atlanta-ga")));
    }

    #[tokio::test]
    async fn test_enrichment_failure_is_ignored() {
        let out = pipeline(generator())
            .with_enrichment(Arc::new(BrokenEnrichment), Duration::from_secs(1))
            .run(&SearchRequest::new("atlanta performers"))
            .await;

        assert_eq!(out.profile_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_enrichment_reaches_composer() {
        let generator = generator();
        pipeline(generator.clone())
            .with_enrichment(Arc::new(StaticEnrichment), Duration::from_secs(1))
            .run(&SearchRequest::new("atlanta performers"))
            .await;

        let context = generator.seen_context.lock().unwrap().clone().unwrap();
        assert!(context.contains("highlights: credit for p"));
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(PipelineStage::Interpreting.as_str(), "interpreting");
        assert_eq!(StageOutcome::Fallback.as_str(), "fallback");
    }
}
