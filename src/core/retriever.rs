use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

use crate::core::filters::build_filter_plan;
use crate::core::scoring::calculate_completeness_score;
use crate::models::{CandidateProfile, CompletenessWeights, ParsedQuery, QueryResult, SearchMethod};
use crate::services::store::{CandidateStore, StoreError};

/// Audit entry reported when the filtered read degrades
pub const FALLBACK_FILTER_NOTE: &str = "fallback - no filters applied";

/// Caps and timeouts for retrieval
#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    pub max_results: usize,
    pub broad_max_results: usize,
    pub fallback_limit: usize,
    pub timeout: Duration,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            max_results: 20,
            broad_max_results: 50,
            fallback_limit: 20,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Filtered, tolerant candidate retrieval
///
/// # Pipeline Stages
/// 1. Unbounded store read with visibility, scope, tolerant structured
///    predicates and skill overlap
/// 2. Completeness ranking with per-request random tie-breaks
/// 3. Cap (raised for broad searches)
///
/// Any store failure or timeout degrades to an unfiltered read of the visible
/// pool with `method = fallback`.
#[derive(Clone)]
pub struct CandidateRetriever {
    store: Arc<dyn CandidateStore>,
    weights: CompletenessWeights,
    settings: RetrieverSettings,
    seed: Option<u64>,
}

impl CandidateRetriever {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        weights: CompletenessWeights,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            store,
            weights,
            settings,
            seed: None,
        }
    }

    /// Fix the tie-break seed; `None` draws from OS entropy per request
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    fn request_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Retrieve ranked candidates for a parsed query. Never fails.
    pub async fn retrieve(&self, parsed: &ParsedQuery, scope_id: Option<&str>) -> QueryResult {
        let mut rng = self.request_rng();

        match self.retrieve_structured(parsed, scope_id, &mut rng).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Filtered retrieval failed, using fallback: {}", e);
                self.retrieve_fallback(scope_id, &mut rng).await
            }
        }
    }

    /// Filtered read, surfacing store errors to the caller
    pub async fn retrieve_structured<R: Rng + ?Sized>(
        &self,
        parsed: &ParsedQuery,
        scope_id: Option<&str>,
        rng: &mut R,
    ) -> Result<QueryResult, StoreError> {
        let plan = build_filter_plan(parsed, scope_id);

        let matched = tokio::time::timeout(
            self.settings.timeout,
            self.store.query_candidates(&plan.filter),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.settings.timeout))??;

        let total_matched = matched.len();

        let cap = if parsed.broad_search {
            self.settings.broad_max_results
        } else {
            self.settings.max_results
        };

        let mut profiles = rank_candidates(matched, &self.weights, rng);
        profiles.truncate(cap);

        tracing::debug!(
            "Structured retrieval: matched={}, returned={}",
            total_matched,
            profiles.len()
        );

        Ok(QueryResult {
            profiles,
            method: SearchMethod::Structured,
            total_matched,
            filters_applied: plan.filters_applied,
        })
    }

    async fn retrieve_fallback<R: Rng + ?Sized>(
        &self,
        scope_id: Option<&str>,
        rng: &mut R,
    ) -> QueryResult {
        let read = tokio::time::timeout(
            self.settings.timeout,
            self.store.query_visible(scope_id, self.settings.fallback_limit),
        )
        .await;

        let pool = match read {
            Ok(Ok(profiles)) => profiles,
            Ok(Err(e)) => {
                tracing::error!("Fallback retrieval failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                tracing::error!("Fallback retrieval timed out after {:?}", self.settings.timeout);
                Vec::new()
            }
        };

        let total_matched = pool.len();
        let mut profiles = rank_candidates(pool, &self.weights, rng);
        profiles.truncate(self.settings.fallback_limit);

        QueryResult {
            profiles,
            method: SearchMethod::Fallback,
            total_matched,
            filters_applied: vec![FALLBACK_FILTER_NOTE.to_string()],
        }
    }
}

/// Order profiles by completeness, breaking ties randomly
///
/// The slice is shuffled first and then stably sorted by score, so candidates
/// with equal scores land in a uniformly random relative order.
pub fn rank_candidates<R: Rng + ?Sized>(
    mut profiles: Vec<CandidateProfile>,
    weights: &CompletenessWeights,
    rng: &mut R,
) -> Vec<CandidateProfile> {
    profiles.shuffle(rng);

    let mut scored: Vec<(f64, CandidateProfile)> = profiles
        .into_iter()
        .map(|profile| (calculate_completeness_score(&profile, weights), profile))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored.into_iter().map(|(_, profile)| profile).collect()
}
