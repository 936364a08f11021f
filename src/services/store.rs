use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::filters::{matches_filter, CandidateFilter};
use crate::models::{CandidateProfile, Enrichment};

/// Errors that can occur when reading the candidate store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid candidate data: {0}")]
    InvalidData(String),
}

/// Read-only candidate store
///
/// Implementations must apply visibility and scope membership before any
/// optional predicate, including the skill overlap, and never return more
/// than `filter.limit` rows when a limit is set.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn query_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<CandidateProfile>, StoreError>;

    /// Visible profiles with no optional predicate
    async fn query_visible(
        &self,
        scope_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CandidateProfile>, StoreError> {
        let filter = CandidateFilter {
            scope_id: scope_id.map(str::to_string),
            limit: Some(limit),
            ..Default::default()
        };
        self.query_candidates(&filter).await
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

/// Optional collaborator supplying extra per-candidate context
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    async fn enrich(&self, profile_ids: &[String]) -> Result<Vec<Enrichment>, StoreError>;
}

/// Candidate store over an in-memory snapshot
///
/// Used by tests, benches and local runs seeded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCandidateStore {
    profiles: Vec<CandidateProfile>,
}

impl InMemoryCandidateStore {
    pub fn new(profiles: Vec<CandidateProfile>) -> Self {
        Self { profiles }
    }

    /// Load a JSON array of profiles
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            StoreError::Unavailable(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        let profiles: Vec<CandidateProfile> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        tracing::info!("Loaded {} candidate profiles from {}", profiles.len(), path.as_ref().display());
        Ok(Self::new(profiles))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl CandidateStore for InMemoryCandidateStore {
    async fn query_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<CandidateProfile>, StoreError> {
        Ok(self
            .profiles
            .iter()
            .filter(|profile| matches_filter(profile, filter))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, visible: bool, rosters: &[&str]) -> CandidateProfile {
        CandidateProfile {
            id: id.to_string(),
            first_name: format!("Performer {}", id),
            is_visible: visible,
            roster_ids: rosters.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_query_visible_skips_hidden_profiles() {
        let store = InMemoryCandidateStore::new(vec![
            profile("1", true, &[]),
            profile("2", false, &[]),
            profile("3", true, &[]),
        ]);

        let visible = store.query_visible(None, 10).await.unwrap();
        let ids: Vec<_> = visible.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_query_respects_limit_and_scope() {
        let store = InMemoryCandidateStore::new(
            (0..10)
                .map(|i| {
                    let rosters: &[&str] = if i % 2 == 0 { &["r1"] } else { &[] };
                    profile(&i.to_string(), true, rosters)
                })
                .collect(),
        );

        assert_eq!(store.query_visible(None, 3).await.unwrap().len(), 3);
        let scoped = store.query_visible(Some("r1"), 100).await.unwrap();
        assert_eq!(scoped.len(), 5);
        assert!(scoped.iter().all(|p| p.roster_ids.contains(&"r1".to_string())));
    }

    #[tokio::test]
    async fn test_unlimited_filter_reads_whole_pool() {
        let store = InMemoryCandidateStore::new((0..300).map(|i| profile(&i.to_string(), true, &[])).collect());

        let all = store.query_candidates(&CandidateFilter::default()).await.unwrap();
        assert_eq!(all.len(), 300);
        assert_eq!(all.last().unwrap().id, "299");
    }

    #[test]
    fn test_missing_seed_file_is_unavailable() {
        let err = InMemoryCandidateStore::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
