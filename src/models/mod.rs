// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CandidateProfile, Certification, CompletenessWeights, Enrichment, ParsedQuery, QueryResult,
    RecommendationResult, SearchMethod, SearchStats, Skill, Turn, TurnRole,
};
pub use requests::SearchRequest;
pub use responses::{ErrorResponse, HealthResponse};
