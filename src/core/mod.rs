// Core pipeline exports
pub mod composer;
pub mod filters;
pub mod interpreter;
pub mod pipeline;
pub mod retriever;
pub mod scoring;
pub mod trailer;
pub mod vocabulary;

pub use composer::{ComposerSettings, RecommendationComposer};
pub use filters::{build_filter_plan, matches_filter, matches_skills, CandidateFilter, FilterPlan};
pub use interpreter::{
    validate_parsed_query, KeywordInterpreter, LlmInterpreter, QueryInterpreter, ValidatedQuery,
    ValidationRejection,
};
pub use pipeline::{PipelineStage, SearchPipeline, StageOutcome};
pub use retriever::{rank_candidates, CandidateRetriever, RetrieverSettings, FALLBACK_FILTER_NOTE};
pub use scoring::calculate_completeness_score;
