//! Cast Scout - conversational performer search
//!
//! A user describes the performer they need in free text and receives a
//! ranked, explained shortlist. Each turn runs three stages in sequence:
//! interpretation into a closed-vocabulary query, tolerant filtered
//! retrieval ranked by profile completeness, and composition of a
//! recommendation that references only real candidate identifiers.
//! Every stage degrades to a documented fallback instead of failing.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{
    CandidateRetriever, KeywordInterpreter, LlmInterpreter, QueryInterpreter,
    RecommendationComposer, SearchPipeline,
};
pub use models::{ParsedQuery, QueryResult, RecommendationResult, SearchRequest};
