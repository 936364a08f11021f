// Service exports
pub mod llm;
pub mod postgres;
pub mod store;

pub use llm::{GenerationError, LlmClient, TextGenerator};
pub use postgres::PostgresCandidateStore;
pub use store::{CandidateStore, EnrichmentSource, InMemoryCandidateStore, StoreError};
