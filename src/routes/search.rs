use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use tracing::Instrument;
use validator::Validate;

use crate::core::pipeline::SearchPipeline;
use crate::core::vocabulary::VocabularySnapshot;
use crate::models::{ErrorResponse, HealthResponse, SearchRequest};
use crate::services::store::CandidateStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SearchPipeline,
    pub store: Arc<dyn CandidateStore>,
}

/// Configure all search-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/vocabulary", web::get().to(vocabulary))
        .route("/search", web::post().to(search));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = match state.store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Candidate store health check failed: {}", e);
            false
        }
    };

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Closed vocabularies accepted by the search pipeline
async fn vocabulary() -> impl Responder {
    HttpResponse::Ok().json(VocabularySnapshot::current())
}

/// Conversational search endpoint
///
/// POST /api/v1/search
///
/// Request body:
/// ```json
/// {
///   "message": "I need a 5'8 martial artist in Atlanta",
///   "history": [{"role": "user", "content": "..."}],
///   "scopeId": "optional roster id"
/// }
/// ```
async fn search(state: web::Data<AppState>, req: web::Json<SearchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for search request: {}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("search", %request_id);

    span.in_scope(|| {
        tracing::info!(
            "Search request: message_len={}, history_turns={}, scoped={}",
            req.message.len(),
            req.history.len(),
            req.scope_id.is_some()
        )
    });

    let result = state.pipeline.run(&req).instrument(span).await;

    HttpResponse::Ok().json(result)
}
