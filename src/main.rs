use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use cast_scout::config::{LoggingSettings, Settings, StoreKind};
use cast_scout::core::{
    CandidateRetriever, KeywordInterpreter, LlmInterpreter, QueryInterpreter,
    RecommendationComposer, SearchPipeline,
};
use cast_scout::models::CompletenessWeights;
use cast_scout::routes::{self, AppState};
use cast_scout::services::{
    CandidateStore, EnrichmentSource, InMemoryCandidateStore, LlmClient, PostgresCandidateStore,
    TextGenerator,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingSettings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(std::io::Error::other(format!("Configuration error: {}", e)));
        }
    };

    init_tracing(&settings.logging);

    info!("Starting cast-scout search service...");

    // Candidate store (read-only)
    let (store, enrichment): (Arc<dyn CandidateStore>, Option<Arc<dyn EnrichmentSource>>) =
        match settings.store.kind {
            StoreKind::Postgres => {
                let url = settings
                    .database
                    .url
                    .as_deref()
                    .ok_or_else(|| startup_error("Postgres store selected", "database.url is not set"))?;

                let postgres = Arc::new(
                    PostgresCandidateStore::from_settings(
                        url,
                        settings.database.max_connections,
                        settings.database.min_connections,
                        settings.database.acquire_timeout_secs,
                        settings.database.idle_timeout_secs,
                    )
                    .await
                    .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
                );
                info!("PostgreSQL candidate store initialized");

                let store: Arc<dyn CandidateStore> = postgres.clone();
                let credits: Arc<dyn EnrichmentSource> = postgres;
                (store, Some(credits))
            }
            StoreKind::Memory => {
                let memory = match &settings.store.seed_path {
                    Some(path) => InMemoryCandidateStore::from_json_file(path)
                        .map_err(|e| startup_error("Failed to load seed profiles", e))?,
                    None => {
                        warn!("No store.seed_path configured, starting with an empty candidate pool");
                        InMemoryCandidateStore::default()
                    }
                };
                info!("In-memory candidate store initialized ({} profiles)", memory.len());

                let store: Arc<dyn CandidateStore> = Arc::new(memory);
                (store, None)
            }
        };

    // Generative text service
    let llm = LlmClient::new(
        settings.llm.base_url.clone(),
        settings.llm.api_key.clone(),
        settings.llm.interpret_model.clone(),
        settings.llm.compose_model.clone(),
        Duration::from_secs(settings.llm.request_timeout_secs),
    )
    .map_err(|e| startup_error("Failed to build LLM client", e))?
    .with_retry_policy(settings.llm.max_retries, settings.llm.initial_backoff_ms);

    let llm_configured = llm.is_configured();
    let generator: Arc<dyn TextGenerator> = Arc::new(llm);

    let interpreter: Arc<dyn QueryInterpreter> = if llm_configured {
        info!(
            "LLM client initialized (interpret: {}, compose: {})",
            settings.llm.interpret_model, settings.llm.compose_model
        );
        Arc::new(
            LlmInterpreter::new(
                generator.clone(),
                Duration::from_secs(settings.llm.interpret_timeout_secs),
            )
            .with_history_window(settings.llm.interpret_history_window),
        )
    } else {
        warn!("No LLM API key configured; using keyword interpreter and templated recommendations");
        Arc::new(KeywordInterpreter::new())
    };

    let weights = CompletenessWeights::from(&settings.scoring.weights);
    info!("Retriever initialized with weights: {:?}", weights);

    let retriever = CandidateRetriever::new(
        store.clone(),
        weights,
        settings.search.retriever_settings(),
    )
    .with_seed(settings.search.random_seed);

    let composer = RecommendationComposer::new(
        generator,
        settings.composer.composer_settings(&settings.llm),
    );

    let mut pipeline = SearchPipeline::new(interpreter, retriever, composer);
    if let Some(source) = enrichment {
        pipeline = pipeline.with_enrichment(
            source,
            Duration::from_secs(settings.search.enrichment_timeout_secs),
        );
    }

    let app_state = AppState { pipeline, store };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(routes::json_config())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
