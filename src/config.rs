use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::composer::ComposerSettings;
use crate::core::retriever::RetrieverSettings;
use crate::models::CompletenessWeights;
use crate::services::llm::DEFAULT_BASE_URL;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub composer: ComposerConfig,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

/// Which candidate store backs retrieval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub kind: StoreKind,
    /// JSON array of profiles for the in-memory store
    pub seed_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub interpret_model: String,
    pub compose_model: String,
    pub request_timeout_secs: u64,
    pub interpret_timeout_secs: u64,
    pub compose_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub interpret_history_window: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            interpret_model: "openai/gpt-4o-mini".to_string(),
            compose_model: "openai/gpt-4o".to_string(),
            request_timeout_secs: 60,
            interpret_timeout_secs: 15,
            compose_timeout_secs: 45,
            max_retries: 3,
            initial_backoff_ms: 1000,
            interpret_history_window: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub max_results: usize,
    pub broad_max_results: usize,
    pub fallback_limit: usize,
    pub retrieval_timeout_secs: u64,
    pub enrichment_timeout_secs: u64,
    /// Fixed tie-break seed; unset draws from OS entropy
    pub random_seed: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 20,
            broad_max_results: 50,
            fallback_limit: 20,
            retrieval_timeout_secs: 5,
            enrichment_timeout_secs: 3,
            random_seed: None,
        }
    }
}

impl SearchSettings {
    pub fn retriever_settings(&self) -> RetrieverSettings {
        RetrieverSettings {
            max_results: self.max_results,
            broad_max_results: self.broad_max_results.max(self.max_results),
            fallback_limit: self.fallback_limit,
            timeout: Duration::from_secs(self.retrieval_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    pub max_recommendations: usize,
    pub fallback_count: usize,
    pub history_window: usize,
    pub dossier_limit: usize,
    pub max_tokens: u32,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_recommendations: 4,
            fallback_count: 3,
            history_window: 6,
            dossier_limit: 15,
            max_tokens: 700,
        }
    }
}

impl ComposerConfig {
    pub fn composer_settings(&self, llm: &LlmSettings) -> ComposerSettings {
        ComposerSettings {
            max_recommendations: self.max_recommendations,
            fallback_count: self.fallback_count,
            history_window: self.history_window,
            dossier_limit: self.dossier_limit.max(self.fallback_count),
            timeout: Duration::from_secs(llm.compose_timeout_secs),
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_bio_weight")]
    pub bio: f64,
    #[serde(default = "default_contact_weight")]
    pub contact: f64,
    #[serde(default = "default_physical_weight")]
    pub physical: f64,
    #[serde(default = "default_location_weight")]
    pub location: f64,
    #[serde(default = "default_skills_weight")]
    pub skills: f64,
    #[serde(default = "default_certifications_weight")]
    pub certifications: f64,
    #[serde(default = "default_photos_weight")]
    pub photos: f64,
    #[serde(default = "default_links_weight")]
    pub links: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            bio: default_bio_weight(),
            contact: default_contact_weight(),
            physical: default_physical_weight(),
            location: default_location_weight(),
            skills: default_skills_weight(),
            certifications: default_certifications_weight(),
            photos: default_photos_weight(),
            links: default_links_weight(),
        }
    }
}

impl From<&WeightsConfig> for CompletenessWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            bio: config.bio,
            contact: config.contact,
            physical: config.physical,
            location: config.location,
            skills: config.skills,
            certifications: config.certifications,
            photos: config.photos,
            links: config.links,
        }
    }
}

fn default_bio_weight() -> f64 { 10.0 }
fn default_contact_weight() -> f64 { 5.0 }
fn default_physical_weight() -> f64 { 10.0 }
fn default_location_weight() -> f64 { 10.0 }
fn default_skills_weight() -> f64 { 20.0 }
fn default_certifications_weight() -> f64 { 10.0 }
fn default_photos_weight() -> f64 { 25.0 }
fn default_links_weight() -> f64 { 10.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with SCOUT__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., SCOUT__SEARCH__MAX_RESULTS -> search.max_results
            .add_source(scout_environment())
            .build()?;

        apply_well_known_env(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(scout_environment())
            .build()?;

        settings.try_deserialize()
    }
}

fn scout_environment() -> Environment {
    Environment::with_prefix("SCOUT")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Honor the conventional DATABASE_URL and OPENROUTER_API_KEY variables
fn apply_well_known_env(settings: Config) -> Result<Config, ConfigError> {
    let mut builder = Config::builder().add_source(settings);

    if let Ok(url) = std::env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", url)?;
    }
    if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
        builder = builder.set_override("llm.api_key", key)?;
    }

    builder.build()
}
