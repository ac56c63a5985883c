//! Configuration management for LinkForge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values
//!
//! The engine section is read-only once loaded; it is validated before use.

use crate::types::AnchorType;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Link-graph engine parameters
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Redis URL; caching falls back to in-process memory when unset
    pub url: Option<String>,

    /// Default TTL in seconds
    #[serde(default = "default_redis_ttl")]
    pub default_ttl_secs: u64,

    /// Key prefix for namespacing
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. `info`, `linkforge_engine=debug`)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name attached to log lines
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// Additive score boosts applied on top of base relevance
#[derive(Debug, Clone, Deserialize, Serialize, Validate, PartialEq)]
pub struct RelevanceBoosts {
    #[serde(default = "default_boost_same_country")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub same_country: f64,

    #[serde(default = "default_boost_same_topic")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub same_topic: f64,

    #[serde(default = "default_boost_hub")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub hub: f64,
}

/// Parameters consumed, never mutated, by the engine
#[derive(Debug, Clone, Deserialize, Serialize, Validate, PartialEq)]
#[validate(schema(function = "validate_link_bounds"))]
pub struct EngineConfig {
    /// PageRank damping factor
    #[serde(default = "default_damping")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub damping_factor: f64,

    /// PageRank iteration cap
    #[serde(default = "default_max_iterations")]
    #[validate(range(min = 1, max = 10_000))]
    pub max_iterations: usize,

    /// PageRank L1 convergence threshold
    #[serde(default = "default_epsilon")]
    #[validate(range(exclusive_min = 0.0))]
    pub convergence_epsilon: f64,

    /// Relevance floor (0-100) before boosts
    #[serde(default = "default_min_relevance")]
    #[validate(range(min = 0, max = 100))]
    pub min_relevance: u32,

    /// Links guaranteed per item (backfilled below the floor)
    #[serde(default = "default_min_links")]
    pub min_links: usize,

    /// Upper bound of automatic links per item
    #[serde(default = "default_max_links")]
    #[validate(range(min = 1))]
    pub max_links: usize,

    /// Link cap per markup zone
    #[serde(default = "default_max_links_per_zone")]
    #[validate(range(min = 1))]
    pub max_links_per_zone: usize,

    /// Anchor type mix in percent
    #[serde(default = "default_anchor_distribution")]
    #[validate(custom(function = "validate_distribution"))]
    pub anchor_type_distribution: BTreeMap<AnchorType, u32>,

    #[serde(default)]
    #[validate(nested)]
    pub relevance_boosts: RelevanceBoosts,

    /// Gini ratio above which the inbound distribution is flagged
    #[serde(default = "default_imbalance_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub imbalance_threshold: f64,

    /// Top-K terms kept per term vector
    #[serde(default = "default_max_terms")]
    #[validate(range(min = 1))]
    pub max_terms: usize,

    /// Minimum words for a zone to receive a link
    #[serde(default = "default_min_zone_words")]
    pub min_zone_words: usize,

    /// Keep links out of the first ~20% of zones
    #[serde(default = "default_true")]
    pub exclude_intro: bool,

    /// Keep links out of the last ~20% of zones
    #[serde(default = "default_false")]
    pub exclude_conclusion: bool,

    /// Total degree below which an item counts as weakly connected
    #[serde(default = "default_weak_degree_threshold")]
    pub weak_degree_threshold: usize,

    #[serde(default = "default_term_cache_ttl")]
    pub term_cache_ttl_secs: u64,

    #[serde(default = "default_rank_cache_ttl")]
    pub rank_cache_ttl_secs: u64,

    /// Items regenerated concurrently in a platform batch
    #[serde(default = "default_worker_concurrency")]
    #[validate(range(min = 1, max = 256))]
    pub worker_concurrency: usize,

    /// Path prefix for rendered hrefs (`{prefix}/{id}`)
    #[serde(default = "default_link_href_prefix")]
    pub link_href_prefix: String,

    /// Attribute marking anchors inserted by the engine
    #[serde(default = "default_link_marker_attribute")]
    #[validate(length(min = 1))]
    pub link_marker_attribute: String,
}

// Default value functions
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_redis_ttl() -> u64 { 3600 }
fn default_key_prefix() -> String { "linkforge".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "linkforge".to_string() }
fn default_boost_same_country() -> f64 { 10.0 }
fn default_boost_same_topic() -> f64 { 15.0 }
fn default_boost_hub() -> f64 { 20.0 }
fn default_damping() -> f64 { 0.85 }
fn default_max_iterations() -> usize { 100 }
fn default_epsilon() -> f64 { 1e-4 }
fn default_min_relevance() -> u32 { 40 }
fn default_min_links() -> usize { 3 }
fn default_max_links() -> usize { 8 }
fn default_max_links_per_zone() -> usize { 1 }
fn default_imbalance_threshold() -> f64 { 0.3 }
fn default_max_terms() -> usize { 100 }
fn default_min_zone_words() -> usize { 20 }
fn default_true() -> bool { true }
fn default_false() -> bool { false }
fn default_weak_degree_threshold() -> usize { 3 }
fn default_term_cache_ttl() -> u64 { 86_400 }
fn default_rank_cache_ttl() -> u64 { 3600 }
fn default_worker_concurrency() -> usize { 8 }
fn default_link_href_prefix() -> String { "/content".to_string() }
fn default_link_marker_attribute() -> String { "data-autolink".to_string() }

fn default_anchor_distribution() -> BTreeMap<AnchorType, u32> {
    BTreeMap::from([
        (AnchorType::ExactMatch, 30),
        (AnchorType::LongTail, 25),
        (AnchorType::Generic, 20),
        (AnchorType::Cta, 15),
        (AnchorType::Question, 10),
    ])
}

fn validate_distribution(dist: &BTreeMap<AnchorType, u32>) -> Result<(), ValidationError> {
    let total: u32 = dist.values().sum();
    if total == 0 {
        return Err(ValidationError::new("anchor_distribution_empty"));
    }
    if total > 100 {
        return Err(ValidationError::new("anchor_distribution_over_100"));
    }
    Ok(())
}

fn validate_link_bounds(config: &EngineConfig) -> Result<(), ValidationError> {
    if config.min_links > config.max_links {
        return Err(ValidationError::new("min_links_exceeds_max_links"));
    }
    Ok(())
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            default_ttl_secs: default_redis_ttl(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RelevanceBoosts {
    fn default() -> Self {
        Self {
            same_country: default_boost_same_country(),
            same_topic: default_boost_same_topic(),
            hub: default_boost_hub(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            damping_factor: default_damping(),
            max_iterations: default_max_iterations(),
            convergence_epsilon: default_epsilon(),
            min_relevance: default_min_relevance(),
            min_links: default_min_links(),
            max_links: default_max_links(),
            max_links_per_zone: default_max_links_per_zone(),
            anchor_type_distribution: default_anchor_distribution(),
            relevance_boosts: RelevanceBoosts::default(),
            imbalance_threshold: default_imbalance_threshold(),
            max_terms: default_max_terms(),
            min_zone_words: default_min_zone_words(),
            exclude_intro: default_true(),
            exclude_conclusion: default_false(),
            weak_degree_threshold: default_weak_degree_threshold(),
            term_cache_ttl_secs: default_term_cache_ttl(),
            rank_cache_ttl_secs: default_rank_cache_ttl(),
            worker_concurrency: default_worker_concurrency(),
            link_href_prefix: default_link_href_prefix(),
            link_marker_attribute: default_link_marker_attribute(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__ENGINE__DAMPING_FACTOR=0.9
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate_engine()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate_engine()?;
        Ok(config)
    }

    /// Reject engine parameters outside their valid ranges
    pub fn validate_engine(&self) -> Result<(), ConfigError> {
        self.engine
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid engine config: {}", e)))
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl EngineConfig {
    pub fn term_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.term_cache_ttl_secs)
    }

    pub fn rank_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rank_cache_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/linkforge".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            redis: RedisConfig::default(),
            observability: ObservabilityConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}
