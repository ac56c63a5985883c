//! LinkForge Worker
//!
//! Runs one link-graph job against a platform and exits:
//! 1. Loads configuration and connects to Postgres (with retry)
//! 2. Uses Redis for artifact caching when configured, memory otherwise
//! 3. Regenerates links, recomputes ranks or audits the graph
//! 4. Prints the job report as JSON

mod job;

use crate::job::JobRequest;
use anyhow::Context;
use backoff::{future::retry, ExponentialBackoff};
use linkforge_common::{
    cache::{ArtifactCache, MemoryCache, RedisCache, RedisCacheConfig},
    config::{AppConfig, DatabaseConfig, ObservabilityConfig, RedisConfig},
    db::{DbPool, PgContentRepository, PgEdgeStore},
    metrics::register_metrics,
    VERSION,
};
use linkforge_engine::LinkEngine;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting LinkForge Worker v{}",
        VERSION
    );

    if config.observability.metrics_port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(port = config.observability.metrics_port, "Metrics exporter listening");
    }
    register_metrics();

    let request = JobRequest::from_env()?;

    let db = connect_database(&config.database).await?;
    let cache = connect_cache(&config.redis).await;

    let engine = LinkEngine::new(
        Arc::new(PgContentRepository::new(db.clone())),
        Arc::new(PgEdgeStore::new(db)),
        cache,
        config.engine.clone(),
    );

    tokio::select! {
        result = job::run(&engine, &request) => {
            match result {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    info!(job = ?request.kind, "Job complete");
                }
                Err(e) => {
                    error!(job = ?request.kind, error = %e, "Job failed");
                    return Err(e);
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            // Item writes are transactional; an interrupted run leaves whole items behind
            warn!("Shutdown signal received, stopping before the job finished");
        }
    }

    info!("LinkForge Worker shutting down");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Connect to Postgres, retrying connection failures with exponential backoff
async fn connect_database(config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    let policy = ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(60)),
        ..ExponentialBackoff::default()
    };

    let pool = retry(policy, || async {
        DbPool::new(config).await.map_err(|e| {
            if e.is_transient() {
                warn!(error = %e, "Database not reachable, retrying");
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .await
    .context("failed to connect to database")?;

    Ok(pool)
}

/// Redis when configured and reachable, in-process memory otherwise
async fn connect_cache(config: &RedisConfig) -> Arc<dyn ArtifactCache> {
    let Some(url) = config.url.clone() else {
        info!("No Redis URL configured, using in-process cache");
        return Arc::new(MemoryCache::new());
    };

    let redis_config = RedisCacheConfig {
        url,
        key_prefix: config.key_prefix.clone(),
    };

    match RedisCache::new(redis_config).await {
        Ok(cache) => {
            info!("Redis cache connected");
            Arc::new(cache)
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, using in-process cache");
            Arc::new(MemoryCache::new())
        }
    }
}
