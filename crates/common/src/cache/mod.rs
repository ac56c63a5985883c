//! Artifact cache for derived link-graph data
//!
//! Provides:
//! - The `ArtifactCache` contract (get / put with TTL / invalidate / invalidate prefix)
//! - A Redis implementation for shared deployments
//! - An in-process implementation for single workers and tests
//! - Typed JSON helpers and key builders
//!
//! Only term vectors and rank reports are cached. Callers treat every cache
//! failure as a miss.

mod memory;
mod redis_store;

pub use memory::MemoryCache;
pub use redis_store::{RedisCache, RedisCacheConfig};

use crate::errors::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Keyed store for derived artifacts
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    /// Get a raw value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a raw value with a time-to-live
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove one key. Returns whether it existed.
    async fn invalidate(&self, key: &str) -> Result<bool>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64>;
}

/// Read a JSON value, treating errors and undecodable entries as misses
pub async fn get_json<T: DeserializeOwned>(cache: &dyn ArtifactCache, key: &str) -> Option<T> {
    let raw = match cache.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key = %key, "Cache miss");
            return None;
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Cache read failed, recomputing");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => {
            debug!(key = %key, "Cache hit");
            Some(value)
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Discarding undecodable cache entry");
            None
        }
    }
}

/// Store a JSON value; failures are logged and swallowed
pub async fn put_json<T: Serialize>(cache: &dyn ArtifactCache, key: &str, value: &T, ttl: Duration) {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to serialize value, continuing without cache");
            return;
        }
    };

    if let Err(e) = cache.put(key, json, ttl).await {
        warn!(key = %key, error = %e, "Failed to cache value, continuing without cache");
    }
}

/// Cache key builder helpers
pub mod keys {
    use uuid::Uuid;

    /// Term vector of one content version
    pub fn term_vector(content_id: Uuid, version: &str) -> String {
        format!("terms:{}:{}", content_id, version)
    }

    /// Prefix covering every cached version of one item's term vector
    pub fn term_vector_prefix(content_id: Uuid) -> String {
        format!("terms:{}:", content_id)
    }

    /// Rank report of one platform graph
    pub fn rank_report(platform_id: Uuid) -> String {
        format!("rank:{}", platform_id)
    }
}
