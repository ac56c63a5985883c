//! Worker job selection and execution

use anyhow::{bail, Context};
use linkforge_engine::service::{item_rng, seed_from_time};
use linkforge_engine::LinkEngine;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

/// Work a worker run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Regenerate links for one item, or the whole platform
    Regenerate,
    /// Recompute PageRank
    Rank,
    /// Graph health report
    Audit,
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "regenerate" => Ok(JobKind::Regenerate),
            "rank" => Ok(JobKind::Rank),
            "audit" => Ok(JobKind::Audit),
            other => bail!("unknown job '{}' (expected regenerate, rank or audit)", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub kind: JobKind,
    pub platform_id: Uuid,

    /// Single item to regenerate; whole platform when unset
    pub item_id: Option<Uuid>,

    /// Fixed seed for reproducible anchor shuffling
    pub seed: Option<u64>,
}

impl JobRequest {
    /// Read `LINKFORGE_JOB`, `LINKFORGE_PLATFORM_ID`, `LINKFORGE_ITEM_ID` and `LINKFORGE_SEED`
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self::parse(
            var("LINKFORGE_JOB").as_deref().unwrap_or("regenerate"),
            var("LINKFORGE_PLATFORM_ID")
                .as_deref()
                .context("LINKFORGE_PLATFORM_ID is required")?,
            var("LINKFORGE_ITEM_ID").as_deref(),
            var("LINKFORGE_SEED").as_deref(),
        )
    }

    pub fn parse(kind: &str, platform_id: &str, item_id: Option<&str>, seed: Option<&str>) -> anyhow::Result<Self> {
        let kind = kind.parse()?;
        let platform_id = Uuid::parse_str(platform_id.trim()).context("invalid platform id")?;
        let item_id = item_id
            .map(|id| Uuid::parse_str(id.trim()).context("invalid item id"))
            .transpose()?;
        let seed = seed
            .map(|s| s.trim().parse::<u64>().context("invalid seed"))
            .transpose()?;

        if item_id.is_some() && kind != JobKind::Regenerate {
            bail!("an item id only applies to regenerate jobs");
        }

        Ok(Self {
            kind,
            platform_id,
            item_id,
            seed,
        })
    }
}

/// Run one job and return its report as JSON
pub async fn run(engine: &LinkEngine, request: &JobRequest) -> anyhow::Result<Value> {
    let seed = request.seed.unwrap_or_else(seed_from_time);
    info!(job = ?request.kind, platform_id = %request.platform_id, seed, "Running job");

    let report = match (request.kind, request.item_id) {
        (JobKind::Regenerate, Some(item_id)) => {
            let outcome = engine
                .regenerate_links(item_id, &mut item_rng(seed, item_id))
                .await?;
            json!({ "outcome": outcome, "summary": outcome.describe() })
        }
        (JobKind::Regenerate, None) => {
            serde_json::to_value(engine.regenerate_platform(request.platform_id, seed).await?)?
        }
        (JobKind::Rank, _) => {
            engine.invalidate_ranks(request.platform_id).await;
            let report = engine.compute_ranks(request.platform_id).await?;
            let top: Vec<Value> = report
                .ranked()
                .into_iter()
                .take(20)
                .map(|r| json!({ "content_id": r.content_id, "rank": r.rank, "score": r.normalized_score }))
                .collect();
            json!({
                "nodes": report.node_count,
                "edges": report.edge_count,
                "dropped_edges": report.dropped_edges,
                "iterations": report.iterations,
                "converged": report.converged,
                "top": top,
            })
        }
        (JobKind::Audit, _) => serde_json::to_value(engine.audit(request.platform_id).await?)?,
    };

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use linkforge_common::cache::MemoryCache;
    use linkforge_common::config::EngineConfig;
    use linkforge_common::store::{MemoryContentRepository, MemoryEdgeStore};
    use linkforge_common::types::{ContentItem, ContentKind, ContentStatus};
    use std::sync::Arc;

    const PLATFORM: &str = "00000000-0000-0000-0000-0000000000aa";

    #[test]
    fn test_parse_request() {
        let request = JobRequest::parse("Rank", PLATFORM, None, Some("7")).unwrap();
        assert_eq!(request.kind, JobKind::Rank);
        assert_eq!(request.seed, Some(7));
        assert_eq!(request.platform_id, Uuid::from_u128(0xaa));

        let item = Uuid::from_u128(5).to_string();
        let request = JobRequest::parse("regenerate", PLATFORM, Some(&item), None).unwrap();
        assert_eq!(request.item_id, Some(Uuid::from_u128(5)));

        assert!(JobRequest::parse("reindex", PLATFORM, None, None).is_err());
        assert!(JobRequest::parse("audit", "not-a-uuid", None, None).is_err());
        assert!(JobRequest::parse("audit", PLATFORM, Some(&item), None).is_err());
        assert!(JobRequest::parse("rank", PLATFORM, None, Some("-1")).is_err());
    }

    fn item(id: u128) -> ContentItem {
        ContentItem {
            id: Uuid::from_u128(id),
            platform_id: Uuid::from_u128(0xaa),
            title: format!("Porto food guide {id}"),
            body: "<p>Francesinha sandwiches and port wine cellars.</p>".repeat(4),
            language: "en".into(),
            country: None,
            topic: None,
            kind: ContentKind::Leaf,
            status: ContentStatus::Published,
            updated_at: Utc::now(),
        }
    }

    fn engine() -> LinkEngine {
        LinkEngine::new(
            Arc::new(MemoryContentRepository::new((1..=3).map(item))),
            Arc::new(MemoryEdgeStore::default()),
            Arc::new(MemoryCache::new()),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_run_reports() {
        let engine = engine();

        let audit = JobRequest::parse("audit", PLATFORM, None, None).unwrap();
        let report = run(&engine, &audit).await.unwrap();
        assert_eq!(report["item_count"], 3);

        let rank = JobRequest::parse("rank", PLATFORM, None, None).unwrap();
        let report = run(&engine, &rank).await.unwrap();
        assert_eq!(report["nodes"], 3);
        assert_eq!(report["top"].as_array().map(Vec::len), Some(3));

        let regenerate = JobRequest::parse("regenerate", PLATFORM, None, Some("1")).unwrap();
        let report = run(&engine, &regenerate).await.unwrap();
        assert_eq!(report["processed"], 3);
        assert_eq!(report["failed"], 0);
    }
}
