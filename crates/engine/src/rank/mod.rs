//! Structural importance of content items
//!
//! Provides:
//! - Link graph construction from stored edges
//! - PageRank scoring with dangling-node redistribution

mod graph;
mod pagerank;

pub use graph::LinkGraph;
pub use pagerank::{PageRankConfig, RankEngine, RankReport, RankResult};

use linkforge_common::types::LinkEdge;
use uuid::Uuid;

/// Rank `node_ids` over `edges` in one call
pub fn compute_ranks(edges: &[LinkEdge], node_ids: &[Uuid], config: PageRankConfig) -> RankReport {
    let graph = LinkGraph::from_edges(node_ids.iter().copied(), edges);
    RankEngine::new(config).rank(&graph)
}
