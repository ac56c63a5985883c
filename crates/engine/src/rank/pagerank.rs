//! PageRank over the link graph
//!
//! Power iteration with damping. Dangling nodes (no outbound links) spread
//! their score evenly over every node, themselves included, so the raw
//! scores always sum to one.

use super::LinkGraph;
use linkforge_common::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

/// PageRank configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PageRankConfig {
    /// Damping factor (typically 0.85)
    pub damping: f64,

    /// Maximum iterations
    pub max_iterations: usize,

    /// L1 convergence threshold
    pub epsilon: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            epsilon: 1e-4,
        }
    }
}

impl From<&EngineConfig> for PageRankConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            damping: config.damping_factor,
            max_iterations: config.max_iterations,
            epsilon: config.convergence_epsilon,
        }
    }
}

/// Importance of one item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankResult {
    pub content_id: Uuid,

    /// Stationary probability; sums to 1 over the graph
    pub raw_score: f64,

    /// raw x N x 100, so 100 is the average item
    pub normalized_score: f64,

    /// 1-based, by raw score descending, ties by id
    pub rank: usize,

    pub inbound: usize,
    pub outbound: usize,
}

/// Outcome of one full ranking run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RankReport {
    pub results: BTreeMap<Uuid, RankResult>,
    pub iterations: usize,
    pub converged: bool,
    pub node_count: usize,
    pub edge_count: usize,

    /// Edges naming an item outside the ranked set
    pub dropped_edges: usize,
}

impl RankReport {
    pub fn get(&self, content_id: Uuid) -> Option<&RankResult> {
        self.results.get(&content_id)
    }

    /// Results ordered by rank
    pub fn ranked(&self) -> Vec<&RankResult> {
        let mut ranked: Vec<&RankResult> = self.results.values().collect();
        ranked.sort_by_key(|r| r.rank);
        ranked
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// PageRank scorer for link graphs
#[derive(Debug, Clone, Default)]
pub struct RankEngine {
    config: PageRankConfig,
}

impl RankEngine {
    /// Create a new scorer
    pub fn new(config: PageRankConfig) -> Self {
        Self { config }
    }

    /// Raw scores in node index order, with iterations used and convergence
    pub fn compute_scores(&self, graph: &LinkGraph) -> (Vec<f64>, usize, bool) {
        let n = graph.node_count();
        if n == 0 {
            return (Vec::new(), 0, true);
        }

        let n_f64 = n as f64;
        let damping = self.config.damping;
        let teleport = (1.0 - damping) / n_f64;

        let mut scores = vec![1.0 / n_f64; n];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let dangling: f64 = (0..n)
                .filter(|&node| graph.out_degree(node) == 0)
                .map(|node| scores[node])
                .sum();
            let base = teleport + damping * dangling / n_f64;

            let mut next = vec![base; n];
            for (node, &score) in scores.iter().enumerate() {
                let targets = graph.targets(node);
                if targets.is_empty() {
                    continue;
                }
                let share = damping * score / targets.len() as f64;
                for &target in targets {
                    next[target] += share;
                }
            }

            let diff: f64 = next.iter().zip(&scores).map(|(a, b)| (a - b).abs()).sum();
            scores = next;

            // Check convergence
            if diff < self.config.epsilon {
                converged = true;
                break;
            }
        }

        (scores, iterations, converged)
    }

    /// Score and rank every node
    pub fn rank(&self, graph: &LinkGraph) -> RankReport {
        let (scores, iterations, converged) = self.compute_scores(graph);
        let n = graph.node_count();
        let ids = graph.nodes();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(Ordering::Equal)
                .then_with(|| ids[a].cmp(&ids[b]))
        });

        let results = order
            .into_iter()
            .enumerate()
            .map(|(position, node)| {
                let result = RankResult {
                    content_id: ids[node],
                    raw_score: scores[node],
                    normalized_score: scores[node] * n as f64 * 100.0,
                    rank: position + 1,
                    inbound: graph.in_degree(node),
                    outbound: graph.out_degree(node),
                };
                (ids[node], result)
            })
            .collect();

        RankReport {
            results,
            iterations,
            converged,
            node_count: n,
            edge_count: graph.edge_count(),
            dropped_edges: graph.dropped_edges(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkforge_common::types::{AnchorType, LinkContext, LinkEdge};

    fn edge(source: u128, target: u128) -> LinkEdge {
        LinkEdge::automatic(
            Uuid::nil(),
            Uuid::from_u128(source),
            Uuid::from_u128(target),
            "anchor",
            AnchorType::Generic,
            50,
            LinkContext::Related,
        )
        .unwrap()
    }

    fn graph(nodes: u128, edges: &[(u128, u128)]) -> LinkGraph {
        let edges: Vec<LinkEdge> = edges.iter().map(|&(s, t)| edge(s, t)).collect();
        LinkGraph::from_edges((1..=nodes).map(Uuid::from_u128), &edges)
    }

    fn total(report: &RankReport) -> f64 {
        report.results.values().map(|r| r.raw_score).sum()
    }

    #[test]
    fn test_scores_sum_to_one() {
        let engine = RankEngine::default();
        let cases = [
            graph(4, &[(1, 2), (2, 3), (4, 2)]),
            graph(5, &[(1, 2), (2, 1), (3, 1), (3, 2), (4, 5), (5, 4)]),
            graph(3, &[]),
            graph(6, &[(1, 2), (2, 3), (3, 1), (4, 1), (5, 1), (6, 1)]),
        ];
        for g in &cases {
            let report = engine.rank(g);
            assert!((total(&report) - 1.0).abs() < 1e-6, "sum {}", total(&report));
        }
    }

    #[test]
    fn test_dangling_node_fairness() {
        // A -> B, B -> C, C has no outbound links
        let engine = RankEngine::new(PageRankConfig {
            epsilon: 1e-10,
            max_iterations: 1000,
            ..PageRankConfig::default()
        });
        let report = engine.rank(&graph(3, &[(1, 2), (2, 3)]));
        let a = report.get(Uuid::from_u128(1)).unwrap();
        let b = report.get(Uuid::from_u128(2)).unwrap();
        let c = report.get(Uuid::from_u128(3)).unwrap();

        assert!(report.converged);
        assert!(c.raw_score > b.raw_score);
        assert!(b.raw_score > a.raw_score);
        assert!(a.raw_score > 0.0);
        assert!((total(&report) - 1.0).abs() < 1e-9);
        assert_eq!(c.rank, 1);
        assert_eq!(a.rank, 3);
    }

    #[test]
    fn test_dangling_share_reaches_every_node() {
        // A -> B, B -> C; one step from the uniform start
        let engine = RankEngine::new(PageRankConfig {
            max_iterations: 1,
            ..PageRankConfig::default()
        });
        let report = engine.rank(&graph(3, &[(1, 2), (2, 3)]));
        let score = |id: u128| report.get(Uuid::from_u128(id)).unwrap().raw_score;

        // Teleport plus C's d * (1/3) / 3, which lands on A, B and C alike
        let base = 0.15 / 3.0 + 0.85 * (1.0 / 3.0) / 3.0;
        assert!((score(1) - base).abs() < 1e-12);
        assert!((score(2) - (base + 0.85 / 3.0)).abs() < 1e-12);
        assert!((score(3) - (base + 0.85 / 3.0)).abs() < 1e-12);
        assert!((total(&report) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_most_linked_ranks_first() {
        let report = RankEngine::default().rank(&graph(4, &[(1, 2), (3, 2), (4, 2), (2, 1)]));
        let top = report.ranked()[0];
        assert_eq!(top.content_id, Uuid::from_u128(2));
        assert_eq!(top.inbound, 3);
        assert_eq!(top.outbound, 1);
        assert!(top.normalized_score > 100.0);
    }

    #[test]
    fn test_uniform_graph_normalizes_to_100() {
        let report = RankEngine::default().rank(&graph(3, &[(1, 2), (2, 3), (3, 1)]));
        for result in report.results.values() {
            assert!((result.normalized_score - 100.0).abs() < 1e-6);
        }
        // Equal scores rank by id
        let ranked: Vec<Uuid> = report.ranked().iter().map(|r| r.content_id).collect();
        assert_eq!(ranked, (1..=3).map(Uuid::from_u128).collect::<Vec<_>>());
    }

    #[test]
    fn test_iteration_cap() {
        let engine = RankEngine::new(PageRankConfig {
            max_iterations: 1,
            epsilon: 1e-12,
            ..PageRankConfig::default()
        });
        let report = engine.rank(&graph(3, &[(1, 2), (2, 3)]));
        assert_eq!(report.iterations, 1);
        assert!(!report.converged);
    }

    #[test]
    fn test_pagerank_empty_graph() {
        let report = RankEngine::default().rank(&LinkGraph::default());
        assert!(report.is_empty());
        assert_eq!(report.node_count, 0);
    }
}
