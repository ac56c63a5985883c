//! Link graph health checks
//!
//! Read-only analytics over one snapshot of a platform's edges. Reports
//! orphans, dead ends, weakly connected items and inbound-link skew, and
//! derives repair recommendations from them.

use crate::rank::LinkGraph;
use linkforge_common::config::EngineConfig;
use linkforge_common::types::{ContentItem, LinkEdge};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Items named in a rebalance recommendation
const TOP_HOLDERS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Orphan,
    DeadEnd,
    WeaklyConnected,
}

/// One problem with one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub content_id: Uuid,
    pub kind: FindingKind,
    pub severity: Severity,
    pub inbound: usize,
    pub outbound: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationAction {
    GenerateInboundLinks,
    GenerateOutboundLinks,
    StrengthenConnectivity,
    RebalanceDistribution,
}

/// Advisory repair step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecommendationAction,
    pub priority: Severity,
    pub content_ids: Vec<Uuid>,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub item_count: usize,

    /// Distinct ordered pairs between known items
    pub edge_count: usize,

    /// Edges naming an item outside the audited set
    pub skipped_edges: usize,

    pub orphans: Vec<Finding>,
    pub dead_ends: Vec<Finding>,
    pub weakly_connected: Vec<Finding>,

    /// Gini coefficient of inbound degrees, 0 = even
    pub imbalance_ratio: f64,
    pub imbalanced: bool,

    pub average_inbound: f64,
    pub recommendations: Vec<Recommendation>,
}

impl AuditReport {
    pub fn is_healthy(&self) -> bool {
        self.orphans.is_empty() && self.dead_ends.is_empty() && !self.imbalanced
    }
}

/// Gini coefficient of a degree distribution
///
/// Degrees are sorted descending, then
/// `1 - 2 * sum((i + 1) * d_i) / (n * sum(d)) + 1 / n`.
/// An empty or all-zero distribution is perfectly even.
pub fn gini(degrees: &[usize]) -> f64 {
    let total: usize = degrees.iter().sum();
    if degrees.is_empty() || total == 0 {
        return 0.0;
    }

    let mut sorted = degrees.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let n = sorted.len() as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &d)| (i + 1) as f64 * d as f64)
        .sum();

    let ratio = 1.0 - 2.0 * weighted / (n * total as f64) + 1.0 / n;
    ratio.clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct LinkGraphAuditor {
    weak_threshold: usize,
    imbalance_threshold: f64,
}

impl Default for LinkGraphAuditor {
    fn default() -> Self {
        Self::new(3, 0.3)
    }
}

impl From<&EngineConfig> for LinkGraphAuditor {
    fn from(config: &EngineConfig) -> Self {
        Self::new(config.weak_degree_threshold, config.imbalance_threshold)
    }
}

impl LinkGraphAuditor {
    pub fn new(weak_threshold: usize, imbalance_threshold: f64) -> Self {
        Self {
            weak_threshold,
            imbalance_threshold,
        }
    }

    pub fn audit(&self, items: &[ContentItem], edges: &[LinkEdge]) -> AuditReport {
        let graph = LinkGraph::from_edges(items.iter().map(|item| item.id), edges);
        let hubs: HashSet<Uuid> = items.iter().filter(|i| i.is_hub()).map(|i| i.id).collect();

        let mut report = AuditReport {
            item_count: graph.node_count(),
            edge_count: graph.edge_count(),
            skipped_edges: graph.dropped_edges(),
            ..AuditReport::default()
        };

        let mut inbound_degrees = Vec::with_capacity(graph.node_count());

        for (node, &content_id) in graph.nodes().iter().enumerate() {
            let inbound = graph.in_degree(node);
            let outbound = graph.out_degree(node);
            inbound_degrees.push(inbound);

            let finding = |kind, severity| Finding {
                content_id,
                kind,
                severity,
                inbound,
                outbound,
            };

            if inbound == 0 {
                let severity = if hubs.contains(&content_id) {
                    Severity::Critical
                } else {
                    Severity::High
                };
                report.orphans.push(finding(FindingKind::Orphan, severity));
            }
            if outbound == 0 {
                report.dead_ends.push(finding(FindingKind::DeadEnd, Severity::Medium));
            }
            if inbound + outbound < self.weak_threshold {
                report
                    .weakly_connected
                    .push(finding(FindingKind::WeaklyConnected, Severity::Low));
            }
        }

        if !inbound_degrees.is_empty() {
            report.average_inbound =
                inbound_degrees.iter().sum::<usize>() as f64 / inbound_degrees.len() as f64;
        }
        report.imbalance_ratio = gini(&inbound_degrees);
        report.imbalanced = report.imbalance_ratio > self.imbalance_threshold;

        report.recommendations = self.recommend(&report, &graph);
        report
    }

    fn recommend(&self, report: &AuditReport, graph: &LinkGraph) -> Vec<Recommendation> {
        let mut recommendations: Vec<Recommendation> = Vec::new();

        let per_item = [
            (
                &report.orphans,
                RecommendationAction::GenerateInboundLinks,
                "no inbound links",
            ),
            (
                &report.dead_ends,
                RecommendationAction::GenerateOutboundLinks,
                "no outbound links",
            ),
            (
                &report.weakly_connected,
                RecommendationAction::StrengthenConnectivity,
                "fewer links than the connectivity threshold",
            ),
        ];

        for (findings, action, detail) in per_item {
            recommendations.extend(findings.iter().map(|f| Recommendation {
                action,
                priority: f.severity,
                content_ids: vec![f.content_id],
                detail: format!("{detail} (in {}, out {})", f.inbound, f.outbound),
            }));
        }

        if report.imbalanced {
            let mut holders: Vec<(usize, Uuid)> = graph
                .nodes()
                .iter()
                .enumerate()
                .map(|(node, &id)| (graph.in_degree(node), id))
                .filter(|(inbound, _)| *inbound > 0)
                .collect();
            holders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            holders.truncate(TOP_HOLDERS);

            recommendations.push(Recommendation {
                action: RecommendationAction::RebalanceDistribution,
                priority: Severity::Medium,
                content_ids: holders.into_iter().map(|(_, id)| id).collect(),
                detail: format!(
                    "inbound links concentrated (ratio {:.2} above {:.2})",
                    report.imbalance_ratio, self.imbalance_threshold
                ),
            });
        }

        recommendations.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.content_ids.first().cmp(&b.content_ids.first()))
        });
        recommendations
    }
}
