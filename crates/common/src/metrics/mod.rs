//! Metrics for link-graph jobs
//!
//! Prometheus-style metrics with standardized naming conventions. Recording
//! is a no-op until an exporter is installed, so library callers and tests
//! need no setup.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all LinkForge metrics
pub const METRICS_PREFIX: &str = "linkforge";

/// Buckets for per-item generation and graph jobs (in seconds)
pub const JOB_BUCKETS: &[f64] = &[
    0.001,
    0.005,
    0.010,
    0.025,
    0.050,
    0.100,
    0.250,
    0.500,
    1.000,
    2.500,
    5.000,
    10.00,
    30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_links_created_total", METRICS_PREFIX),
        Unit::Count,
        "Automatic links created"
    );

    describe_counter!(
        format!("{}_links_placed_total", METRICS_PREFIX),
        Unit::Count,
        "Links inserted into content markup"
    );

    describe_counter!(
        format!("{}_generation_outcomes_total", METRICS_PREFIX),
        Unit::Count,
        "Per-item generation outcomes by result"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Per-item link generation latency"
    );

    describe_histogram!(
        format!("{}_rank_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "PageRank computation latency"
    );

    describe_gauge!(
        format!("{}_rank_iterations", METRICS_PREFIX),
        Unit::Count,
        "Iterations used by the last PageRank run"
    );

    describe_gauge!(
        format!("{}_audit_findings", METRICS_PREFIX),
        Unit::Count,
        "Findings of the last audit by kind"
    );

    describe_gauge!(
        format!("{}_audit_imbalance_ratio", METRICS_PREFIX),
        "Gini ratio of inbound links from the last audit"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total artifact cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total artifact cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Record the outcome of one item's link generation
pub fn record_generation(duration_secs: f64, outcome: &str, created: u64, placed: u64) {
    counter!(
        format!("{}_generation_outcomes_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    counter!(format!("{}_links_created_total", METRICS_PREFIX)).increment(created);
    counter!(format!("{}_links_placed_total", METRICS_PREFIX)).increment(placed);

    histogram!(format!("{}_generation_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Record a PageRank run
pub fn record_rank(duration_secs: f64, iterations: usize, node_count: usize) {
    histogram!(
        format!("{}_rank_duration_seconds", METRICS_PREFIX),
        "size" => size_bucket(node_count)
    )
    .record(duration_secs);

    gauge!(format!("{}_rank_iterations", METRICS_PREFIX)).set(iterations as f64);
}

/// Record audit findings
pub fn record_audit(orphans: usize, dead_ends: usize, weak: usize, imbalance_ratio: f64) {
    for (kind, count) in [("orphan", orphans), ("dead_end", dead_ends), ("weak", weak)] {
        gauge!(
            format!("{}_audit_findings", METRICS_PREFIX),
            "kind" => kind
        )
        .set(count as f64);
    }

    gauge!(format!("{}_audit_imbalance_ratio", METRICS_PREFIX)).set(imbalance_ratio);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    let name = if hit { "cache_hits_total" } else { "cache_misses_total" };
    counter!(
        format!("{}_{}", METRICS_PREFIX, name),
        "cache" => cache_name.to_string()
    )
    .increment(1);
}

/// Coarse label keeping histogram cardinality bounded
fn size_bucket(node_count: usize) -> &'static str {
    match node_count {
        0..=999 => "small",
        1_000..=99_999 => "medium",
        _ => "large",
    }
}
