//! Anchor type mix and anchor text

use linkforge_common::types::{AnchorType, ContentItem};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Split `total` links over a percentage distribution.
///
/// Uses largest-remainder rounding, so every count is the floor or ceiling
/// of its exact share and the counts sum to `total`. Remainder ties go to
/// the larger weight, then to the earlier anchor type.
pub fn distribute(distribution: &BTreeMap<AnchorType, u32>, total: usize) -> BTreeMap<AnchorType, usize> {
    let weight_sum: u64 = distribution.values().map(|&w| u64::from(w)).sum();
    if weight_sum == 0 || total == 0 {
        return BTreeMap::new();
    }

    let mut counts: BTreeMap<AnchorType, usize> = BTreeMap::new();
    let mut remainders: Vec<(AnchorType, u64, u32)> = Vec::with_capacity(distribution.len());
    let mut assigned = 0;

    for (&anchor_type, &weight) in distribution {
        let exact = total as u64 * u64::from(weight);
        let floor = (exact / weight_sum) as usize;
        counts.insert(anchor_type, floor);
        remainders.push((anchor_type, exact % weight_sum, weight));
        assigned += floor;
    }

    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(&b.0)));
    for (anchor_type, _, _) in remainders.into_iter().take(total - assigned) {
        *counts.entry(anchor_type).or_insert(0) += 1;
    }

    counts.retain(|_, count| *count > 0);
    counts
}

/// Anchor types for `total` links, shuffled
pub fn assign_anchor_types<R: Rng + ?Sized>(
    distribution: &BTreeMap<AnchorType, u32>,
    total: usize,
    rng: &mut R,
) -> Vec<AnchorType> {
    let mut types: Vec<AnchorType> = distribute(distribution, total)
        .into_iter()
        .flat_map(|(anchor_type, count)| std::iter::repeat(anchor_type).take(count))
        .collect();

    // Empty distribution: fall back to plain titles
    types.resize(total, AnchorType::ExactMatch);
    types.shuffle(rng);
    types
}

/// Produces the visible text of a link
///
/// Multi-language phrasing lives outside the engine; implementations plug in
/// here.
pub trait AnchorTextProvider: Send + Sync {
    fn anchor_text(&self, source: &ContentItem, target: &ContentItem, anchor_type: AnchorType) -> String;
}

/// Title-based anchors
#[derive(Debug, Clone)]
pub struct TitleAnchorProvider {
    href_prefix: String,
}

impl TitleAnchorProvider {
    pub fn new(href_prefix: impl Into<String>) -> Self {
        Self {
            href_prefix: href_prefix.into(),
        }
    }
}

impl Default for TitleAnchorProvider {
    fn default() -> Self {
        Self::new("/content")
    }
}

impl AnchorTextProvider for TitleAnchorProvider {
    fn anchor_text(&self, _source: &ContentItem, target: &ContentItem, anchor_type: AnchorType) -> String {
        match anchor_type {
            AnchorType::NakedUrl => format!("{}/{}", self.href_prefix.trim_end_matches('/'), target.id),
            _ => target.title.trim().to_string(),
        }
    }
}
