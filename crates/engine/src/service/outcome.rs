//! Results of link generation runs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Why a regeneration produced no links
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoLinkReason {
    SourceNotPublished,
    EmptyCandidatePool,
    NoEligibleZones,
    EmptyMarkup,
}

impl NoLinkReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoLinkReason::SourceNotPublished => "source_not_published",
            NoLinkReason::EmptyCandidatePool => "empty_candidate_pool",
            NoLinkReason::NoEligibleZones => "no_eligible_zones",
            NoLinkReason::EmptyMarkup => "empty_markup",
        }
    }
}

impl fmt::Display for NoLinkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of regenerating one item's links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub item_id: Uuid,

    /// Edges written
    pub created: u64,

    /// Previous automatic edges removed
    pub deleted: u64,

    /// Links inserted into the body
    pub placed: usize,

    pub reason: Option<NoLinkReason>,
}

impl GenerationOutcome {
    /// Outcome of a run that changed nothing
    pub fn skipped(item_id: Uuid, reason: NoLinkReason) -> Self {
        Self {
            item_id,
            created: 0,
            deleted: 0,
            placed: 0,
            reason: Some(reason),
        }
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        self.reason.map_or("linked", |r| r.as_str())
    }

    pub fn describe(&self) -> String {
        match self.reason {
            Some(reason) => format!("no links generated: {}", reason),
            None => format!(
                "generated {} links ({} placed, {} replaced)",
                self.created, self.placed, self.deleted
            ),
        }
    }
}

/// Totals over a platform-wide regeneration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub created: u64,
    pub deleted: u64,
    pub placed: usize,
    pub failed: usize,

    /// Items that ended without links, by reason
    pub without_links: BTreeMap<NoLinkReason, usize>,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &GenerationOutcome) {
        self.processed += 1;
        self.created += outcome.created;
        self.deleted += outcome.deleted;
        self.placed += outcome.placed;
        if let Some(reason) = outcome.reason {
            *self.without_links.entry(reason).or_insert(0) += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let skipped = GenerationOutcome::skipped(Uuid::nil(), NoLinkReason::EmptyCandidatePool);
        assert_eq!(skipped.describe(), "no links generated: empty_candidate_pool");
        assert_eq!(skipped.label(), "empty_candidate_pool");

        let linked = GenerationOutcome {
            item_id: Uuid::nil(),
            created: 4,
            deleted: 3,
            placed: 2,
            reason: None,
        };
        assert_eq!(linked.describe(), "generated 4 links (2 placed, 3 replaced)");
        assert_eq!(linked.label(), "linked");
    }

    #[test]
    fn test_summary_totals() {
        let mut summary = BatchSummary::default();
        summary.record(&GenerationOutcome {
            item_id: Uuid::nil(),
            created: 3,
            deleted: 1,
            placed: 2,
            reason: None,
        });
        summary.record(&GenerationOutcome::skipped(Uuid::nil(), NoLinkReason::EmptyMarkup));
        summary.record(&GenerationOutcome::skipped(Uuid::nil(), NoLinkReason::EmptyMarkup));
        summary.record_failure();

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.created, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.without_links[&NoLinkReason::EmptyMarkup], 2);
    }
}
