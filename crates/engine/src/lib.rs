//! LinkForge Engine
//!
//! Decides how a corpus of content items links to itself:
//! - `relevance`: TF-IDF term vectors and cosine scoring
//! - `rank`: PageRank over the stored link graph
//! - `structure`: markup zones and headings
//! - `placement`: safe insertion offsets inside markup
//! - `selection`: link targets, anchor mix and hub/spoke links
//! - `audit`: orphans, dead ends and inbound skew
//! - `service`: async write paths over pluggable storage and caching
//!
//! Everything except `service` is synchronous and side-effect free.

pub mod audit;
pub mod placement;
pub mod rank;
pub mod relevance;
pub mod selection;
pub mod service;
pub mod structure;

pub use audit::{AuditReport, LinkGraphAuditor};
pub use placement::{PlacementPlanner, PlacementPoint};
pub use rank::{compute_ranks, RankEngine, RankReport, RankResult};
pub use relevance::{RelevanceScorer, TermVector};
pub use selection::{LinkDraft, LinkSelectionOrchestrator};
pub use service::{BatchSummary, GenerationOutcome, LinkEngine, NoLinkReason};
pub use structure::{analyze, StructureAnalysis};
