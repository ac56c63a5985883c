//! LinkForge Common Library
//!
//! Shared code for the link-graph engine and its batch worker:
//! - Domain types (content items, link edges)
//! - Collaborator contracts for content, edges and artifact caching
//! - Postgres and in-memory implementations of those contracts
//! - Error types and handling
//! - Configuration management
//! - Metrics

pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use cache::ArtifactCache;
pub use config::{AppConfig, EngineConfig};
pub use errors::{AppError, Result};
pub use store::{ContentRepository, EdgeStore, EdgeTransaction};
pub use types::{
    AnchorType, CandidateFilter, ContentItem, ContentKind, ContentStatus, EdgeFilter,
    LinkContext, LinkEdge,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
