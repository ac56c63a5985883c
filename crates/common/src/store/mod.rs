//! Collaborator contracts for content and link persistence
//!
//! The engine only depends on these traits. Two implementations ship with
//! the workspace:
//! - Postgres via SeaORM (`crate::db`)
//! - In-memory (`memory`), used by tests and single-process tools

mod memory;

pub use memory::{MemoryContentRepository, MemoryEdgeStore};

use crate::errors::Result;
use crate::types::{CandidateFilter, ContentItem, EdgeFilter, LinkEdge};
use async_trait::async_trait;
use uuid::Uuid;

/// Read access to content plus the single write the engine performs
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Fetch one item
    async fn get(&self, id: Uuid) -> Result<ContentItem>;

    /// List items matching the filter, ordered by id
    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<ContentItem>>;

    /// Replace an item's body
    async fn update_body(&self, id: Uuid, body: &str) -> Result<()>;
}

/// Link edge persistence
#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// List edges matching the filter
    async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<LinkEdge>>;

    /// Open a transaction; nothing is visible to readers until commit
    async fn begin(&self) -> Result<Box<dyn EdgeTransaction>>;
}

/// Unit of work over the edge set
#[async_trait]
pub trait EdgeTransaction: Send {
    /// Insert edges, returning the number created
    async fn create_edges(&mut self, edges: Vec<LinkEdge>) -> Result<u64>;

    /// Delete edges matching the filter, returning the number deleted
    async fn delete_edges(&mut self, filter: &EdgeFilter) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
