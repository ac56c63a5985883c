//! In-memory content and edge stores

use super::{ContentRepository, EdgeStore, EdgeTransaction};
use crate::errors::{AppError, Result};
use crate::types::{CandidateFilter, ContentItem, EdgeFilter, LinkEdge};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Content repository held in a BTreeMap (iteration is ordered by id)
#[derive(Default)]
pub struct MemoryContentRepository {
    items: RwLock<BTreeMap<Uuid, ContentItem>>,
    fail_next_update: AtomicBool,
}

impl MemoryContentRepository {
    pub fn new(items: impl IntoIterator<Item = ContentItem>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(|i| (i.id, i)).collect()),
            fail_next_update: AtomicBool::new(false),
        }
    }

    /// Make the next `update_body` call fail
    pub fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }

    pub async fn insert(&self, item: ContentItem) {
        self.items.write().await.insert(item.id, item);
    }
}

#[async_trait]
impl ContentRepository for MemoryContentRepository {
    async fn get(&self, id: Uuid) -> Result<ContentItem> {
        self.items
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AppError::ContentNotFound { id })
    }

    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<ContentItem>> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    async fn update_body(&self, id: Uuid, body: &str) -> Result<()> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection {
                message: "injected failure".to_string(),
            });
        }

        let mut items = self.items.write().await;
        let item = items.get_mut(&id).ok_or(AppError::ContentNotFound { id })?;
        item.body = body.to_string();
        item.updated_at = Utc::now();
        Ok(())
    }
}

/// Edge store whose transactions stage writes until commit
#[derive(Default)]
pub struct MemoryEdgeStore {
    edges: Arc<RwLock<Vec<LinkEdge>>>,
    fail_next_create: Arc<AtomicBool>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryEdgeStore {
    pub fn new(edges: Vec<LinkEdge>) -> Self {
        Self {
            edges: Arc::new(RwLock::new(edges)),
            ..Self::default()
        }
    }

    /// Make the next `create_edges` call fail, to exercise rollback paths
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Make the next commit fail without applying anything
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Vec<LinkEdge> {
        self.edges.read().await.clone()
    }
}

#[async_trait]
impl EdgeStore for MemoryEdgeStore {
    async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<LinkEdge>> {
        Ok(self
            .edges
            .read()
            .await
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn EdgeTransaction>> {
        let staged = self.edges.read().await.clone();
        Ok(Box::new(MemoryEdgeTransaction {
            target: Arc::clone(&self.edges),
            staged,
            ops: Vec::new(),
            fail_next_create: Arc::clone(&self.fail_next_create),
            fail_next_commit: Arc::clone(&self.fail_next_commit),
        }))
    }
}

enum StagedOp {
    Create(Vec<LinkEdge>),
    Delete(EdgeFilter),
}

/// Validates against a private copy; operations replay on the live set at commit.
struct MemoryEdgeTransaction {
    target: Arc<RwLock<Vec<LinkEdge>>>,
    staged: Vec<LinkEdge>,
    ops: Vec<StagedOp>,
    fail_next_create: Arc<AtomicBool>,
    fail_next_commit: Arc<AtomicBool>,
}

#[async_trait]
impl EdgeTransaction for MemoryEdgeTransaction {
    async fn create_edges(&mut self, edges: Vec<LinkEdge>) -> Result<u64> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection {
                message: "injected failure".to_string(),
            });
        }

        let mut created = 0;
        for edge in edges.iter().cloned() {
            if edge.source_id == edge.target_id {
                return Err(AppError::SelfLoop { id: edge.source_id });
            }
            let duplicate = edge.automatic
                && self.staged.iter().any(|e| {
                    e.automatic && e.source_id == edge.source_id && e.target_id == edge.target_id
                });
            if duplicate {
                return Err(AppError::Validation {
                    message: format!(
                        "automatic edge {} -> {} already exists",
                        edge.source_id, edge.target_id
                    ),
                    field: Some("target_id".to_string()),
                });
            }
            self.staged.push(edge);
            created += 1;
        }
        self.ops.push(StagedOp::Create(edges));
        Ok(created)
    }

    async fn delete_edges(&mut self, filter: &EdgeFilter) -> Result<u64> {
        let before = self.staged.len();
        self.staged.retain(|e| !filter.matches(e));
        self.ops.push(StagedOp::Delete(filter.clone()));
        Ok((before - self.staged.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection {
                message: "injected commit failure".to_string(),
            });
        }

        let mut live = self.target.write().await;
        for op in self.ops {
            match op {
                StagedOp::Create(edges) => live.extend(edges),
                StagedOp::Delete(filter) => live.retain(|e| !filter.matches(e)),
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
