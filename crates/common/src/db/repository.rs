//! SeaORM implementations of the content and edge contracts

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::store::{ContentRepository, EdgeStore, EdgeTransaction};
use crate::types::{primary_language, CandidateFilter, ContentItem, EdgeFilter, LinkEdge};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

/// Content repository over the `content_items` table
#[derive(Clone)]
pub struct PgContentRepository {
    pool: DbPool,
}

impl PgContentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn get(&self, id: Uuid) -> Result<ContentItem> {
        ContentItemEntity::find_by_id(id)
            .one(self.pool.read())
            .await?
            .map(ContentItem::from)
            .ok_or(AppError::ContentNotFound { id })
    }

    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<ContentItem>> {
        let mut query = ContentItemEntity::find();

        if let Some(platform_id) = filter.platform_id {
            query = query.filter(ContentItemColumn::PlatformId.eq(platform_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(ContentItemColumn::Status.eq(status.as_str()));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(ContentItemColumn::Kind.eq(kind.as_str()));
        }
        if let Some(exclude_id) = filter.exclude_id {
            query = query.filter(ContentItemColumn::Id.ne(exclude_id));
        }
        if let Some(ref language) = filter.language {
            query = query.filter(language_condition(language));
        }

        let rows = query
            .order_by_asc(ContentItemColumn::Id)
            .all(self.pool.read())
            .await?;

        let items: Vec<ContentItem> = rows
            .into_iter()
            .map(ContentItem::from)
            .filter(|item| filter.matches(item))
            .collect();

        debug!(count = items.len(), "Listed candidate content");
        Ok(items)
    }

    async fn update_body(&self, id: Uuid, body: &str) -> Result<()> {
        let row = ContentItemActiveModel {
            id: Set(id),
            body: Set(body.to_string()),
            updated_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        match row.update(self.pool.write()).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(AppError::ContentNotFound { id }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Case-insensitive prefix match on the primary subtag.
///
/// Only narrows the rows; exact subtag matching is `CandidateFilter::matches`.
fn language_condition(language: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(ContentItemColumn::Language)))
        .like(format!("{}%", primary_language(language)))
}

/// Edge store over the `link_edges` table
#[derive(Clone)]
pub struct PgEdgeStore {
    pool: DbPool,
}

impl PgEdgeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn edge_condition(filter: &EdgeFilter) -> Condition {
    let mut cond = Condition::all();
    if let Some(platform_id) = filter.platform_id {
        cond = cond.add(LinkEdgeColumn::PlatformId.eq(platform_id));
    }
    if let Some(source_id) = filter.source_id {
        cond = cond.add(LinkEdgeColumn::SourceId.eq(source_id));
    }
    if let Some(target_id) = filter.target_id {
        cond = cond.add(LinkEdgeColumn::TargetId.eq(target_id));
    }
    if let Some(automatic) = filter.automatic {
        cond = cond.add(LinkEdgeColumn::Automatic.eq(automatic));
    }
    cond
}

#[async_trait]
impl EdgeStore for PgEdgeStore {
    async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<LinkEdge>> {
        let rows = LinkEdgeEntity::find()
            .filter(edge_condition(filter))
            .order_by_asc(LinkEdgeColumn::SourceId)
            .order_by_asc(LinkEdgeColumn::TargetId)
            .all(self.pool.read())
            .await?;

        rows.into_iter().map(LinkEdge::try_from).collect()
    }

    async fn begin(&self) -> Result<Box<dyn EdgeTransaction>> {
        let txn = self.pool.write().begin().await?;
        Ok(Box::new(PgEdgeTransaction { txn }))
    }
}

struct PgEdgeTransaction {
    txn: DatabaseTransaction,
}

#[async_trait]
impl EdgeTransaction for PgEdgeTransaction {
    async fn create_edges(&mut self, edges: Vec<LinkEdge>) -> Result<u64> {
        if edges.is_empty() {
            return Ok(0);
        }
        if let Some(edge) = edges.iter().find(|e| e.source_id == e.target_id) {
            return Err(AppError::SelfLoop { id: edge.source_id });
        }

        let count = edges.len() as u64;
        let models: Vec<LinkEdgeActiveModel> = edges.into_iter().map(Into::into).collect();
        LinkEdgeEntity::insert_many(models).exec(&self.txn).await?;
        Ok(count)
    }

    async fn delete_edges(&mut self, filter: &EdgeFilter) -> Result<u64> {
        let result = LinkEdgeEntity::delete_many()
            .filter(edge_condition(filter))
            .exec(&self.txn)
            .await?;
        Ok(result.rows_affected)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
