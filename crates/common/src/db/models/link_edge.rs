//! Link edge entity
//!
//! A partial unique index on (source_id, target_id) WHERE automatic enforces
//! one automatic edge per ordered pair; a CHECK rejects self-loops.

use crate::errors::AppError;
use crate::types::{AnchorType, LinkContext, LinkEdge};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "link_edges")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub platform_id: Uuid,

    /// Item whose body contains the link
    pub source_id: Uuid,

    /// Item being linked to
    pub target_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub anchor_text: String,

    pub anchor_type: String,

    /// Base relevance, 0-100
    pub relevance_score: i32,

    pub context: String,

    /// System-generated vs manually curated
    pub automatic: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::content_item::Entity",
        from = "Column::SourceId",
        to = "super::content_item::Column::Id",
        on_delete = "Cascade"
    )]
    Source,

    #[sea_orm(
        belongs_to = "super::content_item::Entity",
        from = "Column::TargetId",
        to = "super::content_item::Column::Id",
        on_delete = "Cascade"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for LinkEdge {
    type Error = AppError;

    fn try_from(row: Model) -> Result<Self, Self::Error> {
        let anchor_type = AnchorType::parse(&row.anchor_type).ok_or_else(|| AppError::InvalidFormat {
            message: format!("unknown anchor type '{}' on edge {}", row.anchor_type, row.id),
        })?;
        let context = LinkContext::parse(&row.context).ok_or_else(|| AppError::InvalidFormat {
            message: format!("unknown link context '{}' on edge {}", row.context, row.id),
        })?;

        Ok(LinkEdge {
            id: row.id,
            platform_id: row.platform_id,
            source_id: row.source_id,
            target_id: row.target_id,
            anchor_text: row.anchor_text,
            anchor_type,
            relevance_score: row.relevance_score,
            context,
            automatic: row.automatic,
            created_at: row.created_at.with_timezone(&chrono::Utc),
        })
    }
}

impl From<LinkEdge> for ActiveModel {
    fn from(edge: LinkEdge) -> Self {
        ActiveModel {
            id: Set(edge.id),
            platform_id: Set(edge.platform_id),
            source_id: Set(edge.source_id),
            target_id: Set(edge.target_id),
            anchor_text: Set(edge.anchor_text),
            anchor_type: Set(edge.anchor_type.as_str().to_string()),
            relevance_score: Set(edge.relevance_score),
            context: Set(edge.context.as_str().to_string()),
            automatic: Set(edge.automatic),
            created_at: Set(edge.created_at.into()),
        }
    }
}
