//! Content item entity

use crate::types::{ContentItem, ContentKind, ContentStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub platform_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Rendered markup
    #[sea_orm(column_type = "Text")]
    pub body: String,

    pub language: String,

    pub country: Option<String>,

    pub topic: Option<String>,

    /// `hub` or `leaf`
    pub kind: String,

    /// `published`, `draft`, `scheduled`, `archived`
    pub status: String,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ContentItem {
    fn from(row: Model) -> Self {
        ContentItem {
            id: row.id,
            platform_id: row.platform_id,
            title: row.title,
            body: row.body,
            language: row.language,
            country: row.country,
            topic: row.topic,
            kind: ContentKind::parse(&row.kind),
            status: ContentStatus::parse(&row.status),
            updated_at: row.updated_at.with_timezone(&chrono::Utc),
        }
    }
}
