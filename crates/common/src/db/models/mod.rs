//! SeaORM entity models
//!
//! Database entities backing the content and edge contracts

mod content_item;
mod link_edge;

pub use content_item::{
    Entity as ContentItemEntity,
    Model as ContentItemRow,
    ActiveModel as ContentItemActiveModel,
    Column as ContentItemColumn,
};

pub use link_edge::{
    Entity as LinkEdgeEntity,
    Model as LinkEdgeRow,
    ActiveModel as LinkEdgeActiveModel,
    Column as LinkEdgeColumn,
};
