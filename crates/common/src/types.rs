//! Domain types shared by the engine and its storage adapters

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Structural role of a content item in the link graph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Pillar page expected to link to and from many spokes
    Hub,
    /// Regular article
    Leaf,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Hub => "hub",
            ContentKind::Leaf => "leaf",
        }
    }

    /// Parse a stored value; anything unrecognised is a leaf
    pub fn parse(value: &str) -> Self {
        match value {
            "hub" => ContentKind::Hub,
            _ => ContentKind::Leaf,
        }
    }
}

/// Publication status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Published,
    Draft,
    Scheduled,
    Archived,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Published => "published",
            ContentStatus::Draft => "draft",
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Archived => "archived",
        }
    }

    /// Parse a stored value; unknown statuses are never treated as published
    pub fn parse(value: &str) -> Self {
        match value {
            "published" => ContentStatus::Published,
            "scheduled" => ContentStatus::Scheduled,
            "archived" => ContentStatus::Archived,
            _ => ContentStatus::Draft,
        }
    }
}

/// A published (or publishable) piece of content
///
/// Owned by the surrounding content system. The engine reads every field
/// and only ever writes `body`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: Uuid,

    /// Corpus the item belongs to; one link graph per platform
    pub platform_id: Uuid,

    pub title: String,

    /// Rendered markup
    pub body: String,

    /// Language code such as `en` or `pt-BR`
    pub language: String,

    pub country: Option<String>,

    pub topic: Option<String>,

    pub kind: ContentKind,

    pub status: ContentStatus,

    /// Last-modified marker
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }

    pub fn is_hub(&self) -> bool {
        self.kind == ContentKind::Hub
    }

    /// Primary language subtag, lower-cased (`pt-BR` -> `pt`)
    pub fn primary_language(&self) -> String {
        primary_language(&self.language)
    }

    /// Content version used to key derived artifacts.
    ///
    /// Changes whenever the title, body or modification time changes.
    pub fn version_marker(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.updated_at.timestamp_millis().to_be_bytes());
        hasher.update(self.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.body.as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }

    /// Case-insensitive comparison of optional country codes
    pub fn same_country(&self, other: &ContentItem) -> bool {
        match (&self.country, &other.country) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    /// Case-insensitive comparison of optional topics
    pub fn same_topic(&self, other: &ContentItem) -> bool {
        match (&self.topic, &other.topic) {
            (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
            _ => false,
        }
    }
}

/// Primary language subtag, lower-cased
pub fn primary_language(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Anchor phrasing style of a link
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AnchorType {
    ExactMatch,
    PartialMatch,
    Branded,
    Generic,
    LongTail,
    Cta,
    Question,
    NakedUrl,
    Image,
}

impl AnchorType {
    pub const ALL: [AnchorType; 9] = [
        AnchorType::ExactMatch,
        AnchorType::PartialMatch,
        AnchorType::Branded,
        AnchorType::Generic,
        AnchorType::LongTail,
        AnchorType::Cta,
        AnchorType::Question,
        AnchorType::NakedUrl,
        AnchorType::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorType::ExactMatch => "exact_match",
            AnchorType::PartialMatch => "partial_match",
            AnchorType::Branded => "branded",
            AnchorType::Generic => "generic",
            AnchorType::LongTail => "long_tail",
            AnchorType::Cta => "cta",
            AnchorType::Question => "question",
            AnchorType::NakedUrl => "naked_url",
            AnchorType::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for AnchorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a link exists between two items
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LinkContext {
    HubToLeaf,
    LeafToHub,
    SameTopic,
    Related,
}

impl LinkContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkContext::HubToLeaf => "hub_to_leaf",
            LinkContext::LeafToHub => "leaf_to_hub",
            LinkContext::SameTopic => "same_topic",
            LinkContext::Related => "related",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hub_to_leaf" => Some(LinkContext::HubToLeaf),
            "leaf_to_hub" => Some(LinkContext::LeafToHub),
            "same_topic" => Some(LinkContext::SameTopic),
            "related" => Some(LinkContext::Related),
            _ => None,
        }
    }
}

/// Directed link between two content items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkEdge {
    pub id: Uuid,
    pub platform_id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub anchor_text: String,
    pub anchor_type: AnchorType,

    /// Base topical relevance, 0-100
    pub relevance_score: i32,

    pub context: LinkContext,

    /// System-generated (true) or manually curated (false)
    pub automatic: bool,

    pub created_at: DateTime<Utc>,
}

impl LinkEdge {
    /// Build a new automatic edge. Self-loops are rejected.
    pub fn automatic(
        platform_id: Uuid,
        source_id: Uuid,
        target_id: Uuid,
        anchor_text: impl Into<String>,
        anchor_type: AnchorType,
        relevance_score: i32,
        context: LinkContext,
    ) -> Result<Self> {
        if source_id == target_id {
            return Err(AppError::SelfLoop { id: source_id });
        }

        Ok(Self {
            id: Uuid::now_v7(),
            platform_id,
            source_id,
            target_id,
            anchor_text: anchor_text.into(),
            anchor_type,
            relevance_score: relevance_score.clamp(0, 100),
            context,
            automatic: true,
            created_at: Utc::now(),
        })
    }
}

/// Selection criteria for candidate content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateFilter {
    pub platform_id: Option<Uuid>,

    /// Primary language subtag to match
    pub language: Option<String>,

    pub status: Option<ContentStatus>,

    pub kind: Option<ContentKind>,

    /// Item to leave out (usually the source itself)
    pub exclude_id: Option<Uuid>,
}

impl CandidateFilter {
    /// Published items of one platform
    pub fn published(platform_id: Uuid) -> Self {
        Self {
            platform_id: Some(platform_id),
            status: Some(ContentStatus::Published),
            ..Self::default()
        }
    }

    pub fn matches(&self, item: &ContentItem) -> bool {
        self.platform_id.map_or(true, |p| item.platform_id == p)
            && self
                .language
                .as_deref()
                .map_or(true, |l| item.primary_language() == primary_language(l))
            && self.status.map_or(true, |s| item.status == s)
            && self.kind.map_or(true, |k| item.kind == k)
            && self.exclude_id.map_or(true, |id| item.id != id)
    }
}

/// Selection criteria for link edges
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeFilter {
    pub platform_id: Option<Uuid>,
    pub source_id: Option<Uuid>,
    pub target_id: Option<Uuid>,
    pub automatic: Option<bool>,
}

impl EdgeFilter {
    /// Every edge of one platform
    pub fn platform(platform_id: Uuid) -> Self {
        Self {
            platform_id: Some(platform_id),
            ..Self::default()
        }
    }

    /// Automatic outbound edges of one item
    pub fn automatic_from(source_id: Uuid) -> Self {
        Self {
            source_id: Some(source_id),
            automatic: Some(true),
            ..Self::default()
        }
    }

    /// All outbound edges of one item
    pub fn from_source(source_id: Uuid) -> Self {
        Self {
            source_id: Some(source_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, edge: &LinkEdge) -> bool {
        self.platform_id.map_or(true, |p| edge.platform_id == p)
            && self.source_id.map_or(true, |s| edge.source_id == s)
            && self.target_id.map_or(true, |t| edge.target_id == t)
            && self.automatic.map_or(true, |a| edge.automatic == a)
    }
}
