use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::status::{Maturity, StatusFamily};
use super::string_enum;

string_enum! {
    /// The kinds of content a vault holds.
    pub enum ContentType: "content type" {
        Note => "note",
        Reference => "reference",
        Task => "task",
        Decision => "decision",
        Session => "session",
    }
}

/// How ids are assigned for a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    /// `{prefix}{8 lowercase hex}` derived from the normalized title.
    ContentHash { prefix: &'static str },
    /// `{namespace}-{zero-padded counter}` claimed from `id_counters`.
    Sequential { namespace: &'static str },
}

impl ContentType {
    #[must_use]
    pub const fn id_scheme(self) -> IdScheme {
        match self {
            Self::Note => IdScheme::ContentHash { prefix: "note-" },
            Self::Reference => IdScheme::ContentHash { prefix: "ref-" },
            Self::Task => IdScheme::Sequential { namespace: "TASK" },
            Self::Decision => IdScheme::Sequential { namespace: "DEC" },
            Self::Session => IdScheme::Sequential { namespace: "SES" },
        }
    }

    #[must_use]
    pub const fn status_family(self) -> StatusFamily {
        match self {
            Self::Note | Self::Reference => StatusFamily::Machine,
            Self::Task => StatusFamily::Task,
            Self::Decision => StatusFamily::Decision,
            Self::Session => StatusFamily::Session,
        }
    }
}

/// Cached analytics outputs. Written only by graph analytics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub in_degree: u32,
    pub out_degree: u32,
    pub rank_score: Option<f64>,
    pub cluster_id: Option<i64>,
    pub betweenness: Option<f64>,
}

/// A content item as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub content_type: ContentType,
    pub subtype: Option<String>,
    pub status: String,
    pub maturity: Option<Maturity>,
    pub title: String,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub topic: Option<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
    pub archived: bool,
    pub analytics: AnalyticsSnapshot,
}

/// Validated attributes supplied by the content creator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewContent {
    pub content_type: Option<ContentType>,
    pub title: String,
    pub subtype: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub topic: Option<String>,
    pub maturity: Option<Maturity>,
    /// Structured link declarations: edge type → target ids.
    pub links: BTreeMap<String, Vec<String>>,
}

impl NewContent {
    pub fn new(content_type: ContentType, title: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type),
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_link(mut self, edge_type: impl Into<String>, target: impl Into<String>) -> Self {
        self.links
            .entry(edge_type.into())
            .or_default()
            .push(target.into());
        self
    }
}
