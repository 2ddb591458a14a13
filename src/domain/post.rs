use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of timeline a post lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Profile,
    Page,
    Group,
}

/// Typed identity of a post, produced once by the URL classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostIdentity {
    /// Empty when the URL was well-formed but no id pattern matched
    pub post_id: String,
    pub group_id: Option<String>,
    /// Page slug or numeric profile id, when the URL carries one
    pub author_id: Option<String>,
    pub kind: PostKind,
    pub canonical_url: String,
}

impl PostIdentity {
    pub fn is_resolved(&self) -> bool {
        !self.post_id.is_empty()
    }

    pub fn is_group_post(&self) -> bool {
        self.kind == PostKind::Group
    }
}

/// Post-level metadata captured once per scrape session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSnapshot {
    pub identity: PostIdentity,
    pub content: String,
    pub author_name: String,
    pub author_profile_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub group_name: Option<String>,
    pub images: Vec<String>,
}

impl PostSnapshot {
    /// A snapshot carrying only the identity, used when the post body could not be read.
    pub fn empty(identity: PostIdentity) -> Self {
        Self {
            identity,
            content: String::new(),
            author_name: String::new(),
            author_profile_url: String::new(),
            created_at: None,
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            group_name: None,
            images: Vec::new(),
        }
    }
}
