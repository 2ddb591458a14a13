use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One reaction bucket on a comment, e.g. `{ kind: "love", count: 3 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub kind: String,
    pub count: u64,
}

/// Outcome of checking whether a comment author republished the target post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareStatus {
    pub has_shared: bool,
    pub share_url: Option<String>,
    /// Audience label of the share, e.g. "Public"
    pub share_type: Option<String>,
    pub share_time: Option<DateTime<Utc>>,
    pub share_message: Option<String>,
}

impl ShareStatus {
    pub fn not_shared() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    /// Site-provided comment id, when the markup exposes one
    pub id: Option<String>,
    /// Dedup-only key derived from author, content and minute bucket. Not durable.
    #[serde(skip)]
    pub fingerprint: String,
    pub author_name: String,
    pub author_profile_url: String,
    pub author_id: Option<String>,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Timestamp text as displayed, kept for callers that want to re-resolve it
    pub time_text: Option<String>,
    pub like_count: u64,
    pub reply_count: u64,
    pub reactions: Vec<Reaction>,
    pub comment_url: Option<String>,
    pub is_group_member: bool,
    pub group_role: Option<String>,
    /// `None` until share verification has run
    pub share_status: Option<ShareStatus>,
}

impl CommentRecord {
    pub fn new(
        author_name: impl Into<String>,
        content: impl Into<String>,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        let author_name = author_name.into();
        let content = content.into();
        let fingerprint = Self::fingerprint_of(&author_name, &content, created_at);
        Self {
            id: None,
            fingerprint,
            author_name,
            author_profile_url: String::new(),
            author_id: None,
            content,
            created_at,
            time_text: None,
            like_count: 0,
            reply_count: 0,
            reactions: Vec::new(),
            comment_url: None,
            is_group_member: false,
            group_role: None,
            share_status: None,
        }
    }

    /// Derive the fallback dedup key from author, content and the minute the comment falls in.
    pub fn fingerprint_of(author_name: &str, content: &str, created_at: Option<DateTime<Utc>>) -> String {
        Self::fingerprint_in_bucket(author_name, content, Self::minute_bucket(created_at))
    }

    /// Fingerprint for an explicit minute bucket. Unknown times use `i64::MIN`.
    pub fn fingerprint_in_bucket(author_name: &str, content: &str, bucket: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(author_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
        hasher.update(bucket.to_be_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn minute_bucket(created_at: Option<DateTime<Utc>>) -> i64 {
        created_at.map(|t| t.timestamp().div_euclid(60)).unwrap_or(i64::MIN)
    }

    /// Recompute the fingerprint after author, content or time changed.
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = Self::fingerprint_of(&self.author_name, &self.content, self.created_at);
    }

    /// Site id when present, otherwise the fingerprint.
    pub fn identity(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.fingerprint)
    }

    pub fn has_site_id(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn has_shared(&self) -> bool {
        self.share_status.as_ref().is_some_and(|s| s.has_shared)
    }
}
