use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::CommentRecord;

/// Caller-side filters over a finished comment list. Unset fields filter nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentFilters {
    /// Inclusive lower bound on `created_at`
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub end_date: Option<DateTime<Utc>>,
    pub min_likes: Option<u64>,
    pub only_sharers: Option<bool>,
    pub only_group_members: Option<bool>,
    /// Comma-separated; a comment matches if its content contains any of them
    pub content_keywords: Option<String>,
    /// Comma-separated; a comment matches if its author name contains any of them
    pub author_names: Option<String>,
}

impl CommentFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether `comment` passes every active filter.
    pub fn matches(&self, comment: &CommentRecord) -> bool {
        if self.start_date.is_some() || self.end_date.is_some() {
            let Some(created) = comment.created_at else {
                return false;
            };
            if self.start_date.is_some_and(|start| created < start) {
                return false;
            }
            if self.end_date.is_some_and(|end| created > end) {
                return false;
            }
        }

        if self.min_likes.is_some_and(|min| comment.like_count < min) {
            return false;
        }
        if self.only_sharers == Some(true) && !comment.has_shared() {
            return false;
        }
        if self.only_group_members == Some(true) && !comment.is_group_member {
            return false;
        }
        if !contains_any(&comment.content, self.content_keywords.as_deref()) {
            return false;
        }
        contains_any(&comment.author_name, self.author_names.as_deref())
    }
}

/// Case-insensitive: does `haystack` contain any comma-separated term of `terms`?
/// A missing or blank term list matches everything.
fn contains_any(haystack: &str, terms: Option<&str>) -> bool {
    let Some(terms) = terms else {
        return true;
    };
    let mut needles = terms
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .peekable();
    if needles.peek().is_none() {
        return true;
    }
    let haystack = haystack.to_lowercase();
    needles.any(|needle| haystack.contains(&needle))
}

/// The comments passing `filters`, cloned, in their original order.
pub fn apply(comments: &[CommentRecord], filters: &CommentFilters) -> Vec<CommentRecord> {
    comments.iter().filter(|c| filters.matches(c)).cloned().collect()
}

/// Filtered comments with counts over the filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSummary {
    pub comments: Vec<CommentRecord>,
    pub total_scraped: usize,
    pub total_after_filter: usize,
    pub sharers_count: usize,
    pub group_members_count: usize,
}

pub fn analyze(comments: &[CommentRecord], filters: &CommentFilters) -> FilterSummary {
    let filtered = apply(comments, filters);
    FilterSummary {
        total_scraped: comments.len(),
        total_after_filter: filtered.len(),
        sharers_count: filtered.iter().filter(|c| c.has_shared()).count(),
        group_members_count: filtered.iter().filter(|c| c.is_group_member).count(),
        comments: filtered,
    }
}
