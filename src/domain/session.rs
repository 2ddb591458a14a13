use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CommentRecord, PostSnapshot};
use crate::scrape::ScrapingOptions;

/// A profile visit that could not be completed. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub profile_url: String,
    pub reason: String,
}

/// Completeness of a share-verification pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Distinct authors a profile visit was attempted for
    pub authors_checked: usize,
    pub authors_shared: usize,
    /// Authors without a usable profile URL, or not started because of cancellation
    pub authors_skipped: usize,
    pub failures: Vec<VerificationFailure>,
}

impl VerificationReport {
    /// Fraction of attempted profile visits that produced a definite answer.
    pub fn completeness(&self) -> f64 {
        if self.authors_checked == 0 {
            return 1.0;
        }
        let ok = self.authors_checked.saturating_sub(self.failures.len());
        ok as f64 / self.authors_checked as f64
    }
}

/// Result of one scrape request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSession {
    pub source_url: String,
    pub options: ScrapingOptions,
    pub post: PostSnapshot,
    pub comments: Vec<CommentRecord>,
    pub scraped_at: DateTime<Utc>,
    /// Number of unique comments before any caller-side filtering
    pub total_found: usize,
    /// `None` when share verification was skipped
    pub verification: Option<VerificationReport>,
}

impl ScrapeSession {
    pub fn new(
        source_url: impl Into<String>,
        options: ScrapingOptions,
        post: PostSnapshot,
        comments: Vec<CommentRecord>,
    ) -> Self {
        let total_found = comments.len();
        Self {
            source_url: source_url.into(),
            options,
            post,
            comments,
            scraped_at: Utc::now(),
            total_found,
            verification: None,
        }
    }

    pub fn sharers(&self) -> impl Iterator<Item = &CommentRecord> {
        self.comments.iter().filter(|c| c.has_shared())
    }
}
