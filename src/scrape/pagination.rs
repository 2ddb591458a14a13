use std::future::Future;

use crate::app::{CancelFlag, Result};
use crate::domain::{CommentRecord, PostIdentity};
use crate::scrape::config::{ClickTarget, ScrapingOptions, SelectorConfig, SortOrder};
use crate::scrape::dedup::Deduplicator;
use crate::scrape::driver::PageDriver;
use crate::scrape::extractor::CommentExtractor;

/// Where a pagination cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    /// Activating "load more" and reply affordances
    Expanding,
    /// Scrolling and waiting for content
    Scrolling,
    /// Extracting, merging and deciding whether to go on
    Settled,
    Done,
}

/// Drives one document through expand/scroll/extract cycles until nothing new appears.
pub struct PaginationDriver<'a> {
    extractor: &'a CommentExtractor,
    dedup: Deduplicator,
    load_more: &'a ClickTarget,
    load_replies: &'a ClickTarget,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(extractor: &'a CommentExtractor, dedup: Deduplicator, selectors: &'a SelectorConfig) -> Self {
        Self {
            extractor,
            dedup,
            load_more: &selectors.load_more,
            load_replies: &selectors.load_replies,
        }
    }

    /// Collect unique comments from an already loaded post document.
    ///
    /// Stops when `max_scroll_attempts` consecutive cycles add nothing new, when
    /// `max_comments` is reached, or when a cycle neither clicked anything nor
    /// grew the page. A failed scroll says nothing about growth, so only the
    /// stall counter can end the run after one. Cancellation stops at the next cycle boundary and returns
    /// what was collected so far. The result is truncated and sorted.
    pub async fn collect(
        &self,
        page: &dyn PageDriver,
        post: &PostIdentity,
        options: &ScrapingOptions,
        cancel: &CancelFlag,
    ) -> Vec<CommentRecord> {
        let mut comments: Vec<CommentRecord> = Vec::new();
        let mut state = PaginationState::Expanding;
        let mut stalls: u32 = 0;
        let mut cycle: u32 = 0;
        let mut clicked = 0usize;
        let mut height: Option<u64> = None;
        let mut grew = false;
        let mut scroll_failed = false;

        while state != PaginationState::Done {
            state = match state {
                PaginationState::Expanding => {
                    if cancel.is_cancelled() {
                        tracing::info!("Pagination cancelled after {} cycles", cycle);
                        PaginationState::Done
                    } else {
                        cycle += 1;
                        clicked = self.click(page, self.load_more).await;
                        if options.load_replies {
                            clicked += self.click(page, self.load_replies).await;
                        }
                        PaginationState::Scrolling
                    }
                }
                PaginationState::Scrolling => {
                    let previous = height;
                    match retry_once("scroll", || page.scroll_to_bottom()).await {
                        Ok(h) => {
                            grew = previous.is_none_or(|p| h > p);
                            height = Some(h);
                            scroll_failed = false;
                        }
                        Err(e) => {
                            tracing::warn!("Scroll failed: {}", e);
                            grew = false;
                            scroll_failed = true;
                        }
                    }
                    tokio::time::sleep(options.scroll_delay()).await;
                    PaginationState::Settled
                }
                PaginationState::Settled => {
                    let added = match retry_once("snapshot", || page.current_document()).await {
                        Ok(html) => {
                            let batch = self.extractor.extract_comments(&html, post);
                            let found = batch.len();
                            let stats = self.dedup.merge(&mut comments, batch);
                            tracing::debug!(
                                "Cycle {}: {} extracted, {} new, {} updated, {} total",
                                cycle,
                                found,
                                stats.added,
                                stats.updated,
                                comments.len()
                            );
                            stats.added
                        }
                        Err(e) => {
                            tracing::warn!("Cycle {} snapshot failed, counting as a stall: {}", cycle, e);
                            0
                        }
                    };

                    if added > 0 {
                        stalls = 0;
                    } else {
                        stalls += 1;
                    }

                    if comments.len() >= options.max_comments {
                        tracing::debug!("Reached {} comments", options.max_comments);
                        PaginationState::Done
                    } else if stalls >= options.max_scroll_attempts {
                        tracing::debug!("{} cycles without new comments", stalls);
                        PaginationState::Done
                    } else if clicked == 0 && !grew && !scroll_failed {
                        tracing::debug!("Nothing left to expand and page stopped growing");
                        PaginationState::Done
                    } else {
                        PaginationState::Expanding
                    }
                }
                PaginationState::Done => PaginationState::Done,
            };
        }

        tracing::info!("Collected {} unique comments in {} cycles", comments.len(), cycle);
        comments.truncate(options.max_comments);
        sort_comments(&mut comments, options.sort_order);
        comments
    }

    async fn click(&self, page: &dyn PageDriver, target: &ClickTarget) -> usize {
        match page.click(target).await {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("Click failed: {}", e);
                0
            }
        }
    }
}

/// Run `op`, and once more if it timed out.
pub(crate) async fn retry_once<T, F, Fut>(what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(e) if e.is_timeout() => {
            tracing::warn!("{} timed out, retrying once: {}", what, e);
            op().await
        }
        other => other,
    }
}

/// Order comments in place. Sorting is stable, so ties keep extraction order.
///
/// Unknown times sort first for oldest-first and last for newest-first.
pub fn sort_comments(comments: &mut [CommentRecord], order: SortOrder) {
    match order {
        SortOrder::OldestFirst => comments.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::NewestFirst => comments.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::MostRelevant => {}
    }
}
