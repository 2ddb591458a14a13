//! Browser-driven comment scraping.
//!
//! One scrape session walks a single post document and then fans out to the
//! commenters' timelines to check for shares.
//!
//! # Architecture
//!
//! ```text
//! URL → classify → post document ─┬─ post info
//!                                 └─ expand/scroll cycles → extract → dedup
//!                                        → share verification (bounded pool) → ScrapeSession
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use commentscope::scrape::{ChromeDriver, CommentScraper, ScrapingOptions};
//!
//! let driver = ChromeDriver::launch(&config.browser, true).await?;
//! let scraper = CommentScraper::new(Arc::new(driver), config.selectors, config.verifier);
//!
//! let session = scraper
//!     .scrape_post(url, &ScrapingOptions::default(), true, &CancelFlag::new())
//!     .await?;
//! let popular = filter::apply(&session.comments, &CommentFilters { min_likes: Some(5), ..Default::default() });
//! ```

mod chrome;
pub mod config;
pub mod counts;
mod dedup;
mod driver;
mod extractor;
pub mod filter;
#[cfg(test)]
pub(crate) mod mock;
mod pagination;
mod verifier;

pub use chrome::ChromeDriver;
pub use config::{BrowserConfig, ClickTarget, ScrapingOptions, SelectorConfig, SortOrder, VerifierConfig};
pub use dedup::{Deduplicator, MergeStats};
pub use driver::{PageDriver, PageLease, WaitCondition};
pub use extractor::CommentExtractor;
pub use filter::{CommentFilters, FilterSummary};
pub use pagination::{sort_comments, PaginationDriver, PaginationState};
pub use verifier::ShareVerifier;

use std::sync::Arc;

use crate::app::{CancelFlag, Result, ScrapeError};
use crate::classifier;
use crate::domain::{PostIdentity, PostSnapshot, ScrapeSession};
use crate::normalizer::TimeNormalizer;
use pagination::retry_once;

/// Runs scrape sessions against pages opened from one browser session.
pub struct CommentScraper {
    opener: Arc<dyn PageDriver>,
    selectors: SelectorConfig,
    verifier: VerifierConfig,
    extractor: CommentExtractor,
}

impl CommentScraper {
    pub fn new(opener: Arc<dyn PageDriver>, selectors: SelectorConfig, verifier: VerifierConfig) -> Self {
        Self::with_normalizer(opener, selectors, verifier, TimeNormalizer::new())
    }

    pub fn with_normalizer(
        opener: Arc<dyn PageDriver>,
        selectors: SelectorConfig,
        verifier: VerifierConfig,
        normalizer: TimeNormalizer,
    ) -> Self {
        let extractor = CommentExtractor::new(&selectors, normalizer);
        Self {
            opener,
            selectors,
            verifier,
            extractor,
        }
    }

    pub fn verifier_config(&self) -> &VerifierConfig {
        &self.verifier
    }

    pub fn set_verifier_config(&mut self, config: VerifierConfig) {
        self.verifier = config;
    }

    /// Scrape every reachable comment of the post at `url`.
    ///
    /// Only an unrecognized URL or a failed initial load of the post is an
    /// error. An unreadable post body leaves the post info empty. With `verify`, each comment gets a share status and the session
    /// carries a verification report.
    pub async fn scrape_post(
        &self,
        url: &str,
        options: &ScrapingOptions,
        verify: bool,
        cancel: &CancelFlag,
    ) -> Result<ScrapeSession> {
        let identity = classifier::classify(url)?;
        if !identity.is_resolved() {
            tracing::warn!("No post id found in {}; continuing with the page as given", url);
        }
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        tracing::info!("Scraping {:?} post {}", identity.kind, identity.canonical_url);
        let extractor = self.extractor.clone().with_reactions(options.load_reactions);

        let page = PageLease::open(self.opener.as_ref()).await?;
        let result = async {
            self.load_post(&*page, &identity, options).await?;
            let post = read_post_info(&*page, &extractor, &identity).await;

            self.apply_sort_order(&*page, options).await;

            let dedup = Deduplicator::new(options.dedup_window());
            let driver = PaginationDriver::new(&extractor, dedup, &self.selectors);
            let comments = driver.collect(&*page, &identity, options, cancel).await;
            Ok::<_, ScrapeError>((post, comments))
        }
        .await;
        page.release().await;

        let (post, mut comments) = result?;

        let verification = if verify && !comments.is_empty() {
            let verifier = ShareVerifier::new(Arc::new(extractor), self.verifier.clone());
            Some(
                verifier
                    .verify(self.opener.clone(), &mut comments, &identity, cancel)
                    .await,
            )
        } else {
            None
        };

        let mut session = ScrapeSession::new(url, options.clone(), post, comments);
        session.verification = verification;

        tracing::info!(
            "Scraped {} comments from {}",
            session.total_found,
            identity.canonical_url
        );
        Ok(session)
    }

    /// Post metadata only, without paginating comments.
    pub async fn post_info(&self, url: &str, options: &ScrapingOptions) -> Result<PostSnapshot> {
        let identity = classifier::classify(url)?;

        let page = PageLease::open(self.opener.as_ref()).await?;
        let result = async {
            self.load_post(&*page, &identity, options).await?;
            Ok::<_, ScrapeError>(read_post_info(&*page, &self.extractor, &identity).await)
        }
        .await;
        page.release().await;

        result
    }

    /// Whether the author at `profile_url` shared the post at `post_url`.
    ///
    /// For callers that already have comments from elsewhere. A failed profile
    /// visit answers `false`; only an unrecognized post URL is an error.
    pub async fn verify_share(&self, post_url: &str, profile_url: &str) -> Result<bool> {
        let identity = classifier::classify(post_url)?;
        let verifier = ShareVerifier::new(Arc::new(self.extractor.clone()), self.verifier.clone());

        match verifier.check_author(self.opener.as_ref(), profile_url, &identity).await {
            Ok(status) => Ok(status.has_shared),
            Err(e) => {
                tracing::warn!("Share check for {} failed: {}", profile_url, e);
                Ok(false)
            }
        }
    }

    async fn load_post(&self, page: &dyn PageDriver, identity: &PostIdentity, options: &ScrapingOptions) -> Result<()> {
        let wait = match &self.selectors.post_ready {
            Some(selector) => WaitCondition::Element(selector.clone()),
            None => WaitCondition::Load,
        };
        retry_once("post navigation", || {
            page.navigate(&identity.canonical_url, wait.clone(), options.timeout())
        })
        .await?;
        tokio::time::sleep(options.scroll_delay()).await;
        Ok(())
    }

    /// Ask the site for the requested ordering before paginating. Best effort.
    async fn apply_sort_order(&self, page: &dyn PageDriver, options: &ScrapingOptions) {
        let entry = match options.sort_order {
            SortOrder::OldestFirst => &self.selectors.sort_oldest,
            SortOrder::NewestFirst => &self.selectors.sort_newest,
            SortOrder::MostRelevant => return,
        };

        match page.click(&self.selectors.sort_menu).await {
            Ok(0) => {
                tracing::debug!("No comment ordering menu found");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to open comment ordering menu: {}", e);
                return;
            }
        }
        tokio::time::sleep(options.scroll_delay() / 2).await;

        match page.click(entry).await {
            Ok(0) => tracing::debug!("Ordering {:?} not offered", options.sort_order),
            Ok(_) => {
                tracing::debug!("Switched comment ordering to {:?}", options.sort_order);
                tokio::time::sleep(options.scroll_delay()).await;
            }
            Err(e) => tracing::warn!("Failed to pick comment ordering: {}", e),
        }
    }
}

async fn read_post_info(page: &dyn PageDriver, extractor: &CommentExtractor, identity: &PostIdentity) -> PostSnapshot {
    match retry_once("post snapshot", || page.current_document()).await {
        Ok(html) => extractor.extract_post_info(&html, identity),
        Err(e) => {
            tracing::warn!("Could not read post {}: {}", identity.canonical_url, e);
            PostSnapshot::empty(identity.clone())
        }
    }
}
