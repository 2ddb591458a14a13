use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::app::{CancelFlag, Result, ScrapeError};
use crate::classifier;
use crate::domain::{CommentRecord, PostIdentity, ShareStatus, VerificationFailure, VerificationReport};
use crate::scrape::config::VerifierConfig;
use crate::scrape::driver::{PageDriver, PageLease, WaitCondition};
use crate::scrape::extractor::CommentExtractor;

enum Outcome {
    Checked(Result<ShareStatus>),
    /// Cancelled before the visit started
    NotStarted,
}

/// Visits comment authors' timelines, a few at a time, looking for a share of the post.
pub struct ShareVerifier {
    extractor: Arc<CommentExtractor>,
    config: VerifierConfig,
}

impl ShareVerifier {
    pub fn new(extractor: Arc<CommentExtractor>, config: VerifierConfig) -> Self {
        Self { extractor, config }
    }

    /// Fill `share_status` on every comment.
    ///
    /// Each distinct profile is visited once, with at most `max_concurrency`
    /// visits in flight. Comments whose author has no usable profile URL are
    /// marked not shared without a visit. A failed visit also counts as not
    /// shared and is recorded in the returned report.
    pub async fn verify(
        &self,
        opener: Arc<dyn PageDriver>,
        comments: &mut [CommentRecord],
        target: &PostIdentity,
        cancel: &CancelFlag,
    ) -> VerificationReport {
        let mut report = VerificationReport::default();

        let mut profiles: Vec<String> = Vec::new();
        let mut owners: HashMap<String, Vec<usize>> = HashMap::new();
        let mut unusable: Vec<&str> = Vec::new();
        for (index, comment) in comments.iter().enumerate() {
            match classifier::normalize_profile_url(&comment.author_profile_url, &target.canonical_url) {
                Some(profile) => {
                    let slot = owners.entry(profile.clone()).or_default();
                    if slot.is_empty() {
                        profiles.push(profile);
                    }
                    slot.push(index);
                }
                None => {
                    if !unusable.contains(&comment.author_name.as_str()) {
                        unusable.push(&comment.author_name);
                    }
                }
            }
        }
        report.authors_skipped = unusable.len();

        tracing::info!(
            "Verifying shares for {} authors with {} workers",
            profiles.len(),
            self.config.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let target = Arc::new(target.clone());
        let mut handles = Vec::new();

        for profile in profiles {
            let sem = semaphore.clone();
            let opener = opener.clone();
            let extractor = self.extractor.clone();
            let config = self.config.clone();
            let target = target.clone();
            let cancel = cancel.clone();

            let url = profile.clone();
            let handle = tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return Outcome::NotStarted;
                };
                if cancel.is_cancelled() {
                    return Outcome::NotStarted;
                }

                Outcome::Checked(visit_profile(opener.as_ref(), &extractor, &config, &url, &target).await)
            });

            handles.push((profile, handle));
        }

        for (profile, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Task join error for {}: {}", profile, e);
                    Outcome::Checked(Err(ScrapeError::Browser(format!("Share check task failed: {}", e))))
                }
            };

            let status = match outcome {
                Outcome::Checked(Ok(status)) => {
                    report.authors_checked += 1;
                    if status.has_shared {
                        report.authors_shared += 1;
                    }
                    status
                }
                Outcome::Checked(Err(e)) => {
                    tracing::warn!("Share check failed for {}: {}", profile, e);
                    report.authors_checked += 1;
                    report.failures.push(VerificationFailure {
                        profile_url: profile.clone(),
                        reason: e.to_string(),
                    });
                    ShareStatus::not_shared()
                }
                Outcome::NotStarted => {
                    report.authors_skipped += 1;
                    ShareStatus::not_shared()
                }
            };

            for &index in owners.get(&profile).into_iter().flatten() {
                comments[index].share_status = Some(status.clone());
            }
        }

        for comment in comments.iter_mut() {
            comment.share_status.get_or_insert_with(ShareStatus::not_shared);
        }

        tracing::info!(
            "{} of {} checked authors shared the post ({} failed, {} skipped)",
            report.authors_shared,
            report.authors_checked,
            report.failures.len(),
            report.authors_skipped
        );
        report
    }

    /// Check a single profile. Fails when the profile URL is unusable or the visit fails.
    pub async fn check_author(
        &self,
        opener: &dyn PageDriver,
        profile_url: &str,
        target: &PostIdentity,
    ) -> Result<ShareStatus> {
        let profile = classifier::normalize_profile_url(profile_url, &target.canonical_url)
            .ok_or_else(|| ScrapeError::InvalidUrlKind(profile_url.to_string()))?;
        visit_profile(opener, &self.extractor, &self.config, &profile, target).await
    }
}

async fn visit_profile(
    opener: &dyn PageDriver,
    extractor: &CommentExtractor,
    config: &VerifierConfig,
    profile_url: &str,
    target: &PostIdentity,
) -> Result<ShareStatus> {
    let page = PageLease::open(opener).await?;

    let result = async {
        page.navigate(profile_url, WaitCondition::Load, config.navigation_timeout())
            .await?;
        tokio::time::sleep(config.settle_delay()).await;

        for _ in 0..config.scroll_passes {
            if let Err(e) = page.scroll_to_bottom().await {
                tracing::debug!("Scroll on {} failed: {}", profile_url, e);
                break;
            }
            tokio::time::sleep(config.settle_delay()).await;
        }

        let html = page.current_document().await?;
        Ok::<_, ScrapeError>(extractor.extract_share(&html, target, config.max_posts_scanned))
    }
    .await;

    page.release().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::normalizer::TimeNormalizer;
    use crate::scrape::config::SelectorConfig;
    use crate::scrape::mock::MockBrowser;
    use std::time::Duration;

    const POST_URL: &str = "https://www.facebook.com/rustlang/posts/1234567890";

    fn verifier(max_concurrency: usize) -> ShareVerifier {
        let extractor = CommentExtractor::new(&SelectorConfig::default(), TimeNormalizer::new());
        ShareVerifier::new(
            Arc::new(extractor),
            VerifierConfig {
                max_concurrency,
                settle_delay_ms: 0,
                ..VerifierConfig::default()
            },
        )
    }

    fn author(name: &str) -> CommentRecord {
        let mut comment = CommentRecord::new(name, "nice", None);
        comment.author_profile_url = format!("https://facebook.com/{name}");
        comment
    }

    fn timeline_sharing() -> String {
        r#"<html><body><div role="article">
            <a href="/rustlang/posts/1234567890">Rust</a>
        </div></body></html>"#
            .to_string()
    }

    fn timeline_plain() -> String {
        r#"<html><body><div role="article"><a href="/cats/posts/1">cats</a></div></body></html>"#.to_string()
    }

    #[tokio::test]
    async fn test_bounded_concurrency_with_timeouts() {
        let names = ["an", "bo", "cu", "di", "em"];
        let mut browser = MockBrowser::new().with_navigation_delay(Duration::from_millis(20));
        for name in &names {
            browser = browser.with_document(&format!("https://facebook.com/{name}"), timeline_plain());
        }
        let browser = browser
            .with_document("https://facebook.com/an", timeline_sharing())
            .with_timeouts("https://facebook.com/bo", u32::MAX)
            .with_timeouts("https://facebook.com/cu", u32::MAX);

        let mut comments: Vec<_> = names.iter().map(|n| author(n)).collect();
        let target = classify(POST_URL).unwrap();
        let opener: Arc<dyn PageDriver> = Arc::new(browser.clone());

        let report = verifier(2)
            .verify(opener, &mut comments, &target, &CancelFlag::new())
            .await;

        assert!(browser.max_concurrent_navigations() <= 2);
        assert_eq!(browser.navigations().len(), 5);
        assert!(comments.iter().all(|c| c.share_status.is_some()));
        assert!(comments[0].has_shared());
        assert!(comments[1..].iter().all(|c| !c.has_shared()));

        assert_eq!(report.authors_checked, 5);
        assert_eq!(report.authors_shared, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.completeness(), 0.6);
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_one_visit_per_profile() {
        let browser = MockBrowser::new().with_document("https://facebook.com/an", timeline_sharing());
        let mut first = author("an");
        first.author_profile_url = "https://m.facebook.com/an?comment_id=1".into();
        let second = author("an");
        let mut comments = vec![first, second];

        let opener: Arc<dyn PageDriver> = Arc::new(browser.clone());
        verifier(2)
            .verify(opener, &mut comments, &classify(POST_URL).unwrap(), &CancelFlag::new())
            .await;

        assert_eq!(browser.navigations(), vec!["https://facebook.com/an".to_string()]);
        assert!(comments.iter().all(|c| c.has_shared()));
    }

    #[tokio::test]
    async fn test_unusable_profiles_skipped() {
        let browser = MockBrowser::new();
        let mut nameless = CommentRecord::new("Ghost", "boo", None);
        nameless.author_profile_url = String::new();
        let mut hashtag = CommentRecord::new("Tag", "#rust", None);
        hashtag.author_profile_url = "https://facebook.com/hashtag/rust".into();
        let mut comments = vec![nameless, hashtag];

        let opener: Arc<dyn PageDriver> = Arc::new(browser.clone());
        let report = verifier(2)
            .verify(opener, &mut comments, &classify(POST_URL).unwrap(), &CancelFlag::new())
            .await;

        assert!(browser.navigations().is_empty());
        assert_eq!(report.authors_skipped, 2);
        assert_eq!(report.authors_checked, 0);
        assert!(comments.iter().all(|c| c.share_status == Some(ShareStatus::not_shared())));
    }

    #[tokio::test]
    async fn test_cancelled_before_visits() {
        let browser = MockBrowser::new();
        let mut comments = vec![author("an"), author("bo")];
        let cancel = CancelFlag::new();
        cancel.cancel();

        let opener: Arc<dyn PageDriver> = Arc::new(browser.clone());
        let report = verifier(2)
            .verify(opener, &mut comments, &classify(POST_URL).unwrap(), &cancel)
            .await;

        assert!(browser.navigations().is_empty());
        assert_eq!(report.authors_skipped, 2);
        assert!(comments.iter().all(|c| c.share_status.is_some()));
    }

    #[tokio::test]
    async fn test_cancelled_while_first_visit_in_flight() {
        let names = ["an", "bo", "cu"];
        let mut browser = MockBrowser::new().with_navigation_delay(Duration::from_millis(100));
        for name in &names {
            browser = browser.with_document(&format!("https://facebook.com/{name}"), timeline_plain());
        }
        let mut comments: Vec<_> = names.iter().map(|n| author(n)).collect();

        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let opener: Arc<dyn PageDriver> = Arc::new(browser.clone());
        let report = verifier(1)
            .verify(opener, &mut comments, &classify(POST_URL).unwrap(), &cancel)
            .await;

        // The visit already under way finishes; the queued ones never start
        assert_eq!(browser.navigations(), vec!["https://facebook.com/an".to_string()]);
        assert_eq!(report.authors_checked, 1);
        assert_eq!(report.authors_skipped, 2);
        assert!(report.failures.is_empty());
        assert_eq!(comments[0].share_status, Some(ShareStatus::not_shared()));
        assert!(comments.iter().all(|c| c.share_status.is_some()));
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_crashed_check_recorded_as_failure() {
        let browser = MockBrowser::new()
            .with_document("https://facebook.com/an", timeline_sharing())
            .with_crash("https://facebook.com/bo");
        let mut comments = vec![author("an"), author("bo")];

        let opener: Arc<dyn PageDriver> = Arc::new(browser.clone());
        let report = verifier(2)
            .verify(opener, &mut comments, &classify(POST_URL).unwrap(), &CancelFlag::new())
            .await;

        assert_eq!(report.authors_checked, 2);
        assert_eq!(report.authors_shared, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].profile_url, "https://facebook.com/bo");
        assert!(comments[0].has_shared());
        assert_eq!(comments[1].share_status, Some(ShareStatus::not_shared()));
    }

    #[tokio::test]
    async fn test_check_author() {
        let browser = MockBrowser::new().with_document("https://facebook.com/an", timeline_sharing());
        let target = classify(POST_URL).unwrap();
        let verifier = verifier(1);

        let status = verifier
            .check_author(&browser, "https://www.facebook.com/an/", &target)
            .await
            .unwrap();
        assert!(status.has_shared);

        let status = verifier
            .check_author(&browser, "https://facebook.com/bo", &target)
            .await
            .unwrap();
        assert!(!status.has_shared);

        assert!(verifier
            .check_author(&browser, "https://example.com/an", &target)
            .await
            .is_err());
    }
}
