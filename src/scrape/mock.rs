//! Scripted in-memory page driver for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::app::{Result, ScrapeError};
use crate::scrape::config::ClickTarget;
use crate::scrape::driver::{PageDriver, WaitCondition};

#[derive(Default)]
struct Script {
    /// Snapshots per URL; each scroll reveals the next one
    documents: HashMap<String, Vec<String>>,
    /// Remaining navigation timeouts per URL
    nav_timeouts: HashMap<String, u32>,
    snapshot_timeouts: u32,
    scroll_timeouts: u32,
    navigation_delay: Duration,
    /// URLs whose navigation panics, as a crashed task would
    crashes: Vec<String>,
    endless: bool,
    /// Click results by the first pattern of a target
    click_results: HashMap<String, Vec<usize>>,

    open_pages: usize,
    in_flight: usize,
    max_in_flight: usize,
    navigations: Vec<String>,
    waits: Vec<WaitCondition>,
    clicks: Vec<String>,
    scrolls: usize,
}

/// Browser session double. Hands out [`MockPage`]s sharing one script.
#[derive(Clone, Default)]
pub struct MockBrowser {
    script: Arc<Mutex<Script>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, url: &str, html: impl Into<String>) -> Self {
        self.with_documents(url, vec![html.into()])
    }

    pub fn with_documents(self, url: &str, documents: Vec<String>) -> Self {
        self.lock().documents.insert(url.to_string(), documents);
        self
    }

    /// Fail the next `times` navigations to `url` with a timeout.
    pub fn with_timeouts(self, url: &str, times: u32) -> Self {
        self.lock().nav_timeouts.insert(url.to_string(), times);
        self
    }

    /// Fail the next `times` snapshots with a timeout.
    pub fn with_snapshot_timeouts(self, times: u32) -> Self {
        self.lock().snapshot_timeouts = times;
        self
    }

    /// Fail the next `times` scrolls with a timeout.
    pub fn with_scroll_timeouts(self, times: u32) -> Self {
        self.lock().scroll_timeouts = times;
        self
    }

    pub fn with_crash(self, url: &str) -> Self {
        self.lock().crashes.push(url.to_string());
        self
    }

    pub fn with_navigation_delay(self, delay: Duration) -> Self {
        self.lock().navigation_delay = delay;
        self
    }

    /// Height grows on every scroll and snapshots cycle forever.
    pub fn with_endless_scroll(self) -> Self {
        self.lock().endless = true;
        self
    }

    /// Successive click counts for the target whose first pattern is `pattern`.
    pub fn with_clicks(self, pattern: &str, results: Vec<usize>) -> Self {
        self.lock().click_results.insert(pattern.to_string(), results);
        self
    }

    pub fn open_pages(&self) -> usize {
        self.lock().open_pages
    }

    pub fn max_concurrent_navigations(&self) -> usize {
        self.lock().max_in_flight
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn waits(&self) -> Vec<WaitCondition> {
        self.lock().waits.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn scrolls(&self) -> usize {
        self.lock().scrolls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

#[async_trait]
impl PageDriver for MockBrowser {
    async fn navigate(&self, _url: &str, _wait: WaitCondition, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn current_document(&self) -> Result<String> {
        Ok("<html></html>".to_string())
    }

    async fn scroll_to_bottom(&self) -> Result<u64> {
        Ok(0)
    }

    async fn click(&self, _target: &ClickTarget) -> Result<usize> {
        Ok(0)
    }

    async fn open_new_document(&self) -> Result<Box<dyn PageDriver>> {
        self.lock().open_pages += 1;
        Ok(Box::new(MockPage {
            browser: self.clone(),
            url: Mutex::new(None),
            scrolls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct MockPage {
    browser: MockBrowser,
    url: Mutex<Option<String>>,
    scrolls: AtomicUsize,
    closed: AtomicBool,
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()> {
        let (delay, timed_out) = {
            let mut script = self.browser.lock();
            script.navigations.push(url.to_string());
            script.waits.push(wait);
            if script.crashes.iter().any(|c| c == url) {
                drop(script);
                panic!("page crashed on {url}");
            }
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
            let timed_out = match script.nav_timeouts.get_mut(url) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            };
            (script.navigation_delay, timed_out)
        };

        tokio::time::sleep(delay).await;
        self.browser.lock().in_flight -= 1;

        if timed_out {
            return Err(ScrapeError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        *self.url.lock().unwrap() = Some(url.to_string());
        self.scrolls.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn current_document(&self) -> Result<String> {
        let url = self.url.lock().unwrap().clone().unwrap_or_default();
        let mut script = self.browser.lock();
        if script.snapshot_timeouts > 0 {
            script.snapshot_timeouts -= 1;
            return Err(ScrapeError::NavigationTimeout {
                url,
                timeout_secs: 0,
            });
        }

        let Some(documents) = script.documents.get(&url).filter(|d| !d.is_empty()) else {
            return Ok("<html></html>".to_string());
        };
        let revealed = self.scrolls.load(Ordering::SeqCst).saturating_sub(1);
        let index = if script.endless {
            revealed % documents.len()
        } else {
            revealed.min(documents.len() - 1)
        };
        Ok(documents[index].clone())
    }

    async fn scroll_to_bottom(&self) -> Result<u64> {
        let url = self.url.lock().unwrap().clone().unwrap_or_default();
        let mut script = self.browser.lock();
        script.scrolls += 1;
        if script.scroll_timeouts > 0 {
            script.scroll_timeouts -= 1;
            return Err(ScrapeError::NavigationTimeout {
                url,
                timeout_secs: 0,
            });
        }
        let scrolls = self.scrolls.fetch_add(1, Ordering::SeqCst) + 1;

        let pages = script.documents.get(&url).map(Vec::len).unwrap_or(1).max(1);
        let revealed = if script.endless { scrolls } else { scrolls.min(pages) };
        Ok(revealed as u64 * 1000)
    }

    async fn click(&self, target: &ClickTarget) -> Result<usize> {
        let key = target.patterns.first().cloned().unwrap_or_default();
        let mut script = self.browser.lock();
        script.clicks.push(key.clone());
        let clicked = match script.click_results.get_mut(&key) {
            Some(results) if !results.is_empty() => results.remove(0),
            _ => 0,
        };
        Ok(clicked)
    }

    async fn open_new_document(&self) -> Result<Box<dyn PageDriver>> {
        self.browser.open_new_document().await
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.browser.lock().open_pages -= 1;
        }
        Ok(())
    }
}
