use std::ops::Deref;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::Result;
use crate::scrape::config::ClickTarget;

/// What a navigation waits for before it counts as loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// The document load event
    Load,
    /// The load event, then the first element matching this CSS selector
    Element(String),
}

/// A single browser document the pipeline can steer.
///
/// Snapshots come back as serialized HTML; all parsing happens on the caller's
/// side so nothing here holds onto DOM handles across suspension points.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url`, failing with `NavigationTimeout` once `timeout` elapses.
    async fn navigate(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()>;

    /// Serialized markup of the document as it is right now.
    async fn current_document(&self) -> Result<String>;

    /// Scroll to the end of the document. Returns the resulting scroll height.
    async fn scroll_to_bottom(&self) -> Result<u64>;

    /// Activate every element matched by `target`. Returns how many were clicked.
    async fn click(&self, target: &ClickTarget) -> Result<usize>;

    /// A fresh document in the same browser session.
    async fn open_new_document(&self) -> Result<Box<dyn PageDriver>>;

    async fn close(&self) -> Result<()>;
}

/// Exclusive use of one document, closed when the lease ends.
///
/// Prefer [`PageLease::release`]; dropping the lease still closes the page
/// from a background task so early returns and `?` never leak a tab.
pub struct PageLease {
    page: Option<Box<dyn PageDriver>>,
}

impl PageLease {
    pub async fn open(opener: &dyn PageDriver) -> Result<Self> {
        let page = opener.open_new_document().await?;
        Ok(Self { page: Some(page) })
    }

    pub async fn release(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("Failed to close page: {}", e);
            }
        }
    }
}

impl Deref for PageLease {
    type Target = dyn PageDriver;

    fn deref(&self) -> &Self::Target {
        match &self.page {
            Some(page) => page.as_ref(),
            None => unreachable!("page taken only on release"),
        }
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        tracing::debug!("Failed to close page: {}", e);
                    }
                });
            }
            Err(_) => tracing::warn!("Page dropped outside a runtime; left open"),
        }
    }
}
