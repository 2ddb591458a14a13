use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::Page;
use futures::StreamExt;

use crate::app::{Result, ScrapeError};
use crate::scrape::config::{BrowserConfig, ClickTarget};
use crate::scrape::driver::{PageDriver, WaitCondition};

const SCROLL_SCRIPT: &str = r#"
    (() => {
        window.scrollTo(0, document.body.scrollHeight);
        return document.body.scrollHeight;
    })()
"#;

/// Chrome document driven through chromiumoxide.
///
/// Every page opened from a driver shares its browser process.
pub struct ChromeDriver {
    browser: Arc<Browser>,
    page: Page,
}

impl ChromeDriver {
    /// Launch a browser and open a blank page to steer.
    pub async fn launch(config: &BrowserConfig, headless: bool) -> Result<Self> {
        let mut builder = LaunchConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--disable-notifications")
            .arg(format!("--accept-lang={}", config.accept_language))
            .window_size(config.window_width, config.window_height);

        if let Some(ref ua) = config.user_agent {
            builder = builder.arg(format!("--user-agent={}", ua));
        }
        for arg in &config.extra_args {
            builder = builder.arg(arg.clone());
        }
        if !headless {
            builder = builder.with_head();
        }

        let launch_config = builder
            .build()
            .map_err(|e| ScrapeError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(launch_config).await.map_err(|e| {
            ScrapeError::Browser(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        let browser = Arc::new(browser);
        let page = new_blank_page(&browser).await?;
        tracing::debug!("Browser launched (headless: {})", headless);

        Ok(Self { browser, page })
    }

    fn click_script(target: &ClickTarget) -> Result<String> {
        let selectors = serde_json::to_string(&target.selectors)?;
        let patterns = serde_json::to_string(&target.patterns)?;
        let first_only = target.first_only;

        Ok(format!(
            r#"
            (() => {{
                const selectors = {selectors};
                const patterns = {patterns}.map(p => new RegExp(p, 'i'));
                const seen = new Set();
                let clicked = 0;
                for (const selector of selectors) {{
                    let nodes;
                    try {{
                        nodes = document.querySelectorAll(selector);
                    }} catch (e) {{
                        continue;
                    }}
                    for (const el of nodes) {{
                        if (seen.has(el)) continue;
                        seen.add(el);
                        const labels = [(el.innerText || '').trim(), el.getAttribute('aria-label') || ''];
                        if (!labels.some(l => l && patterns.some(p => p.test(l)))) continue;
                        el.click();
                        clicked++;
                        if ({first_only}) return clicked;
                    }}
                }}
                return clicked;
            }})()
            "#
        ))
    }
}

async fn new_blank_page(browser: &Browser) -> Result<Page> {
    browser
        .new_page("about:blank")
        .await
        .map_err(|e| ScrapeError::Browser(format!("Failed to create page: {}", e)))
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()> {
        let load = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| ScrapeError::Browser(format!("Navigation failed: {}", e)))?;

            if let WaitCondition::Element(ref selector) = wait {
                while self.page.find_element(selector.as_str()).await.is_err() {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
            }
            Ok::<(), ScrapeError>(())
        };

        match tokio::time::timeout(timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    async fn current_document(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to read document: {}", e)))
    }

    async fn scroll_to_bottom(&self) -> Result<u64> {
        let height: f64 = self
            .page
            .evaluate(SCROLL_SCRIPT)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Script execution failed: {}", e)))?
            .into_value()
            .map_err(|e| ScrapeError::Browser(format!("Failed to parse result: {:?}", e)))?;
        Ok(height.max(0.0) as u64)
    }

    async fn click(&self, target: &ClickTarget) -> Result<usize> {
        let script = Self::click_script(target)?;
        let clicked: f64 = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Script execution failed: {}", e)))?
            .into_value()
            .map_err(|e| ScrapeError::Browser(format!("Failed to parse result: {:?}", e)))?;
        Ok(clicked.max(0.0) as usize)
    }

    async fn open_new_document(&self) -> Result<Box<dyn PageDriver>> {
        let page = new_blank_page(&self.browser).await?;
        Ok(Box::new(ChromeDriver {
            browser: self.browser.clone(),
            page,
        }))
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to close page: {}", e)))
    }
}
