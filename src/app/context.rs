use std::sync::Arc;

use crate::app::error::{Result, ScrapeError};
use crate::app::CancelFlag;
use crate::config::Config;
use crate::normalizer::TimeNormalizer;
use crate::scrape::{ChromeDriver, CommentScraper, PageDriver};

pub struct AppContext {
    pub config: Config,
    pub scraper: CommentScraper,
    pub cancel: CancelFlag,
}

impl AppContext {
    /// Launch a browser according to `config` and wire the pipeline to it.
    pub async fn launch(config: Config) -> Result<Self> {
        let driver = ChromeDriver::launch(&config.browser, config.scraping.headless).await?;
        Ok(Self::with_driver(config, Arc::new(driver)))
    }

    /// Wire the pipeline to an already open page driver.
    pub fn with_driver(config: Config, driver: Arc<dyn PageDriver>) -> Self {
        let normalizer = TimeNormalizer::with_locales(&config.locales);
        let scraper = CommentScraper::with_normalizer(
            driver,
            config.selectors.clone(),
            config.verifier.clone(),
            normalizer,
        );

        Self {
            config,
            scraper,
            cancel: CancelFlag::new(),
        }
    }

    /// Override the number of concurrent profile visits.
    pub fn with_verify_workers(mut self, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ScrapeError::Config("verify workers must be at least 1".into()));
        }
        self.config.verifier.max_concurrency = workers;
        self.scraper.set_verifier_config(self.config.verifier.clone());
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::mock::MockBrowser;

    #[test]
    fn test_verify_workers_override() {
        let ctx = AppContext::with_driver(Config::default(), Arc::new(MockBrowser::new()));
        let ctx = ctx.with_verify_workers(6).unwrap();
        assert_eq!(ctx.config.verifier.max_concurrency, 6);
        assert_eq!(ctx.scraper.verifier_config().max_concurrency, 6);
    }

    #[test]
    fn test_zero_verify_workers_rejected() {
        let ctx = AppContext::with_driver(Config::default(), Arc::new(MockBrowser::new()));
        assert!(matches!(ctx.with_verify_workers(0), Err(ScrapeError::Config(_))));
    }
}
