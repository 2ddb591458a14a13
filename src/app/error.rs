use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Not a recognized social-media post URL: {0}")]
    InvalidUrlKind(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Navigation to {url} timed out after {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scrape cancelled")]
    Cancelled,
}

impl ScrapeError {
    /// Whether a single retry of the same driver step is worthwhile.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScrapeError::NavigationTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
