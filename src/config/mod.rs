//! Configuration management for commentscope.
//!
//! Configuration is read from `~/.config/commentscope/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use crate::normalizer::Locale;
use crate::scrape::{BrowserConfig, ScrapingOptions, SelectorConfig, VerifierConfig};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scraping: ScrapingOptions,
    pub browser: BrowserConfig,
    pub verifier: VerifierConfig,
    pub selectors: SelectorConfig,
    /// Languages recognized in timestamp text
    pub locales: Vec<Locale>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scraping: ScrapingOptions::default(),
            browser: BrowserConfig::default(),
            verifier: VerifierConfig::default(),
            selectors: SelectorConfig::default(),
            locales: Locale::ALL.to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/commentscope/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("commentscope").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        tracing::info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Generate the default config file content with comments.
    ///
    /// Selector chains are left out; their built-in defaults apply unless a
    /// `[selectors]` table overrides them.
    fn default_config_content() -> String {
        r##"# commentscope configuration
#
# Durations are integers: *_secs in seconds, *_ms in milliseconds.

# Languages recognized in comment timestamps ("en", "vi")
locales = ["en", "vi"]

[scraping]
# Stop after this many unique comments
max_comments = 1000

# Wait after each scroll for new comments to render (milliseconds)
scroll_delay_ms = 2000

# Give up after this many consecutive cycles without a new comment
max_scroll_attempts = 50

# Expand "View N replies" links while paginating
load_replies = false

# Parse per-comment reaction breakdowns
load_reactions = false

# oldest_first, newest_first or most_relevant
sort_order = "oldest_first"

# Page load timeout in seconds
timeout_secs = 60

# Run browser in headless mode (no visible window)
headless = true

# Same author and text within this many seconds counts as one comment
dedup_window_secs = 60

[browser]
# user_agent = "Mozilla/5.0 ..."
window_width = 1920
window_height = 1080
accept_language = "en-US,en;q=0.9,vi;q=0.8"

# Extra Chrome command-line switches
extra_args = []

[verifier]
# Profile timelines visited at the same time
max_concurrency = 2

# Timeline posts inspected per profile
max_posts_scanned = 20

# Profile page load timeout in seconds
navigation_timeout_secs = 45

# Wait after loading or scrolling a profile (milliseconds)
settle_delay_ms = 3000

# Scrolls per profile before looking for the share
scroll_passes = 2

# [selectors]
# Every chain is an ordered list of CSS selectors; the first that matches wins.
# comment_container = ["[aria-label^=\"Comment by\"]", "div[role=\"article\"]"]
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
