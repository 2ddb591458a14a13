//! # commentscope
//!
//! Scrapes every comment of a social-media post through a headless browser
//! and checks which commenters republished the post on their own timeline.
//!
//! ## Architecture
//!
//! ```text
//! URL → Classifier → Pagination (Extractor + TimeNormalizer → Deduplicator)
//!     → ShareVerifier → Filters
//! ```
//!
//! - [`classifier`]: Post URL recognition and canonicalization
//! - [`normalizer`]: Relative and localized timestamp text to UTC instants
//! - [`scrape`]: Browser driving, extraction, pagination, dedup and share verification
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a URL without launching a browser
//! commentscope validate https://www.facebook.com/groups/rust/posts/123
//!
//! # Scrape, verify shares and keep popular comments
//! commentscope scrape https://www.facebook.com/rustlang/posts/123 --min-likes 5
//!
//! # Did one person share the post?
//! commentscope check-share https://www.facebook.com/rustlang/posts/123 https://www.facebook.com/someone
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Application context, cancellation and error types
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: TOML configuration
//! - [`domain`]: Core domain models (PostIdentity, CommentRecord, ScrapeSession)

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires the configuration and a
/// browser session into a [`CommentScraper`](scrape::CommentScraper).
pub mod app;

/// Post URL classification.
///
/// Recognizes profile, page and group posts and rewrites every accepted URL
/// to one canonical host.
pub mod classifier;

/// Command-line interface using clap.
///
/// - `scrape <url>` - Full pipeline, JSON output
/// - `validate <url>` - Classification only
/// - `post-info <url>` - Post metadata
/// - `check-share <post-url> <profile-url>` - Single share check
pub mod cli;

/// Configuration loaded from `~/.config/commentscope/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`PostIdentity`](domain::PostIdentity): Classified post URL
/// - [`CommentRecord`](domain::CommentRecord): One comment with fingerprint and share status
/// - [`ScrapeSession`](domain::ScrapeSession): Result of one scrape request
pub mod domain;

/// Timestamp text normalization (English and Vietnamese).
pub mod normalizer;

/// Browser-driven scraping.
///
/// - [`PageDriver`](scrape::PageDriver): Async trait over one browser document
/// - [`ChromeDriver`](scrape::ChromeDriver): chromiumoxide implementation
/// - [`CommentScraper`](scrape::CommentScraper): The scrape pipeline
/// - [`ShareVerifier`](scrape::ShareVerifier): Concurrent profile checks with a semaphore
pub mod scrape;
