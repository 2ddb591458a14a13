use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Order of the comment list in a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending by creation time; unknown times first
    #[default]
    OldestFirst,
    /// Descending by creation time; unknown times last
    NewestFirst,
    /// Extraction order, as the site ranked them
    MostRelevant,
}

/// Options for one scrape request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingOptions {
    /// Stop once this many unique comments are collected (default: 1000)
    pub max_comments: usize,

    /// Wait after each scroll for new content in milliseconds (default: 2000)
    pub scroll_delay_ms: u64,

    /// Consecutive cycles without a new comment before giving up (default: 50)
    pub max_scroll_attempts: u32,

    /// Expand reply threads while paginating (default: false)
    pub load_replies: bool,

    /// Parse per-comment reaction breakdowns (default: false)
    pub load_reactions: bool,

    pub sort_order: SortOrder,

    /// Per-navigation timeout in seconds (default: 60)
    pub timeout_secs: u64,

    /// Run the browser without a window (default: true)
    pub headless: bool,

    /// Two same-author, same-text comments this close in time are one comment (default: 60)
    pub dedup_window_secs: u64,
}

impl Default for ScrapingOptions {
    fn default() -> Self {
        Self {
            max_comments: 1000,
            scroll_delay_ms: 2000,
            max_scroll_attempts: 50,
            load_replies: false,
            load_reactions: false,
            sort_order: SortOrder::OldestFirst,
            timeout_secs: 60,
            headless: true,
            dedup_window_secs: 60,
        }
    }
}

impl ScrapingOptions {
    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn dedup_window(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::try_seconds(self.dedup_window_secs as i64).unwrap_or(chrono::TimeDelta::MAX)
    }

    /// A short pass over the first screenfuls of comments
    pub fn quick() -> Self {
        Self {
            max_comments: 200,
            scroll_delay_ms: 1000,
            max_scroll_attempts: 5,
            timeout_secs: 30,
            ..Default::default()
        }
    }

    /// Everything the page will give, replies and reactions included
    pub fn exhaustive() -> Self {
        Self {
            max_comments: 10_000,
            scroll_delay_ms: 3000,
            max_scroll_attempts: 100,
            load_replies: true,
            load_reactions: true,
            timeout_secs: 90,
            ..Default::default()
        }
    }
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// User agent string to use
    pub user_agent: Option<String>,

    pub window_width: u32,
    pub window_height: u32,

    /// Accept-Language sent with every request (default: "en-US,en;q=0.9,vi;q=0.8")
    pub accept_language: String,

    /// Extra command-line switches for the browser process
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            window_width: 1920,
            window_height: 1080,
            accept_language: "en-US,en;q=0.9,vi;q=0.8".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Share verification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Profile pages open at once. Higher is faster and more likely to be blocked (default: 2)
    pub max_concurrency: usize,

    /// Timeline posts inspected per profile (default: 20)
    pub max_posts_scanned: usize,

    /// Profile navigation timeout in seconds (default: 45)
    pub navigation_timeout_secs: u64,

    /// Wait after a profile loads for its feed to render, in milliseconds (default: 3000)
    pub settle_delay_ms: u64,

    /// Scrolls on each profile to bring more posts into view (default: 2)
    pub scroll_passes: u32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            max_posts_scanned: 20,
            navigation_timeout_secs: 45,
            settle_delay_ms: 3000,
            scroll_passes: 2,
        }
    }
}

impl VerifierConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Elements to activate in the browser: candidates matching any selector whose
/// text or aria-label matches any pattern (case-insensitive regular expressions).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickTarget {
    pub selectors: Vec<String>,
    pub patterns: Vec<String>,
    /// Activate only the first matching element
    #[serde(default)]
    pub first_only: bool,
}

impl ClickTarget {
    fn buttons(patterns: &[&str]) -> Self {
        Self {
            selectors: strings(&[
                "div[role=\"button\"]",
                "span[role=\"button\"]",
                "a[role=\"button\"]",
                "[role=\"menuitem\"]",
                "[role=\"menuitemradio\"]",
            ]),
            patterns: strings(patterns),
            first_only: false,
        }
    }

    fn first_only(mut self) -> Self {
        self.first_only = true;
        self
    }
}

/// Ordered selector-fallback chains, one per extracted field.
///
/// Every chain is tried front to back; the first selector yielding a usable
/// value wins. Reorder or extend these in the config file when markup drifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    // Comments
    pub comment_container: Vec<String>,
    pub comment_author: Vec<String>,
    pub comment_content: Vec<String>,
    pub comment_time: Vec<String>,
    /// Attributes read off a time element before its text, in order
    pub time_attributes: Vec<String>,
    pub comment_likes: Vec<String>,
    pub comment_replies: Vec<String>,
    pub comment_reactions: Vec<String>,
    pub comment_badge: Vec<String>,
    /// Container attributes holding a site comment id, in order
    pub comment_id_attributes: Vec<String>,

    // Post
    pub post_container: Vec<String>,
    pub post_content: Vec<String>,
    pub post_author: Vec<String>,
    pub post_time: Vec<String>,
    pub post_reactions: Vec<String>,
    pub post_comment_count: Vec<String>,
    pub post_share_count: Vec<String>,
    pub group_name: Vec<String>,
    pub post_images: Vec<String>,
    /// Navigation to a post also waits for this element when set
    pub post_ready: Option<String>,

    // Profile timelines
    pub timeline_post: Vec<String>,
    /// Link-bearing attributes checked for a reference to the target post
    pub link_attributes: Vec<String>,
    pub share_audience: Vec<String>,

    // Browser-side affordances
    pub load_more: ClickTarget,
    pub load_replies: ClickTarget,
    pub sort_menu: ClickTarget,
    pub sort_oldest: ClickTarget,
    pub sort_newest: ClickTarget,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            comment_container: strings(&[
                "[aria-label^=\"Comment by\"], [aria-label^=\"Reply by\"]",
                "[aria-label^=\"Bình luận của\"], [aria-label^=\"Phản hồi của\"]",
                "div[role=\"article\"][aria-label*=\"Comment\"]",
                "div[data-testid=\"UFI2Comment/root\"]",
                "[data-testid=\"comment\"]",
                ".UFIComment",
                "div[aria-label][role=\"article\"]",
            ]),
            comment_author: strings(&[
                "[data-testid=\"UFI2Comment/actor\"] a",
                "a.UFICommentActorName",
                ".comment_actor a",
                "a[role=\"link\"][href]",
                "h3 a[href]",
                "a[href]",
            ]),
            comment_content: strings(&[
                "[data-testid=\"comment_message\"]",
                "[data-testid=\"UFI2Comment/body\"]",
                ".UFICommentBody",
                "div[dir=\"auto\"][style*=\"text-align\"]",
                "div[dir=\"auto\"]",
                "span[dir=\"auto\"]",
            ]),
            comment_time: strings(&[
                "abbr[data-utime]",
                "a[href*=\"comment_id\"][aria-label]",
                "a[role=\"link\"][aria-label*=\"ago\"]",
                "[data-testid=\"UFI2Comment/timestamp\"]",
                ".UFICommentTimestamp",
                "a[href*=\"comment_id\"]",
                "abbr",
            ]),
            time_attributes: strings(&["data-utime", "title", "aria-label"]),
            comment_likes: strings(&[
                "[aria-label*=\"reactions\"]",
                "[aria-label*=\"reaction\"]",
                "[aria-label*=\"likes\"]",
                "[aria-label*=\"cảm xúc\"]",
                ".UFICommentReactionsCount",
            ]),
            comment_replies: strings(&[
                "[aria-label*=\"repl\"]",
                "[aria-label*=\"phản hồi\"]",
                "div[role=\"button\"]",
                "span[role=\"button\"]",
            ]),
            comment_reactions: strings(&[
                "[aria-label*=\"reacted with\"]",
                "[aria-label*=\"reaction\"] [aria-label]",
                "[data-testid=\"UFI2TopReactions/tooltip\"] [aria-label]",
            ]),
            comment_badge: strings(&[
                "a[href*=\"badge_type\"]",
                "[data-testid=\"group_badge\"]",
            ]),
            comment_id_attributes: strings(&["data-commentid", "data-comment-id", "data-cid"]),

            post_container: strings(&[
                "div[role=\"main\"] div[role=\"article\"]",
                "div[role=\"article\"]",
                "[data-pagelet^=\"FeedUnit\"]",
                "#contentArea",
            ]),
            post_content: strings(&[
                "[data-ad-preview=\"message\"]",
                "[data-ad-comet-preview=\"message\"]",
                "[data-testid=\"post_message\"]",
                ".userContent",
            ]),
            post_author: strings(&["h2 a[href]", "h3 a[href]", "strong a[href]", "a[role=\"link\"] strong"]),
            post_time: strings(&[
                "abbr[data-utime]",
                "[data-testid=\"story-subtitle\"] a",
                "a[href*=\"/posts/\"][aria-label]",
                "a[href*=\"story_fbid\"]",
                "a[href*=\"/posts/\"]",
            ]),
            post_reactions: strings(&[
                "[aria-label*=\"reactions\"]",
                "[aria-label*=\"cảm xúc\"]",
                "span[aria-label*=\"Like\"]",
            ]),
            post_comment_count: strings(&["[aria-label*=\"comments\"]", "[aria-label*=\"bình luận\"]"]),
            post_share_count: strings(&["[aria-label*=\"shares\"]", "[aria-label*=\"lượt chia sẻ\"]"]),
            group_name: strings(&["h1 a[href*=\"/groups/\"]", "a[href*=\"/groups/\"] span", "a[href*=\"/groups/\"]"]),
            post_images: strings(&[
                "img[data-visualcompletion=\"media-vc-image\"]",
                "a[href*=\"/photos/\"] img",
                "img[src*=\"scontent\"]",
            ]),
            post_ready: None,

            timeline_post: strings(&[
                "div[data-pagelet^=\"TimelineFeedUnit\"]",
                "div[role=\"article\"]",
                "[data-testid=\"post_message\"]",
                ".userContentWrapper",
            ]),
            link_attributes: strings(&["href", "data-href", "data-lynx-uri"]),
            share_audience: strings(&[
                "[aria-label^=\"Shared with\"]",
                "[aria-label^=\"Đã chia sẻ với\"]",
            ]),

            load_more: ClickTarget::buttons(&[
                r"^view (more|previous) comments",
                r"more comments$",
                r"^xem thêm bình luận",
                r"^xem các bình luận trước",
            ]),
            load_replies: ClickTarget::buttons(&[
                r"^view (all )?\d* ?(previous )?repl(y|ies)",
                r"^\d+ repl(y|ies)$",
                r"^xem (tất cả )?\d* ?phản hồi",
            ]),
            sort_menu: ClickTarget::buttons(&[
                r"^most relevant$",
                r"^newest$",
                r"^all comments$",
                r"^phù hợp nhất$",
                r"^mới nhất$",
                r"^tất cả bình luận$",
                r"sort",
            ])
            .first_only(),
            sort_oldest: ClickTarget::buttons(&[r"^oldest", r"^cũ nhất"])
                .first_only(),
            sort_newest: ClickTarget::buttons(&[r"^newest", r"^mới nhất"]).first_only(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
