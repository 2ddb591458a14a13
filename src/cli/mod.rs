pub mod commands;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::scrape::{CommentFilters, ScrapingOptions, SortOrder};

#[derive(Parser)]
#[command(name = "commentscope")]
#[command(about = "Scrape post comments and check which commenters shared the post", long_about = None)]
pub struct Cli {
    /// Number of profile timelines checked at the same time
    #[arg(long, global = true)]
    pub verify_workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape all comments of a post and print them as JSON
    Scrape {
        /// URL of the post
        url: String,

        #[command(flatten)]
        args: ScrapeArgs,
    },
    /// Classify a URL without opening a browser
    Validate {
        /// URL to classify
        url: String,
    },
    /// Print post metadata as JSON
    PostInfo {
        /// URL of the post
        url: String,
    },
    /// Check whether one profile shared a post
    CheckShare {
        /// URL of the post
        post_url: String,
        /// URL of the profile to inspect
        profile_url: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Oldest,
    Newest,
    Relevant,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Oldest => SortOrder::OldestFirst,
            SortArg::Newest => SortOrder::NewestFirst,
            SortArg::Relevant => SortOrder::MostRelevant,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ScrapeArgs {
    /// Stop after this many unique comments
    #[arg(long)]
    pub max_comments: Option<usize>,

    /// Comment ordering
    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,

    /// Consecutive cycles without new comments before giving up
    #[arg(long)]
    pub max_scroll_attempts: Option<u32>,

    /// Wait after each scroll, in milliseconds
    #[arg(long)]
    pub scroll_delay_ms: Option<u64>,

    /// Expand reply threads
    #[arg(long)]
    pub load_replies: bool,

    /// Parse per-comment reaction breakdowns
    #[arg(long)]
    pub load_reactions: bool,

    /// Skip share verification
    #[arg(long)]
    pub no_verify: bool,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Keep comments at or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    pub since: Option<DateTime<Utc>>,

    /// Keep comments at or before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    pub until: Option<DateTime<Utc>>,

    /// Keep comments with at least this many likes
    #[arg(long)]
    pub min_likes: Option<u64>,

    /// Keep only comments whose author shared the post
    #[arg(long)]
    pub only_sharers: bool,

    /// Keep only comments by group members
    #[arg(long)]
    pub only_group_members: bool,

    /// Comma-separated words; keep comments containing any of them
    #[arg(long)]
    pub keywords: Option<String>,

    /// Comma-separated names; keep comments by matching authors
    #[arg(long)]
    pub authors: Option<String>,
}

impl ScrapeArgs {
    /// Overlay the command-line flags on configured options.
    pub fn apply(&self, options: &mut ScrapingOptions) {
        if let Some(max) = self.max_comments {
            options.max_comments = max;
        }
        if let Some(sort) = self.sort {
            options.sort_order = sort.into();
        }
        if let Some(attempts) = self.max_scroll_attempts {
            options.max_scroll_attempts = attempts;
        }
        if let Some(delay) = self.scroll_delay_ms {
            options.scroll_delay_ms = delay;
        }
        options.load_replies |= self.load_replies;
        options.load_reactions |= self.load_reactions;
        if self.headful {
            options.headless = false;
        }
    }

    pub fn filters(&self) -> CommentFilters {
        CommentFilters {
            start_date: self.since,
            end_date: self.until,
            min_likes: self.min_likes,
            only_sharers: self.only_sharers.then_some(true),
            only_group_members: self.only_group_members.then_some(true),
            content_keywords: self.keywords.clone(),
            author_names: self.authors.clone(),
        }
    }
}

/// Accepts `YYYY-MM-DD` (start of day, UTC) or an RFC 3339 timestamp.
fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|_| format!("Invalid date: {} (expected YYYY-MM-DD or RFC 3339)", s))
}
