use serde::Serialize;
use serde_json::json;

use crate::app::{AppContext, Result};
use crate::classifier;
use crate::scrape::{filter, CommentFilters, ScrapingOptions};

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn scrape(
    ctx: &AppContext,
    url: &str,
    options: &ScrapingOptions,
    verify: bool,
    filters: &CommentFilters,
) -> Result<()> {
    let session = ctx.scraper.scrape_post(url, options, verify, &ctx.cancel).await?;

    if let Some(report) = &session.verification {
        eprintln!(
            "{} of {} comments are by authors who shared the post",
            session.sharers().count(),
            session.total_found
        );
        if !report.failures.is_empty() {
            eprintln!(
                "Share verification incomplete: {} of {} profile visits failed",
                report.failures.len(),
                report.authors_checked
            );
        }
    }
    if ctx.cancel.is_cancelled() {
        eprintln!("Interrupted: {} comments collected before stopping", session.total_found);
    }

    if filters.is_empty() {
        return print_json(&session);
    }

    let summary = filter::analyze(&session.comments, filters);
    eprintln!(
        "{} of {} comments match the filters",
        summary.total_after_filter, summary.total_scraped
    );
    print_json(&json!({
        "session": session,
        "filtered": summary,
    }))
}

/// Classification only; never opens a browser.
pub fn validate(url: &str) -> Result<()> {
    let valid = classifier::is_valid_post_url(url);
    let output = match classifier::classify(url) {
        Ok(identity) => json!({
            "url": url,
            "valid": valid,
            "identity": identity,
        }),
        Err(e) => json!({
            "url": url,
            "valid": false,
            "error": e.to_string(),
        }),
    };
    print_json(&output)
}

pub async fn post_info(ctx: &AppContext, url: &str) -> Result<()> {
    let post = ctx.scraper.post_info(url, &ctx.config.scraping).await?;
    print_json(&post)
}

pub async fn check_share(ctx: &AppContext, post_url: &str, profile_url: &str) -> Result<()> {
    let has_shared = ctx.scraper.verify_share(post_url, profile_url).await?;
    print_json(&json!({ "has_shared": has_shared }))
}
