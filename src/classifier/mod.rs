//! Post URL classification.
//!
//! Turns a raw post URL into a [`PostIdentity`] and answers the related
//! questions the pipeline asks about links: is this a post URL at all, is
//! this link a commenter's profile, and does this link point at the target post.
//!
//! Classification priority is group > page > profile. A URL under `/groups/`
//! is always a group post even when it also has the `/{slug}/posts/{id}` shape.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::app::{Result, ScrapeError};
use crate::domain::{PostIdentity, PostKind};

/// Hosts accepted as the social-media site, in any letter case.
const SITE_HOSTS: &[&str] = &[
    "facebook.com",
    "www.facebook.com",
    "m.facebook.com",
    "mobile.facebook.com",
    "mbasic.facebook.com",
    "web.facebook.com",
    "touch.facebook.com",
    "fb.com",
    "www.fb.com",
];

/// Host every accepted URL is rewritten to.
pub const CANONICAL_HOST: &str = "facebook.com";

/// First path segments that never name a person or page.
const NON_PROFILE_SEGMENTS: &[&str] = &[
    "groups",
    "hashtag",
    "photo.php",
    "photo",
    "photos",
    "watch",
    "events",
    "stories",
    "sharer",
    "sharer.php",
    "l.php",
    "permalink.php",
    "story.php",
    "login",
    "help",
    "policies",
    "reel",
    "search",
];

/// Post id patterns, tried in order against the path.
static PATH_POST_ID: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"/groups/[^/]+/(?:posts|permalink)/(\d+|pfbid[0-9A-Za-z]+)",
        r"/posts/(\d+|pfbid[0-9A-Za-z]+)",
        r"/permalink/(\d+)",
        r"/activity/(\d+)",
        r"/videos/(?:[^/]+/)?(\d+)",
        r"/photos/(?:[^/]+/)?(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("valid regex"))
    .collect()
});

/// Query parameters that carry a post id, in priority order.
const QUERY_POST_ID_KEYS: &[&str] = &["story_fbid", "fbid", "multi_permalinks"];

static FRAGMENT_STORY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)story_fbid=(\d+|pfbid[0-9A-Za-z]+)").expect("valid regex"));

static GROUP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/groups/([^/?#]+)").expect("valid regex"));

static PAGE_POST_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/([^/]+)/(?:posts|videos|photos)/").expect("valid regex")
});

static GROUP_MEMBER_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/groups/[^/]+/user/(\d+)").expect("valid regex")
});

/// Classify a post URL.
///
/// Fails with [`ScrapeError::InvalidUrlKind`] when the URL cannot be parsed or
/// its host is not the social-media site. A well-formed site URL that matches no
/// post pattern still classifies, with an empty `post_id`.
pub fn classify(raw_url: &str) -> Result<PostIdentity> {
    let url = normalize(raw_url).ok_or_else(|| ScrapeError::InvalidUrlKind(raw_url.to_string()))?;

    let path = url.path();
    let post_id = extract_post_id(&url).unwrap_or_default();

    let (kind, group_id, author_id) = if is_group_path(path) {
        let group_id = GROUP_ID
            .captures(path)
            .map(|c| c[1].to_string())
            .filter(|g| !g.is_empty());
        (PostKind::Group, group_id, None)
    } else if let Some(caps) = PAGE_POST_SHAPE.captures(path) {
        (PostKind::Page, None, Some(caps[1].to_string()))
    } else {
        (PostKind::Profile, None, query_param(&url, "id"))
    };

    if post_id.is_empty() {
        tracing::debug!("No post id pattern matched {}", url);
    }

    Ok(PostIdentity {
        post_id,
        group_id,
        author_id,
        kind,
        canonical_url: url.to_string(),
    })
}

/// Whether `url` is a site URL carrying any post marker. Never fails.
pub fn is_valid_post_url(url: &str) -> bool {
    let Some(url) = normalize(url) else {
        return false;
    };

    let path = url.path().to_lowercase();
    let query = url.query().unwrap_or("").to_lowercase();
    let fragment = url.fragment().unwrap_or("").to_lowercase();

    ["/posts/", "/permalink/", "/groups/", "/videos/", "/photos/", "/activity/"]
        .iter()
        .any(|m| path.contains(m))
        || path.ends_with("/permalink.php")
        || path.ends_with("/story.php")
        || query.contains("story_fbid")
        || query.contains("fbid=")
        || fragment.contains("story_fbid")
}

/// Whether `host` is one of the site's hosts.
pub fn is_site_host(host: &str) -> bool {
    SITE_HOSTS.iter().any(|h| h.eq_ignore_ascii_case(host))
}

/// Parse, check the host and rewrite to `https://facebook.com/...`.
///
/// A missing scheme is treated as https.
pub fn normalize(raw_url: &str) -> Option<Url> {
    let raw = raw_url.trim();
    if raw.is_empty() {
        return None;
    }

    let mut url = if raw.contains("://") {
        Url::parse(raw).ok()?
    } else {
        Url::parse(&format!("https://{raw}")).ok()?
    };

    if !matches!(url.scheme(), "http" | "https") || !is_site_host(url.host_str()?) {
        return None;
    }

    url.set_scheme("https").ok()?;
    url.set_host(Some(CANONICAL_HOST)).ok()?;
    url.set_port(None).ok()?;
    Some(url)
}

/// Turn an author link found in markup into the canonical profile URL to visit.
///
/// Relative links resolve against `base`. Tracking parameters are dropped; only
/// `id` survives, and only on `profile.php`. Group-scoped member links become
/// `profile.php?id=`. Returns `None` for links that are not a person or page.
pub fn normalize_profile_url(href: &str, base: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let joined = match Url::parse(href) {
        Ok(u) => u,
        Err(_) => Url::parse(base).ok()?.join(href).ok()?,
    };
    let mut url = normalize(joined.as_str())?;

    if let Some(caps) = GROUP_MEMBER_PATH.captures(url.path()) {
        return Some(format!("https://{CANONICAL_HOST}/profile.php?id={}", &caps[1]));
    }

    let first = url.path_segments()?.find(|s| !s.is_empty())?.to_string();

    if first.eq_ignore_ascii_case("profile.php") {
        let id = query_param(&url, "id")?;
        return Some(format!("https://{CANONICAL_HOST}/profile.php?id={id}"));
    }

    if NON_PROFILE_SEGMENTS.iter().any(|s| s.eq_ignore_ascii_case(&first)) {
        return None;
    }

    url.set_query(None);
    url.set_fragment(None);
    url.set_path(&format!("/{first}"));
    Some(url.to_string())
}

/// Profile identifier of a canonical profile URL: the `id` of `profile.php`, else the slug.
pub fn profile_id(profile_url: &str) -> Option<String> {
    let url = normalize(profile_url)?;
    let first = url.path_segments()?.find(|s| !s.is_empty())?.to_string();
    if first.eq_ignore_ascii_case("profile.php") {
        query_param(&url, "id")
    } else {
        Some(first)
    }
}

/// Whether a link found on some page points at the post `target`.
///
/// Accepts absolute or site-relative links, unwraps the outbound `l.php?u=` shim,
/// and matches the post id as a whole path segment, as a post-id query value,
/// or inside the fragment.
pub fn references_post(href: &str, target: &PostIdentity) -> bool {
    if !target.is_resolved() {
        return false;
    }

    let href = href.trim();
    let url = match Url::parse(href) {
        Ok(u) => u,
        Err(_) => match Url::parse(&format!("https://{CANONICAL_HOST}")).and_then(|b| b.join(href)) {
            Ok(u) => u,
            Err(_) => return false,
        },
    };

    if url.path().ends_with("/l.php") {
        if let Some(inner) = url.query_pairs().find(|(k, _)| k == "u").map(|(_, v)| v.into_owned()) {
            return references_post(&inner, target);
        }
    }

    let Some(host) = url.host_str() else {
        return false;
    };
    if !is_site_host(host) {
        return false;
    }

    let id = target.post_id.as_str();
    if url.path_segments().is_some_and(|mut segs| segs.any(|s| s == id)) {
        return true;
    }
    if url
        .query_pairs()
        .any(|(k, v)| QUERY_POST_ID_KEYS.contains(&k.as_ref()) && v == id)
    {
        return true;
    }
    url.fragment()
        .and_then(|f| FRAGMENT_STORY_ID.captures(f))
        .is_some_and(|c| &c[1] == id)
}

fn extract_post_id(url: &Url) -> Option<String> {
    let path = url.path();
    for pattern in PATH_POST_ID.iter() {
        if let Some(caps) = pattern.captures(path) {
            return Some(caps[1].to_string());
        }
    }

    for key in QUERY_POST_ID_KEYS {
        if let Some(value) = query_param(url, key) {
            return Some(value);
        }
    }

    url.fragment()
        .and_then(|f| FRAGMENT_STORY_ID.captures(f))
        .map(|c| c[1].to_string())
}

fn is_group_path(path: &str) -> bool {
    path.to_lowercase().contains("/groups/")
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
