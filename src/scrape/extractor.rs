use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::classifier;
use crate::domain::{CommentRecord, PostIdentity, PostSnapshot, Reaction, ShareStatus};
use crate::normalizer::TimeNormalizer;
use crate::scrape::config::SelectorConfig;
use crate::scrape::counts::parse_count;

/// Per-element extraction problems. Logged and skipped, never returned to callers.
#[derive(Debug, Error)]
enum ExtractionNoise {
    #[error("element has neither author nor content")]
    Empty,

    #[error("unresolvable comment link {href}")]
    BadLink { href: String },
}

const REPLY_WORDS: &[&str] = &["repl", "phản hồi", "trả lời"];

/// Reaction names as they appear in labels, longest first so "yêu thích" wins over "thích".
const REACTION_WORDS: &[(&str, &str)] = &[
    ("thương thương", "care"),
    ("yêu thích", "love"),
    ("phẫn nộ", "angry"),
    ("thích", "like"),
    ("buồn", "sad"),
    ("like", "like"),
    ("love", "love"),
    ("care", "care"),
    ("haha", "haha"),
    ("wow", "wow"),
    ("sad", "sad"),
    ("angry", "angry"),
];

const AUDIENCE_PREFIXES: &[&str] = &["shared with ", "đã chia sẻ với "];

static COMMENT_COUNT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\d.,\s]+[kmb]?\s*(comments?|bình luận)$").expect("valid regex")
});

static SHARE_COUNT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\d.,\s]+[kmb]?\s*(shares?|lượt chia sẻ)$").expect("valid regex")
});

static COUNT_CANDIDATES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span, a, div[role=\"button\"]").expect("valid selector"));

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// One field's ordered fallback chain, compiled.
#[derive(Debug, Clone)]
struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    fn compile(field: &str, sources: &[String]) -> Self {
        let selectors = sources
            .iter()
            .filter_map(|s| match Selector::parse(s) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    tracing::warn!("Skipping invalid {} selector {:?}: {:?}", field, s, e);
                    None
                }
            })
            .collect();
        Self { selectors }
    }

    /// First non-empty text among matches of the first selector that has one.
    fn first_text<'a>(&self, scope: &Scope<'a>) -> Option<(String, ElementRef<'a>)> {
        self.selectors.iter().find_map(|sel| {
            scope
                .select(sel)
                .map(|el| (element_text(el), el))
                .find(|(text, _)| !text.is_empty())
        })
    }
}

/// Where field lookups are allowed to look: below `root`, but not inside a
/// nested element matched by `boundary` (a reply inside its parent comment).
struct Scope<'a> {
    root: ElementRef<'a>,
    boundary: Option<&'a Selector>,
}

impl<'a> Scope<'a> {
    fn new(root: ElementRef<'a>, boundary: Option<&'a Selector>) -> Self {
        Self { root, boundary }
    }

    fn select<'s>(&'s self, sel: &'s Selector) -> impl Iterator<Item = ElementRef<'a>> + 's {
        self.root.select(sel).filter(move |el| self.owns(*el))
    }

    fn owns(&self, el: ElementRef<'a>) -> bool {
        let Some(boundary) = self.boundary else {
            return true;
        };
        for ancestor in el.ancestors() {
            if ancestor.id() == self.root.id() {
                return true;
            }
            if let Some(ancestor) = ElementRef::wrap(ancestor) {
                if boundary.matches(&ancestor) {
                    return false;
                }
            }
        }
        true
    }

    /// Whether `el` sits inside a link, stopping at the scope root.
    fn inside_link(&self, el: ElementRef<'a>) -> bool {
        el.ancestors()
            .take_while(|a| a.id() != self.root.id())
            .filter_map(ElementRef::wrap)
            .any(|a| a.value().name() == "a")
    }

    /// `href` of the element itself, or of its closest enclosing link.
    fn link_of(&self, el: ElementRef<'a>) -> Option<String> {
        if let Some(href) = el.value().attr("href") {
            return Some(href.to_string());
        }
        el.ancestors()
            .take_while(|a| a.id() != self.root.id())
            .filter_map(ElementRef::wrap)
            .find_map(|a| a.value().attr("href"))
            .map(str::to_string)
    }
}

/// Pulls comment, post and share records out of document snapshots.
#[derive(Debug, Clone)]
pub struct CommentExtractor {
    normalizer: TimeNormalizer,
    load_reactions: bool,
    time_attributes: Vec<String>,
    id_attributes: Vec<String>,
    link_attributes: Vec<String>,

    comment_container: Vec<Selector>,
    comment_author: SelectorChain,
    comment_content: SelectorChain,
    comment_time: SelectorChain,
    comment_likes: SelectorChain,
    comment_replies: SelectorChain,
    comment_reactions: SelectorChain,
    comment_badge: SelectorChain,

    post_container: SelectorChain,
    post_content: SelectorChain,
    post_author: SelectorChain,
    post_time: SelectorChain,
    post_reactions: SelectorChain,
    post_comment_count: SelectorChain,
    post_share_count: SelectorChain,
    group_name: SelectorChain,
    post_images: SelectorChain,

    timeline_post: Vec<Selector>,
    share_audience: SelectorChain,
}

impl CommentExtractor {
    pub fn new(config: &SelectorConfig, normalizer: TimeNormalizer) -> Self {
        let containers = SelectorChain::compile("comment_container", &config.comment_container);
        let timeline = SelectorChain::compile("timeline_post", &config.timeline_post);

        Self {
            normalizer,
            load_reactions: false,
            time_attributes: config.time_attributes.clone(),
            id_attributes: config.comment_id_attributes.clone(),
            link_attributes: config.link_attributes.clone(),

            comment_container: containers.selectors,
            comment_author: SelectorChain::compile("comment_author", &config.comment_author),
            comment_content: SelectorChain::compile("comment_content", &config.comment_content),
            comment_time: SelectorChain::compile("comment_time", &config.comment_time),
            comment_likes: SelectorChain::compile("comment_likes", &config.comment_likes),
            comment_replies: SelectorChain::compile("comment_replies", &config.comment_replies),
            comment_reactions: SelectorChain::compile("comment_reactions", &config.comment_reactions),
            comment_badge: SelectorChain::compile("comment_badge", &config.comment_badge),

            post_container: SelectorChain::compile("post_container", &config.post_container),
            post_content: SelectorChain::compile("post_content", &config.post_content),
            post_author: SelectorChain::compile("post_author", &config.post_author),
            post_time: SelectorChain::compile("post_time", &config.post_time),
            post_reactions: SelectorChain::compile("post_reactions", &config.post_reactions),
            post_comment_count: SelectorChain::compile("post_comment_count", &config.post_comment_count),
            post_share_count: SelectorChain::compile("post_share_count", &config.post_share_count),
            group_name: SelectorChain::compile("group_name", &config.group_name),
            post_images: SelectorChain::compile("post_images", &config.post_images),

            timeline_post: timeline.selectors,
            share_audience: SelectorChain::compile("share_audience", &config.share_audience),
        }
    }

    /// Also parse per-comment reaction breakdowns.
    pub fn with_reactions(mut self, enabled: bool) -> Self {
        self.load_reactions = enabled;
        self
    }

    /// Extract every comment in the document, in document order.
    ///
    /// Commits to the first container selector with at least one match. Elements
    /// with neither author nor content are dropped.
    pub fn extract_comments(&self, html: &str, post: &PostIdentity) -> Vec<CommentRecord> {
        let document = Html::parse_document(html);

        let Some((index, container)) = self
            .comment_container
            .iter()
            .enumerate()
            .find(|(_, sel)| document.select(sel).next().is_some())
        else {
            tracing::debug!("No comment container selector matched");
            return Vec::new();
        };
        tracing::debug!("Using comment container strategy #{}", index);

        let mut comments = Vec::new();
        let mut skipped = 0usize;
        for element in document.select(container) {
            let scope = Scope::new(element, Some(container));
            match self.extract_comment(&scope, post) {
                Ok(comment) => comments.push(comment),
                Err(e) => {
                    skipped += 1;
                    tracing::debug!("Skipping comment element: {}", e);
                }
            }
        }

        if skipped > 0 {
            tracing::debug!("Extracted {} comments, skipped {} elements", comments.len(), skipped);
        }
        comments
    }

    fn extract_comment(
        &self,
        scope: &Scope<'_>,
        post: &PostIdentity,
    ) -> Result<CommentRecord, ExtractionNoise> {
        let (author_name, author_link) = match self.comment_author.first_text(scope) {
            Some((name, el)) => (name, scope.link_of(el)),
            None => (String::new(), None),
        };

        let content = self
            .comment_content
            .selectors
            .iter()
            .find_map(|sel| {
                scope
                    .select(sel)
                    .filter(|el| !scope.inside_link(*el))
                    .map(element_text)
                    .find(|text| !text.is_empty() && *text != author_name)
            })
            .unwrap_or_default();

        if author_name.is_empty() && content.is_empty() {
            return Err(ExtractionNoise::Empty);
        }

        let (created_at, time_text) = self.resolve_time(&self.comment_time, scope);

        let mut comment = CommentRecord::new(author_name, content, created_at);
        comment.time_text = time_text;

        if let Some(href) = author_link {
            if let Some(profile) = classifier::normalize_profile_url(&href, &post.canonical_url) {
                comment.author_id = classifier::profile_id(&profile);
                comment.author_profile_url = profile;
            }
        }

        match self.comment_permalink(scope, &post.canonical_url) {
            Ok(Some((id, url))) => {
                comment.id = Some(id);
                comment.comment_url = Some(url);
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("Comment without permalink: {}", e),
        }
        if comment.id.is_none() {
            comment.id = self.attribute_id(scope);
        }

        comment.like_count = first_count(&self.comment_likes, scope, |_| true).unwrap_or(0);
        comment.reply_count = first_count(&self.comment_replies, scope, |label| {
            let lower = label.to_lowercase();
            REPLY_WORDS.iter().any(|w| lower.contains(w))
        })
        .unwrap_or(0);

        if self.load_reactions {
            comment.reactions = self.reactions(scope);
        }

        if post.is_group_post() {
            comment.is_group_member = true;
            comment.group_role = self.comment_badge.first_text(scope).map(|(text, _)| text);
        }

        Ok(comment)
    }

    fn attribute_id(&self, scope: &Scope<'_>) -> Option<String> {
        self.id_attributes
            .iter()
            .find_map(|attr| scope.root.value().attr(attr))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    /// Site comment id and permalink from the first link carrying `comment_id`.
    fn comment_permalink(
        &self,
        scope: &Scope<'_>,
        base: &str,
    ) -> Result<Option<(String, String)>, ExtractionNoise> {
        let Some(href) = scope
            .select(&ANCHORS)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| href.contains("comment_id="))
        else {
            return Ok(None);
        };

        let url = Url::parse(href)
            .or_else(|_| Url::parse(base).and_then(|b| b.join(href)))
            .map_err(|_| ExtractionNoise::BadLink { href: href.to_string() })?;

        let id = ["reply_comment_id", "comment_id"].iter().find_map(|key| {
            url.query_pairs()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.into_owned())
        });

        Ok(id.map(|id| (id, url.to_string())))
    }

    fn reactions(&self, scope: &Scope<'_>) -> Vec<Reaction> {
        let mut reactions: Vec<Reaction> = Vec::new();
        for sel in &self.comment_reactions.selectors {
            for el in scope.select(sel) {
                let label = label_or_text(el).to_lowercase();
                let Some(kind) = REACTION_WORDS
                    .iter()
                    .find(|(word, _)| label.contains(word))
                    .map(|(_, kind)| *kind)
                else {
                    continue;
                };
                let Some(count) = parse_count(&label) else {
                    continue;
                };

                match reactions.iter_mut().find(|r| r.kind == kind) {
                    Some(existing) => existing.count = existing.count.max(count),
                    None => reactions.push(Reaction {
                        kind: kind.to_string(),
                        count,
                    }),
                }
            }
        }
        reactions
    }

    /// First time candidate that resolves, plus the raw text it came from.
    /// When nothing resolves, the first non-empty raw text is still returned.
    fn resolve_time(
        &self,
        chain: &SelectorChain,
        scope: &Scope<'_>,
    ) -> (Option<DateTime<Utc>>, Option<String>) {
        let mut first_raw: Option<String> = None;

        for sel in &chain.selectors {
            for el in scope.select(sel) {
                let attributes = self
                    .time_attributes
                    .iter()
                    .filter_map(|attr| el.value().attr(attr))
                    .map(|v| v.trim().to_string());
                for candidate in attributes.chain(std::iter::once(element_text(el))) {
                    if candidate.is_empty() {
                        continue;
                    }
                    if let Some(t) = self.normalizer.resolve(&candidate) {
                        return (Some(t), Some(candidate));
                    }
                    first_raw.get_or_insert(candidate);
                }
            }
        }

        (None, first_raw)
    }

    /// Post-level metadata. Missing fields stay empty or zero.
    pub fn extract_post_info(&self, html: &str, identity: &PostIdentity) -> PostSnapshot {
        let document = Html::parse_document(html);
        let root = self
            .post_container
            .selectors
            .iter()
            .find_map(|sel| document.select(sel).next())
            .unwrap_or_else(|| document.root_element());
        let scope = Scope::new(root, None);

        let mut post = PostSnapshot::empty(identity.clone());

        post.content = self
            .post_content
            .first_text(&scope)
            .map(|(text, _)| text)
            .unwrap_or_default();

        if let Some((name, el)) = self.post_author.first_text(&scope) {
            post.author_name = name;
            post.author_profile_url = scope
                .link_of(el)
                .and_then(|href| classifier::normalize_profile_url(&href, &identity.canonical_url))
                .unwrap_or_default();
        }

        post.created_at = self.resolve_time(&self.post_time, &scope).0;

        post.like_count = first_count(&self.post_reactions, &scope, |_| true).unwrap_or(0);
        post.comment_count = first_count(&self.post_comment_count, &scope, |_| true)
            .or_else(|| count_matching_text(&scope, &COMMENT_COUNT_TEXT))
            .unwrap_or(0);
        post.share_count = first_count(&self.post_share_count, &scope, |_| true)
            .or_else(|| count_matching_text(&scope, &SHARE_COUNT_TEXT))
            .unwrap_or(0);

        if identity.is_group_post() {
            // The group header sits outside the post article
            let page_scope = Scope::new(document.root_element(), None);
            post.group_name = self.group_name.first_text(&page_scope).map(|(text, _)| text);
        }

        for sel in &self.post_images.selectors {
            for img in scope.select(sel) {
                let Some(src) = img.value().attr("src").or_else(|| img.value().attr("data-src")) else {
                    continue;
                };
                if src.is_empty() || src.starts_with("data:") {
                    continue;
                }
                if !post.images.iter().any(|existing| existing == src) {
                    post.images.push(src.to_string());
                }
            }
        }

        post
    }

    /// Look through the first `max_posts` timeline posts of a profile page for a
    /// link to `target`.
    ///
    /// Falls back to every link in the document when no post container matches.
    pub fn extract_share(&self, html: &str, target: &PostIdentity, max_posts: usize) -> ShareStatus {
        let document = Html::parse_document(html);

        let posts = self.timeline_post.iter().find_map(|sel| {
            let outermost: Vec<_> = document
                .select(sel)
                .filter(|el| {
                    !el.ancestors()
                        .filter_map(ElementRef::wrap)
                        .any(|a| sel.matches(&a))
                })
                .take(max_posts)
                .collect();
            (!outermost.is_empty()).then_some(outermost)
        });

        let Some(posts) = posts else {
            let scope = Scope::new(document.root_element(), None);
            return match self.referencing_link(&scope, target) {
                Some(link) => ShareStatus {
                    has_shared: true,
                    share_url: Some(link),
                    ..ShareStatus::default()
                },
                None => ShareStatus::not_shared(),
            };
        };

        for post in posts {
            let scope = Scope::new(post, None);
            let Some(link) = self.referencing_link(&scope, target) else {
                continue;
            };

            let permalink = self.own_permalink(&scope, target).unwrap_or(link);
            let share_type = self.share_audience.selectors.iter().find_map(|sel| {
                scope.select(sel).find_map(|el| {
                    let label = el.value().attr("aria-label")?;
                    let lower = label.to_lowercase();
                    AUDIENCE_PREFIXES.iter().find_map(|prefix| {
                        lower
                            .starts_with(prefix)
                            .then(|| label.chars().skip(prefix.chars().count()).collect::<String>())
                    })
                })
            });

            return ShareStatus {
                has_shared: true,
                share_url: Some(permalink),
                share_type: share_type.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
                share_time: self.resolve_time(&self.post_time, &scope).0,
                share_message: self.post_content.first_text(&scope).map(|(text, _)| text),
            };
        }

        ShareStatus::not_shared()
    }

    fn referencing_link(&self, scope: &Scope<'_>, target: &PostIdentity) -> Option<String> {
        scope
            .root
            .descendants()
            .filter_map(ElementRef::wrap)
            .find_map(|el| {
                self.link_attributes
                    .iter()
                    .filter_map(|attr| el.value().attr(attr))
                    .find(|value| classifier::references_post(value, target))
                    .map(str::to_string)
            })
    }

    /// The sharer's own post permalink: a post link inside the timeline entry
    /// that is not the shared post itself.
    fn own_permalink(&self, scope: &Scope<'_>, target: &PostIdentity) -> Option<String> {
        scope
            .select(&ANCHORS)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| !classifier::references_post(href, target))
            .filter_map(|href| {
                let absolute = Url::parse(href)
                    .or_else(|_| Url::parse(&target.canonical_url).and_then(|b| b.join(href)))
                    .ok()?;
                let normalized = classifier::normalize(absolute.as_str())?;
                classifier::is_valid_post_url(normalized.as_str()).then(|| normalized.to_string())
            })
            .find(|url| !url.contains("/groups/") || url.contains("/posts/") || url.contains("/permalink/"))
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn label_or_text(el: ElementRef<'_>) -> String {
    el.value()
        .attr("aria-label")
        .map(str::to_string)
        .unwrap_or_else(|| element_text(el))
}

/// First parseable count in a chain, from aria-labels or text, among labels `accept` admits.
fn first_count(chain: &SelectorChain, scope: &Scope<'_>, accept: impl Fn(&str) -> bool) -> Option<u64> {
    chain.selectors.iter().find_map(|sel| {
        scope.select(sel).find_map(|el| {
            let label = label_or_text(el);
            if accept(&label) {
                parse_count(&label)
            } else {
                None
            }
        })
    })
}

fn count_matching_text(scope: &Scope<'_>, pattern: &Regex) -> Option<u64> {
    scope
        .select(&COUNT_CANDIDATES)
        .map(element_text)
        .find(|text| pattern.is_match(text))
        .and_then(|text| parse_count(&text))
}
