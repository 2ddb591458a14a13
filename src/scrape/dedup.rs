use std::collections::HashMap;

use chrono::TimeDelta;

use crate::domain::CommentRecord;

/// Outcome of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Records not seen before
    pub added: usize,
    /// Known records that gained a field or a higher count
    pub updated: usize,
}

/// Collapses extraction results that describe the same comment.
///
/// Two records match when both carry the same site id, or when author and
/// content are equal and their times fall within `window` of each other (both
/// unknown counts as equal). The second rule can merge a genuine repeat of the
/// same text by the same author posted within the window.
#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    window: TimeDelta,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(TimeDelta::minutes(1))
    }
}

impl Deduplicator {
    pub fn new(window: TimeDelta) -> Self {
        Self { window: window.abs() }
    }

    pub fn same_comment(&self, a: &CommentRecord, b: &CommentRecord) -> bool {
        if a.has_site_id() && b.has_site_id() && a.id == b.id {
            return true;
        }
        a.author_name == b.author_name && a.content == b.content && self.close_in_time(a, b)
    }

    fn close_in_time(&self, a: &CommentRecord, b: &CommentRecord) -> bool {
        match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => (x - y).abs() <= self.window,
            (None, None) => true,
            _ => false,
        }
    }

    /// Fold `incoming` into `existing`, keeping first-seen order.
    ///
    /// Merging the same batch twice changes nothing the second time.
    pub fn merge(&self, existing: &mut Vec<CommentRecord>, incoming: Vec<CommentRecord>) -> MergeStats {
        let mut index = MergeIndex::default();
        for (i, comment) in existing.iter().enumerate() {
            index.insert(comment, i);
        }

        let mut stats = MergeStats::default();
        for comment in incoming {
            let found = index
                .by_id
                .get(comment.identity())
                .copied()
                .filter(|_| comment.has_site_id())
                .or_else(|| {
                    self.candidate_keys(&comment)
                        .iter()
                        .filter_map(|key| index.by_fingerprint.get(key))
                        .flatten()
                        .copied()
                        .find(|&i| self.same_comment(&existing[i], &comment))
                });

            match found {
                Some(i) => {
                    if absorb(&mut existing[i], comment) {
                        stats.updated += 1;
                        index.insert(&existing[i], i);
                    }
                }
                None => {
                    let i = existing.len();
                    index.insert(&comment, i);
                    existing.push(comment);
                    stats.added += 1;
                }
            }
        }

        stats
    }

    /// Fingerprints of every minute bucket a time-window match could fall in.
    fn candidate_keys(&self, comment: &CommentRecord) -> Vec<String> {
        let Some(created) = comment.created_at else {
            return vec![fingerprint(comment)];
        };
        let bucket = CommentRecord::minute_bucket(Some(created));
        let reach = self.window.num_seconds().div_euclid(60) + 1;
        (bucket - reach..=bucket + reach)
            .map(|b| CommentRecord::fingerprint_in_bucket(&comment.author_name, &comment.content, b))
            .collect()
    }
}

#[derive(Default)]
struct MergeIndex {
    by_id: HashMap<String, usize>,
    by_fingerprint: HashMap<String, Vec<usize>>,
}

impl MergeIndex {
    fn insert(&mut self, comment: &CommentRecord, index: usize) {
        if comment.has_site_id() {
            self.by_id.entry(comment.identity().to_string()).or_insert(index);
        }
        let slot = self.by_fingerprint.entry(fingerprint(comment)).or_default();
        if !slot.contains(&index) {
            slot.push(index);
        }
    }
}

/// Stored fingerprint, recomputed for records that came in without one (deserialized).
fn fingerprint(comment: &CommentRecord) -> String {
    if comment.fingerprint.is_empty() {
        CommentRecord::fingerprint_of(&comment.author_name, &comment.content, comment.created_at)
    } else {
        comment.fingerprint.clone()
    }
}

/// Fill gaps in `target` from `other`. Returns whether anything changed.
fn absorb(target: &mut CommentRecord, other: CommentRecord) -> bool {
    let before = target.clone();

    fill(&mut target.id, other.id);
    fill(&mut target.author_id, other.author_id);
    if target.created_at.is_none() && other.created_at.is_some() {
        target.created_at = other.created_at;
        target.refresh_fingerprint();
    }
    fill(&mut target.time_text, other.time_text);
    fill(&mut target.comment_url, other.comment_url);
    fill(&mut target.group_role, other.group_role);
    fill(&mut target.share_status, other.share_status);

    if target.author_profile_url.is_empty() {
        target.author_profile_url = other.author_profile_url;
    }
    if target.reactions.is_empty() {
        target.reactions = other.reactions;
    }
    target.like_count = target.like_count.max(other.like_count);
    target.reply_count = target.reply_count.max(other.reply_count);
    target.is_group_member |= other.is_group_member;

    *target != before
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(min: u32, sec: u32) -> Option<chrono::DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, min, sec).unwrap())
    }

    fn comment(author: &str, content: &str, time: Option<chrono::DateTime<Utc>>) -> CommentRecord {
        CommentRecord::new(author, content, time)
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dedup = Deduplicator::default();
        let batch = vec![
            comment("An", "first", at(0, 0)),
            comment("Bo", "second", at(1, 0)),
            comment("An", "third", None),
        ];

        let mut once = Vec::new();
        dedup.merge(&mut once, batch.clone());
        dedup.merge(&mut once, batch.clone());

        let mut twice = once.clone();
        let stats = dedup.merge(&mut twice, batch);
        assert_eq!(stats, MergeStats::default());
        assert_eq!(twice, once);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_same_site_id_merges() {
        let dedup = Deduplicator::default();
        let mut a = comment("An", "edited text", at(0, 0));
        a.id = Some("42".into());
        let mut b = comment("An", "original text", at(30, 0));
        b.id = Some("42".into());

        let mut set = vec![a];
        let stats = dedup.merge(&mut set, vec![b]);
        assert_eq!(stats.added, 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_time_window() {
        let dedup = Deduplicator::default();
        let mut set = vec![comment("An", "hi", at(0, 0))];

        let stats = dedup.merge(&mut set, vec![comment("An", "hi", at(0, 59))]);
        assert_eq!(stats.added, 0);

        let stats = dedup.merge(&mut set, vec![comment("An", "hi", at(5, 0))]);
        assert_eq!(stats.added, 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_configurable_window() {
        let dedup = Deduplicator::new(TimeDelta::minutes(10));
        let mut set = vec![comment("An", "hi", at(0, 0))];
        let stats = dedup.merge(&mut set, vec![comment("An", "hi", at(5, 0))]);
        assert_eq!(stats.added, 0);
    }

    #[test]
    fn test_unknown_times() {
        let dedup = Deduplicator::default();
        let mut set = vec![comment("An", "hi", None)];

        assert_eq!(dedup.merge(&mut set, vec![comment("An", "hi", None)]).added, 0);
        assert_eq!(dedup.merge(&mut set, vec![comment("An", "hi", at(0, 0))]).added, 1);
    }

    #[test]
    fn test_different_author_or_content_kept() {
        let dedup = Deduplicator::default();
        let mut set = vec![comment("An", "hi", at(0, 0))];
        let stats = dedup.merge(
            &mut set,
            vec![comment("Bo", "hi", at(0, 0)), comment("An", "hello", at(0, 0))],
        );
        assert_eq!(stats.added, 2);
    }

    #[test]
    fn test_merge_fills_missing_fields() {
        let dedup = Deduplicator::default();
        let mut known = comment("An", "hi", at(0, 0));
        known.like_count = 3;

        let mut richer = comment("An", "hi", at(0, 10));
        richer.id = Some("c1".into());
        richer.comment_url = Some("https://facebook.com/p/posts/1?comment_id=c1".into());
        richer.author_profile_url = "https://facebook.com/an".into();
        richer.like_count = 7;

        let mut set = vec![known];
        let stats = dedup.merge(&mut set, vec![richer.clone()]);
        assert_eq!(stats, MergeStats { added: 0, updated: 1 });
        assert_eq!(set[0].id.as_deref(), Some("c1"));
        assert_eq!(set[0].author_profile_url, "https://facebook.com/an");
        assert_eq!(set[0].like_count, 7);
        assert_eq!(set[0].created_at, at(0, 0));

        // A lower count later never lowers the merged one
        let mut stale = richer;
        stale.like_count = 1;
        let stats = dedup.merge(&mut set, vec![stale]);
        assert_eq!(stats, MergeStats::default());
        assert_eq!(set[0].like_count, 7);
    }

    #[test]
    fn test_time_filled_by_id_match_updates_fingerprint() {
        let dedup = Deduplicator::default();
        let mut undated = comment("An", "hi", None);
        undated.id = Some("7".into());
        let mut dated = comment("An", "hi", at(2, 0));
        dated.id = Some("7".into());

        let mut set = vec![undated];
        dedup.merge(&mut set, vec![dated]);
        assert_eq!(set[0].created_at, at(2, 0));
        assert_eq!(set[0].fingerprint, CommentRecord::fingerprint_of("An", "hi", at(2, 0)));

        // An id-less sighting of the same comment now lands on the dated record
        let stats = dedup.merge(&mut set, vec![comment("An", "hi", at(2, 30))]);
        assert_eq!(stats.added, 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_window_spans_minute_boundary() {
        let dedup = Deduplicator::default();
        let mut set = vec![comment("An", "hi", at(0, 50))];
        let stats = dedup.merge(&mut set, vec![comment("An", "hi", at(1, 40))]);
        assert_eq!(stats.added, 0);
    }

    #[test]
    fn test_deserialized_records_still_match() {
        let dedup = Deduplicator::default();
        let mut stored = comment("An", "hi", at(0, 0));
        stored.fingerprint.clear();

        let mut set = vec![stored];
        let stats = dedup.merge(&mut set, vec![comment("An", "hi", at(0, 20))]);
        assert_eq!(stats.added, 0);
    }

    #[test]
    fn test_same_comment() {
        let dedup = Deduplicator::default();
        assert!(dedup.same_comment(&comment("An", "hi", at(0, 0)), &comment("An", "hi", at(0, 30))));
        assert!(!dedup.same_comment(&comment("An", "hi", at(0, 0)), &comment("An", "hi", at(3, 0))));
        assert!(!dedup.same_comment(&comment("An", "hi", at(0, 0)), &comment("Bo", "hi", at(0, 0))));
    }

    #[test]
    fn test_duplicates_within_one_batch() {
        let dedup = Deduplicator::default();
        let mut set = Vec::new();
        let stats = dedup.merge(
            &mut set,
            vec![comment("An", "hi", at(0, 0)), comment("An", "hi", at(0, 5))],
        );
        assert_eq!(stats.added, 1);
        assert_eq!(set.len(), 1);
    }
}
