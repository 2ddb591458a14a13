//! Timestamp text to absolute instant.
//!
//! Comment timestamps are rendered as relative text ("5m", "2 hours ago",
//! "3 ngày trước") or as dates ("March 5, 2024 at 3:04 PM"). Relative text is
//! resolved against the wall clock at processing time, so results drift by the
//! scrape latency. Anything ambiguous resolves to `None` rather than a guess.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Languages whose unit words the normalizer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Vi,
}

impl Locale {
    pub const ALL: &'static [Locale] = &[Locale::En, Locale::Vi];

    fn unit_words(self) -> &'static [(&'static str, TimeUnit)] {
        match self {
            Locale::En => &[
                ("seconds", TimeUnit::Second),
                ("second", TimeUnit::Second),
                ("secs", TimeUnit::Second),
                ("sec", TimeUnit::Second),
                ("minutes", TimeUnit::Minute),
                ("minute", TimeUnit::Minute),
                ("mins", TimeUnit::Minute),
                ("min", TimeUnit::Minute),
                ("hours", TimeUnit::Hour),
                ("hour", TimeUnit::Hour),
                ("hrs", TimeUnit::Hour),
                ("hr", TimeUnit::Hour),
                ("days", TimeUnit::Day),
                ("day", TimeUnit::Day),
                ("weeks", TimeUnit::Week),
                ("week", TimeUnit::Week),
                ("wks", TimeUnit::Week),
                ("wk", TimeUnit::Week),
                ("months", TimeUnit::Month),
                ("month", TimeUnit::Month),
                ("years", TimeUnit::Year),
                ("year", TimeUnit::Year),
                ("yrs", TimeUnit::Year),
            ],
            Locale::Vi => &[
                ("giây", TimeUnit::Second),
                ("phút", TimeUnit::Minute),
                ("giờ", TimeUnit::Hour),
                ("tiếng", TimeUnit::Hour),
                ("ngày", TimeUnit::Day),
                ("tuần", TimeUnit::Week),
                ("tháng", TimeUnit::Month),
                ("năm", TimeUnit::Year),
            ],
        }
    }

    /// Spelled-out quantities. "năm" is both five and the year unit; it only
    /// reads as five when a unit word follows.
    fn quantity_words(self) -> &'static [(&'static str, i64)] {
        match self {
            Locale::En => &[("a", 1), ("an", 1), ("one", 1)],
            Locale::Vi => &[("một", 1), ("năm", 5)],
        }
    }

    fn now_words(self) -> &'static [&'static str] {
        match self {
            Locale::En => &["just now", "now"],
            Locale::Vi => &["vừa xong", "vừa mới", "bây giờ"],
        }
    }

    fn yesterday_words(self) -> &'static [&'static str] {
        match self {
            Locale::En => &["yesterday"],
            Locale::Vi => &["hôm qua"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    /// Compact suffixes as in "5m", "2h", "3mo".
    fn from_short(s: &str) -> Option<Self> {
        Some(match s {
            "s" => TimeUnit::Second,
            "m" => TimeUnit::Minute,
            "h" => TimeUnit::Hour,
            "d" => TimeUnit::Day,
            "w" => TimeUnit::Week,
            "mo" => TimeUnit::Month,
            "y" | "yr" => TimeUnit::Year,
            _ => return None,
        })
    }

    fn subtract_from(self, now: DateTime<Utc>, qty: i64) -> Option<DateTime<Utc>> {
        let delta = match self {
            TimeUnit::Second => TimeDelta::try_seconds(qty)?,
            TimeUnit::Minute => TimeDelta::try_minutes(qty)?,
            TimeUnit::Hour => TimeDelta::try_hours(qty)?,
            TimeUnit::Day => TimeDelta::try_days(qty)?,
            TimeUnit::Week => TimeDelta::try_weeks(qty)?,
            TimeUnit::Month => {
                return now.checked_sub_months(Months::new(u32::try_from(qty).ok()?));
            }
            TimeUnit::Year => {
                let months = u32::try_from(qty).ok()?.checked_mul(12)?;
                return now.checked_sub_months(Months::new(months));
            }
        };
        now.checked_sub_signed(delta)
    }
}

/// Date layouts that carry a year, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%A, %B %d, %Y at %I:%M %p",
    "%B %d, %Y at %I:%M %p",
    "%B %d, %Y at %H:%M",
    "%d %B %Y at %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%Y-%m-%d", "%d/%m/%Y"];

/// Layouts without a year; the current year is appended before parsing.
const YEARLESS_FORMATS: &[&str] = &[
    "%A, %B %d at %I:%M %p %Y",
    "%B %d at %I:%M %p %Y",
    "%B %d at %H:%M %Y",
    "%B %d %Y",
    "%d %B %Y",
];

/// Resolves timestamp text into UTC instants.
#[derive(Debug, Clone)]
pub struct TimeNormalizer {
    locales: Vec<Locale>,
    long_relative: Regex,
    short_relative: Regex,
    vi_date: Regex,
}

impl Default for TimeNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeNormalizer {
    /// Normalizer recognizing every supported locale.
    pub fn new() -> Self {
        Self::with_locales(Locale::ALL)
    }

    pub fn with_locales(locales: &[Locale]) -> Self {
        let locales: Vec<Locale> = if locales.is_empty() {
            Locale::ALL.to_vec()
        } else {
            locales.to_vec()
        };

        let units = locales
            .iter()
            .flat_map(|l| l.unit_words().iter().map(|(w, _)| regex::escape(w)))
            .collect::<Vec<_>>()
            .join("|");
        let quantities = locales
            .iter()
            .flat_map(|l| l.quantity_words().iter().map(|(w, _)| regex::escape(w)))
            .collect::<Vec<_>>()
            .join("|");

        let long_relative = Regex::new(&format!(r"(?:\b(\d+|{quantities})\s+)?\b({units})\b"))
            .expect("valid regex");
        let short_relative = Regex::new(r"\b(\d+)\s?(mo|yr|s|m|h|d|w|y)\b").expect("valid regex");
        let vi_date = Regex::new(
            r"^(?:ngày\s+)?(\d{1,2})\s+tháng\s+(\d{1,2})(?:,?\s+(?:năm\s+)?(\d{4}))?(?:\s+lúc\s+(\d{1,2}):(\d{2}))?$",
        )
        .expect("valid regex");

        Self {
            locales,
            long_relative,
            short_relative,
            vi_date,
        }
    }

    /// Resolve against the current wall-clock time.
    pub fn resolve(&self, text: &str) -> Option<DateTime<Utc>> {
        self.resolve_at(text, Utc::now())
    }

    /// Resolve against `now`.
    pub fn resolve_at(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lower = trimmed
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(t) = parse_epoch(&lower) {
            return Some(t);
        }
        if let Ok(t) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(t.with_timezone(&Utc));
        }

        if self.locales.iter().any(|l| l.now_words().contains(&lower.as_str())) {
            return Some(now);
        }
        if self
            .locales
            .iter()
            .any(|l| l.yesterday_words().iter().any(|w| lower.starts_with(w)))
        {
            return TimeUnit::Day.subtract_from(now, 1);
        }

        if let Some(t) = self.parse_absolute(&lower, now) {
            return Some(t);
        }

        self.parse_relative(&lower, now)
    }

    fn parse_absolute(&self, lower: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.locales.contains(&Locale::En) {
            let text = lower.strip_prefix("on ").unwrap_or(lower);

            for fmt in DATETIME_FORMATS {
                if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
                    return Some(Utc.from_utc_datetime(&dt));
                }
            }
            for fmt in DATE_FORMATS {
                if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
                    return Some(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
                }
            }

            let with_year = format!("{text} {}", now.year());
            for fmt in YEARLESS_FORMATS {
                let parsed = NaiveDateTime::parse_from_str(&with_year, fmt).ok().or_else(|| {
                    NaiveDate::parse_from_str(&with_year, fmt)
                        .ok()
                        .map(|d| d.and_time(NaiveTime::MIN))
                });
                if let Some(dt) = parsed {
                    return Some(roll_back_if_future(Utc.from_utc_datetime(&dt), now));
                }
            }
        }

        if self.locales.contains(&Locale::Vi) {
            if let Some(caps) = self.vi_date.captures(lower) {
                let day: u32 = caps[1].parse().ok()?;
                let month: u32 = caps[2].parse().ok()?;
                let explicit_year = caps.get(3).and_then(|y| y.as_str().parse::<i32>().ok());
                let hour: u32 = caps.get(4).map_or(Some(0), |h| h.as_str().parse().ok())?;
                let minute: u32 = caps.get(5).map_or(Some(0), |m| m.as_str().parse().ok())?;

                let year = explicit_year.unwrap_or(now.year());
                let dt = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
                let dt = Utc.from_utc_datetime(&dt);
                return Some(if explicit_year.is_some() {
                    dt
                } else {
                    roll_back_if_future(dt, now)
                });
            }
        }

        None
    }

    fn parse_relative(&self, lower: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(caps) = self.long_relative.captures(lower) {
            let unit_word = &caps[2];
            let unit = self
                .locales
                .iter()
                .flat_map(|l| l.unit_words().iter())
                .find(|(w, _)| *w == unit_word)
                .map(|(_, u)| *u)?;

            let qty = match caps.get(1).map(|m| m.as_str()) {
                Some(q) if q.chars().all(|c| c.is_ascii_digit()) => q.parse::<i64>().ok()?,
                Some(q) => self
                    .locales
                    .iter()
                    .flat_map(|l| l.quantity_words().iter())
                    .find(|(w, _)| *w == q)
                    .map(|(_, n)| *n)?,
                // Only month and year default to one without a quantity ("last month").
                None if matches!(unit, TimeUnit::Month | TimeUnit::Year) => 1,
                None => return None,
            };
            return unit.subtract_from(now, qty);
        }

        let caps = self.short_relative.captures(lower)?;
        let qty = caps[1].parse::<i64>().ok()?;
        let unit = TimeUnit::from_short(&caps[2])?;
        unit.subtract_from(now, qty)
    }
}

/// Unix timestamps in seconds or milliseconds, as found in `data-utime` attributes.
fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    if !(9..=13).contains(&text.len()) || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: i64 = text.parse().ok()?;
    if text.len() >= 12 {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }
}

fn roll_back_if_future(dt: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if dt > now {
        dt.checked_sub_months(Months::new(12)).unwrap_or(dt)
    } else {
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn minutes_before(mins: i64) -> DateTime<Utc> {
        now() - TimeDelta::try_minutes(mins).unwrap()
    }

    #[test]
    fn test_short_relative() {
        let n = TimeNormalizer::new();
        assert_eq!(n.resolve_at("5m", now()), Some(minutes_before(5)));
        assert_eq!(n.resolve_at("5m ago", now()), Some(minutes_before(5)));
        assert_eq!(n.resolve_at("2h", now()), Some(minutes_before(120)));
        assert_eq!(n.resolve_at("3d", now()), Some(minutes_before(3 * 24 * 60)));
        assert_eq!(n.resolve_at("1w", now()), Some(minutes_before(7 * 24 * 60)));
        assert_eq!(
            n.resolve_at("2y", now()),
            Some(Utc.with_ymd_and_hms(2022, 6, 15, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_resolve_uses_wall_clock() {
        let n = TimeNormalizer::new();
        let before = Utc::now();
        let resolved = n.resolve("5m ago").unwrap();
        let after = Utc::now();
        let five = TimeDelta::try_minutes(5).unwrap();
        assert!(resolved >= before - five && resolved <= after - five);
    }

    #[test]
    fn test_long_relative_english() {
        let n = TimeNormalizer::new();
        assert_eq!(n.resolve_at("2 hours ago", now()), Some(minutes_before(120)));
        assert_eq!(n.resolve_at("an hour ago", now()), Some(minutes_before(60)));
        assert_eq!(n.resolve_at("30 seconds ago", now()), Some(now() - TimeDelta::try_seconds(30).unwrap()));
        assert_eq!(
            n.resolve_at("3 months ago", now()),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_long_relative_vietnamese() {
        let n = TimeNormalizer::new();
        assert_eq!(n.resolve_at("3 ngày trước", now()), Some(minutes_before(3 * 24 * 60)));
        assert_eq!(n.resolve_at("15 phút", now()), Some(minutes_before(15)));
        assert_eq!(n.resolve_at("2 giờ trước", now()), Some(minutes_before(120)));
        assert_eq!(n.resolve_at("1 tuần", now()), Some(minutes_before(7 * 24 * 60)));
    }

    #[test]
    fn test_vietnamese_five_versus_year() {
        let n = TimeNormalizer::new();
        assert_eq!(n.resolve_at("năm phút trước", now()), Some(minutes_before(5)));
        assert_eq!(n.resolve_at("Năm giờ trước", now()), Some(minutes_before(300)));
        assert_eq!(
            n.resolve_at("năm tháng trước", now()),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(
            n.resolve_at("1 năm trước", now()),
            Some(Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(
            n.resolve_at("năm năm trước", now()),
            Some(Utc.with_ymd_and_hms(2019, 6, 15, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_month_and_year_default_to_one() {
        let n = TimeNormalizer::new();
        assert_eq!(
            n.resolve_at("last month", now()),
            Some(Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(
            n.resolve_at("tháng trước", now()),
            Some(Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(
            n.resolve_at("năm ngoái", now()),
            Some(Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap())
        );
        // Other units need an explicit quantity.
        assert_eq!(n.resolve_at("minutes ago", now()), None);
    }

    #[test]
    fn test_now_and_yesterday() {
        let n = TimeNormalizer::new();
        assert_eq!(n.resolve_at("Just now", now()), Some(now()));
        assert_eq!(n.resolve_at("Vừa xong", now()), Some(now()));
        assert_eq!(n.resolve_at("Yesterday at 3:04 PM", now()), Some(minutes_before(24 * 60)));
        assert_eq!(n.resolve_at("Hôm qua", now()), Some(minutes_before(24 * 60)));
    }

    #[test]
    fn test_absolute_english() {
        let n = TimeNormalizer::new();
        assert_eq!(
            n.resolve_at("March 5, 2024 at 3:04 PM", now()),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 15, 4, 0).unwrap())
        );
        assert_eq!(
            n.resolve_at("Tuesday, March 5, 2024 at 3:04 PM", now()),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 15, 4, 0).unwrap())
        );
        assert_eq!(
            n.resolve_at("January 2, 2023", now()),
            Some(Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(
            n.resolve_at("2024-01-09", now()),
            Some(Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_absolute_without_year() {
        let n = TimeNormalizer::new();
        assert_eq!(
            n.resolve_at("March 5 at 3:04 PM", now()),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 15, 4, 0).unwrap())
        );
        // A yearless date after "now" belongs to last year.
        assert_eq!(
            n.resolve_at("December 24", now()),
            Some(Utc.with_ymd_and_hms(2023, 12, 24, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_absolute_vietnamese() {
        let n = TimeNormalizer::new();
        assert_eq!(
            n.resolve_at("5 tháng 3, 2024", now()),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(
            n.resolve_at("5 Tháng 3 lúc 10:20", now()),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 0).unwrap())
        );
    }

    #[test]
    fn test_epoch_and_rfc3339() {
        let n = TimeNormalizer::new();
        assert_eq!(
            n.resolve_at("1709650800", now()),
            Some(Utc.timestamp_opt(1_709_650_800, 0).unwrap())
        );
        assert_eq!(
            n.resolve_at("2024-03-05T15:04:00Z", now()),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 15, 4, 0).unwrap())
        );
    }

    #[test]
    fn test_unparseable_yields_none() {
        let n = TimeNormalizer::new();
        assert_eq!(n.resolve_at("not a time", now()), None);
        assert_eq!(n.resolve_at("", now()), None);
        assert_eq!(n.resolve_at("Like · Reply", now()), None);
        assert_eq!(n.resolve_at("42", now()), None);
    }

    #[test]
    fn test_locale_hints_restrict_words() {
        let en_only = TimeNormalizer::with_locales(&[Locale::En]);
        assert_eq!(en_only.resolve_at("3 ngày trước", now()), None);
        assert_eq!(en_only.resolve_at("3 days ago", now()), Some(minutes_before(3 * 24 * 60)));
    }
}
