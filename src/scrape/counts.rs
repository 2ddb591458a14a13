//! Localized, abbreviated count text ("1.2K", "3M", "1,234 comments", "2,5 nghìn").

use std::sync::LazyLock;

use regex::Regex;

static COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,\s\u{a0}\u{202f}]\d+)*)\s*(\p{L}+)?").expect("valid regex")
});

fn multiplier(suffix: &str) -> Option<f64> {
    match suffix {
        "k" | "n" | "nghìn" | "ngàn" => Some(1e3),
        "m" | "tr" | "triệu" => Some(1e6),
        "b" | "tỷ" | "tỉ" => Some(1e9),
        _ => None,
    }
}

/// Parse the first count in `text`.
///
/// Thousands separators (`,` `.` spaces) are stripped. With a K/M/B suffix a
/// trailing `.` or `,` group of one or two digits is the decimal part instead,
/// so "1.2K" and "1,2K" are both 1200. Returns `None` when no digits are present.
pub fn parse_count(text: &str) -> Option<u64> {
    let lower = text.to_lowercase();
    let caps = COUNT.captures(&lower)?;
    let digits = &caps[1];
    let factor = caps.get(2).and_then(|s| multiplier(s.as_str()));

    let value = match factor {
        Some(factor) => {
            let (int_part, frac_part) = split_decimal(digits);
            let number: f64 = format!("{int_part}.{frac_part}").parse().ok()?;
            (number * factor).round()
        }
        None => {
            let plain: String = digits.chars().filter(char::is_ascii_digit).collect();
            plain.parse::<f64>().ok()?
        }
    };

    if value.is_finite() && value >= 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

fn split_decimal(digits: &str) -> (String, String) {
    if let Some(pos) = digits.rfind(['.', ',']) {
        let frac = &digits[pos + 1..];
        if (1..=2).contains(&frac.len()) && frac.chars().all(|c| c.is_ascii_digit()) {
            let int: String = digits[..pos].chars().filter(char::is_ascii_digit).collect();
            return (int, frac.to_string());
        }
    }
    let int: String = digits.chars().filter(char::is_ascii_digit).collect();
    (int, "0".to_string())
}
