//! Date normalizer: resolves locale-ambiguous numeric dates.
//!
//! Bank exports mix `YYYY-MM-DD`, `YYYY-DD-MM`, `DD/MM/YYYY` and `MM/DD/YYYY`
//! within one file. When both day/month orders are calendar-valid the
//! processing month decides: the candidate whose month equals it wins, else the
//! closest month wins and the result is flagged for review.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

use crate::error::DateFormatError;

static MY_UTC_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\bMY\s*\(UTC.*$").expect("valid regex"));
static UTC_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\(UTC[^)]*\)\s*$").expect("valid regex"));
static TIME_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)[ T]\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?",
        r"(?:\s*[AP]M)?(?:\s*(?:Z|[+-]\d{2}:?\d{2}))?$"
    ))
    .expect("valid regex")
});
static YEAR_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid regex"));
static YEAR_LAST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})([/.-])(\d{1,2})([/.-])(\d{4})$").expect("valid regex"));

const LENIENT_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%B %d, %Y",
    "%Y/%m/%d",
    "%Y%m%d",
];

/// A resolved calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub date: NaiveDate,
    /// Neither candidate matched the expected month; the closest one was taken.
    pub needs_review: bool,
}

impl Resolution {
    fn exact(date: NaiveDate) -> Self {
        Self {
            date,
            needs_review: false,
        }
    }
}

/// Resolve `raw` into a calendar date, using `expected_month` (1-12) to break
/// day/month ambiguity.
pub fn resolve(raw: &str, expected_month: u32) -> Result<Resolution, DateFormatError> {
    let s = strip_suffixes(raw);
    if s.is_empty() {
        return Err(DateFormatError::Empty);
    }

    if let Some(caps) = YEAR_FIRST.captures(&s) {
        let (y, mid, last) = (num(&caps[1]), num(&caps[2]), num(&caps[3]));
        // Month-in-the-middle is the ISO reading and is preferred on a tie.
        let candidates = [ymd(y, mid, last), ymd(y, last, mid)];
        return pick(&candidates, expected_month).ok_or_else(|| unrecognised(raw));
    }

    if let Some(caps) = YEAR_LAST.captures(&s) {
        if caps[2] == caps[4] {
            let (first, second, y) = (num(&caps[1]), num(&caps[3]), num(&caps[5]));
            // Day-first is the regional default for these exports.
            let candidates = [ymd(y, second, first), ymd(y, first, second)];
            return pick(&candidates, expected_month).ok_or_else(|| unrecognised(raw));
        }
    }

    lenient(&s)
        .map(Resolution::exact)
        .ok_or_else(|| unrecognised(raw))
}

fn strip_suffixes(raw: &str) -> String {
    let s = raw.trim();
    let s = MY_UTC_SUFFIX.replace(s, "");
    let s = UTC_GROUP.replace(&s, "");
    let s = TIME_PART.replace(&s, "");
    s.trim().to_string()
}

fn num(s: &str) -> i64 {
    // The capture groups are bounded digit runs.
    s.parse().unwrap_or(0)
}

fn ymd(y: i64, m: i64, d: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        i32::try_from(y).ok()?,
        u32::try_from(m).ok()?,
        u32::try_from(d).ok()?,
    )
}

/// Choose among calendar-valid candidates, listed in preference order.
fn pick(candidates: &[Option<NaiveDate>], expected_month: u32) -> Option<Resolution> {
    let mut valid: Vec<NaiveDate> = Vec::with_capacity(candidates.len());
    for date in candidates.iter().flatten() {
        if !valid.contains(date) {
            valid.push(*date);
        }
    }

    match valid.as_slice() {
        [] => None,
        [only] => Some(Resolution::exact(*only)),
        many => {
            if let Some(hit) = many.iter().find(|d| d.month() == expected_month) {
                return Some(Resolution::exact(*hit));
            }
            // min_by_key keeps the first of equal keys, i.e. the preferred reading.
            let closest = many
                .iter()
                .min_by_key(|d| month_distance(d.month(), expected_month))?;
            Some(Resolution {
                date: *closest,
                needs_review: true,
            })
        }
    }
}

/// Distance between two months around the year, so Dec and Jan are adjacent.
fn month_distance(a: u32, b: u32) -> u32 {
    let diff = a.abs_diff(b);
    diff.min(12 - diff)
}

fn lenient(s: &str) -> Option<NaiveDate> {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    LENIENT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&collapsed, fmt).ok())
}

fn unrecognised(raw: &str) -> DateFormatError {
    DateFormatError::Unrecognised(raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_year_day_month_when_middle_exceeds_twelve() {
        let r = resolve("2025-15-08", 8).unwrap();
        assert_eq!(r.date, d(2025, 8, 15));
        assert!(!r.needs_review);
    }

    #[test]
    fn test_iso_when_last_exceeds_twelve() {
        assert_eq!(resolve("2025-08-21", 3).unwrap().date, d(2025, 8, 21));
    }

    #[test]
    fn test_expected_month_decides_ambiguous_dash_dates() {
        assert_eq!(resolve("2025-03-08", 8).unwrap().date, d(2025, 8, 3));
        assert_eq!(resolve("2025-08-03", 8).unwrap().date, d(2025, 8, 3));
        assert_eq!(resolve("2025-03-08", 3).unwrap().date, d(2025, 3, 8));
    }

    #[test]
    fn test_expected_month_decides_ambiguous_slash_dates() {
        assert_eq!(resolve("05/08/2025", 8).unwrap().date, d(2025, 8, 5));
        assert_eq!(resolve("08/05/2025", 8).unwrap().date, d(2025, 8, 5));
        assert_eq!(resolve("25/08/2025", 1).unwrap().date, d(2025, 8, 25));
        assert_eq!(resolve("08/25/2025", 1).unwrap().date, d(2025, 8, 25));
    }

    #[test]
    fn test_every_single_match_case_follows_expected_month() {
        for expected in 1..=12u32 {
            for other in 1..=12u32 {
                if other == expected {
                    continue;
                }
                let dash = format!("2025-{other:02}-{expected:02}");
                let r = resolve(&dash, expected).unwrap();
                assert_eq!(r.date, d(2025, expected, other), "{dash}");
                assert!(!r.needs_review);

                let slash = format!("{other:02}/{expected:02}/2025");
                let r = resolve(&slash, expected).unwrap();
                assert_eq!(r.date, d(2025, expected, other), "{slash}");
            }
        }
    }

    #[test]
    fn test_closest_month_wins_and_is_flagged() {
        // Candidates: Mar 10 and Oct 3. August is closer to October.
        let r = resolve("2025-03-10", 8).unwrap();
        assert_eq!(r.date, d(2025, 10, 3));
        assert!(r.needs_review);

        // Equidistant (Jul vs Sep around Aug): preferred reading kept.
        let r = resolve("2025-07-09", 8).unwrap();
        assert_eq!(r.date, d(2025, 7, 9));
        assert!(r.needs_review);
        let r = resolve("07/09/2025", 8).unwrap();
        assert_eq!(r.date, d(2025, 9, 7));
        assert!(r.needs_review);
    }

    #[test]
    fn test_month_distance_wraps_year() {
        assert_eq!(month_distance(12, 1), 1);
        assert_eq!(month_distance(1, 7), 6);
        // Jan 10 vs Oct 1 with December expected: January is closer.
        let r = resolve("2026-01-10", 12).unwrap();
        assert_eq!(r.date, d(2026, 1, 10));
        assert!(r.needs_review);
    }

    #[test]
    fn test_strips_known_suffixes() {
        assert_eq!(
            resolve("15/08/2025 MY (UTC+08:00)", 8).unwrap().date,
            d(2025, 8, 15)
        );
        assert_eq!(resolve("2025-08-15 00:00:00", 8).unwrap().date, d(2025, 8, 15));
        assert_eq!(resolve("2025-08-15T10:22:01Z", 8).unwrap().date, d(2025, 8, 15));
        assert_eq!(resolve("15/08/2025 (UTC+8)", 8).unwrap().date, d(2025, 8, 15));
    }

    #[test]
    fn test_dotted_and_dashed_day_first() {
        assert_eq!(resolve("15.08.2025", 8).unwrap().date, d(2025, 8, 15));
        assert_eq!(resolve("04-08-2025", 8).unwrap().date, d(2025, 8, 4));
    }

    #[test]
    fn test_lenient_fallback() {
        assert_eq!(resolve("15 Aug 2025", 1).unwrap().date, d(2025, 8, 15));
        assert_eq!(resolve("15-Aug-2025", 1).unwrap().date, d(2025, 8, 15));
        assert_eq!(resolve("Aug 15, 2025", 1).unwrap().date, d(2025, 8, 15));
        assert_eq!(resolve("20250815", 1).unwrap().date, d(2025, 8, 15));
    }

    #[test]
    fn test_unresolvable() {
        assert_eq!(resolve("   ", 8), Err(DateFormatError::Empty));
        assert!(matches!(
            resolve("2025-13-13", 8),
            Err(DateFormatError::Unrecognised(_))
        ));
        assert!(resolve("not a date", 8).is_err());
        assert!(resolve("31/02/2025", 2).is_err());
    }
}
