use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid ISO date regex"));

static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})/(\d{1,2})/(\d{1,2})\b").expect("valid slash date regex"));

static DOTTED_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b").expect("valid dotted date regex"));

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

// "January 2, 2024", "Jan 2nd 2024"
static MONTH_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b{MONTH}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
    ))
    .expect("valid month-first regex")
});

// "2 January 2024", "2nd Jan, 2024"
static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+{MONTH}\.?,?\s+(\d{{4}})\b"
    ))
    .expect("valid day-first regex")
});

/// Earliest valid calendar date mentioned in `text`, if any.
///
/// Matches that do not form a real date (e.g. `2024-02-30`) are skipped rather than
/// ending the search.
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    let mut candidates: Vec<(usize, NaiveDate)> = Vec::new();

    collect(&ISO_DATE, text, &mut candidates, |c| {
        ymd(&c[1], &c[2], &c[3])
    });
    collect(&SLASH_DATE, text, &mut candidates, |c| {
        ymd(&c[1], &c[2], &c[3])
    });
    collect(&DOTTED_DATE, text, &mut candidates, |c| {
        ymd(&c[3], &c[2], &c[1])
    });
    collect(&MONTH_FIRST, text, &mut candidates, |c| {
        let month = month_number(&c[1])?;
        NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[2].parse().ok()?)
    });
    collect(&DAY_FIRST, text, &mut candidates, |c| {
        let month = month_number(&c[2])?;
        NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[1].parse().ok()?)
    });

    candidates
        .into_iter()
        .min_by_key(|(start, _)| *start)
        .map(|(_, date)| date)
}

fn collect<F>(re: &Regex, text: &str, out: &mut Vec<(usize, NaiveDate)>, to_date: F)
where
    F: Fn(&Captures<'_>) -> Option<NaiveDate>,
{
    for caps in re.captures_iter(text) {
        if let (Some(whole), Some(date)) = (caps.get(0), to_date(&caps)) {
            out.push((whole.start(), date));
        }
    }
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).flat_map(char::to_lowercase).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_supported_formats() {
        assert_eq!(extract_date("2024-01-02 to 2024-01-09"), date(2024, 1, 2));
        assert_eq!(extract_date("around 2024/3/7"), date(2024, 3, 7));
        assert_eq!(extract_date("am 05.06.2024 gemeldet"), date(2024, 6, 5));
        assert_eq!(extract_date("January 2, 2024 onwards"), date(2024, 1, 2));
        assert_eq!(extract_date("since Sept. 14th 2023"), date(2023, 9, 14));
        assert_eq!(extract_date("from 2 Feb 2024"), date(2024, 2, 2));
    }

    #[test]
    fn test_earliest_mention_wins() {
        assert_eq!(
            extract_date("March 9, 2024 (first seen 2024-01-15)"),
            date(2024, 3, 9)
        );
    }

    #[test]
    fn test_invalid_dates_skipped() {
        assert_eq!(extract_date("2024-02-30 then 2024-03-01"), date(2024, 3, 1));
        assert_eq!(extract_date("2024-13-01"), None);
    }

    #[test]
    fn test_no_date() {
        assert_eq!(extract_date("N/A"), None);
        assert_eq!(extract_date("ticket 12345 escalated"), None);
    }
}
