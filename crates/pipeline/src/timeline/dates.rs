//! Date extraction from free text.
//!
//! A small pattern library covering ISO-8601, US and EU numeric forms,
//! named months, and bare years. Each pattern carries the precision its
//! match supports.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
    ExactTime,
    ExactDate,
    Month,
    Year,
    ApproxYear,
    Unknown,
}

static ISO_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2})").expect("static pattern")
});

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("static pattern"));

static US_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("static pattern"));

static EU_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b").expect("static pattern"));

static NAMED_MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
        .expect("static pattern")
});

static DAY_NAMED_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{4})\b")
        .expect("static pattern")
});

static NAMED_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{4})\b")
        .expect("static pattern")
});

static APPROX_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:circa|ca\.?|~|around|about)\s*(\d{4})\b").expect("static pattern")
});

static BARE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("static pattern"));

fn month_number(prefix: &str) -> Option<u32> {
    match prefix.to_ascii_lowercase().as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

/// Extract the most precise date the text supports.
pub fn extract_date(text: &str) -> Option<(NaiveDate, DatePrecision)> {
    if let Some(caps) = ISO_DATETIME.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        return Some((date, DatePrecision::ExactTime));
    }
    if let Some(caps) = ISO_DATE.captures(text) {
        if let Some(date) = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        ) {
            return Some((date, DatePrecision::ExactDate));
        }
    }
    if let Some(caps) = US_NUMERIC.captures(text) {
        if let Some(date) = NaiveDate::from_ymd_opt(
            caps[3].parse().ok()?,
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
        ) {
            return Some((date, DatePrecision::ExactDate));
        }
    }
    if let Some(caps) = EU_NUMERIC.captures(text) {
        if let Some(date) = NaiveDate::from_ymd_opt(
            caps[3].parse().ok()?,
            caps[2].parse().ok()?,
            caps[1].parse().ok()?,
        ) {
            return Some((date, DatePrecision::ExactDate));
        }
    }
    if let Some(caps) = NAMED_MONTH_DAY.captures(text) {
        let month = month_number(&caps[1])?;
        if let Some(date) =
            NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[2].parse().ok()?)
        {
            return Some((date, DatePrecision::ExactDate));
        }
    }
    if let Some(caps) = DAY_NAMED_MONTH.captures(text) {
        let month = month_number(&caps[2])?;
        if let Some(date) =
            NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[1].parse().ok()?)
        {
            return Some((date, DatePrecision::ExactDate));
        }
    }
    if let Some(caps) = NAMED_MONTH_YEAR.captures(text) {
        let month = month_number(&caps[1])?;
        let date = NaiveDate::from_ymd_opt(caps[2].parse().ok()?, month, 1)?;
        return Some((date, DatePrecision::Month));
    }
    if let Some(caps) = APPROX_YEAR.captures(text) {
        let date = NaiveDate::from_ymd_opt(caps[1].parse().ok()?, 1, 1)?;
        return Some((date, DatePrecision::ApproxYear));
    }
    if let Some(caps) = BARE_YEAR.captures(text) {
        let date = NaiveDate::from_ymd_opt(caps[1].parse().ok()?, 1, 1)?;
        return Some((date, DatePrecision::Year));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_forms() {
        let (date, precision) = extract_date("retrieved 2019-03-14T09:26:53Z").unwrap();
        assert_eq!(precision, DatePrecision::ExactTime);
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 3, 14).unwrap());

        let (_, precision) = extract_date("registered on 2019-03-14").unwrap();
        assert_eq!(precision, DatePrecision::ExactDate);
    }

    #[test]
    fn test_numeric_forms() {
        let (date, _) = extract_date("filed 03/14/2019 in Oregon").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 3, 14).unwrap());

        let (date, _) = extract_date("geboren 14.03.2019").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 3, 14).unwrap());
    }

    #[test]
    fn test_named_month_forms() {
        let (date, precision) = extract_date("joined March 14, 2019").unwrap();
        assert_eq!(precision, DatePrecision::ExactDate);
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 3, 14).unwrap());

        let (date, precision) = extract_date("since March 2019").unwrap();
        assert_eq!(precision, DatePrecision::Month);
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 3, 1).unwrap());
    }

    #[test]
    fn test_year_forms() {
        let (_, precision) = extract_date("founded circa 2015").unwrap();
        assert_eq!(precision, DatePrecision::ApproxYear);

        let (_, precision) = extract_date("class of 2015").unwrap();
        assert_eq!(precision, DatePrecision::Year);
    }

    #[test]
    fn test_no_date() {
        assert!(extract_date("no temporal content here").is_none());
    }
}
