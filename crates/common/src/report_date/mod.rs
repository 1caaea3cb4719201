//! Report date normalization
//!
//! Reports are dated either by month (`YYYY-MM`, usually from the file name)
//! or by calendar quarter (`YYYY-QN`, from tokens like `C1Q23`). Both forms
//! are stored as plain strings on every chunk; [`ReportPeriod`] gives them a
//! common ordering so "latest" can be answered across both.

use chrono::NaiveDate;
use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Sentinel requested when a query names no explicit date
pub const LATEST: &str = "LATEST";

/// Title-cased month spellings; lowercase words such as "may" or "market"
/// never name a report month.
const MONTHS: &str = "Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|\
                      Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?";

fn query_month_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\b({MONTHS})\.?\s?['\-]?\s?(\d{{4}}|\d{{2}})\b"))
            .expect("valid month regex")
    })
}

fn quarter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)C([1-4])Q(\d{2})").expect("valid quarter regex"))
}

fn filename_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // `_` is a word character, so file names delimit the month by hand
        Regex::new(&format!(
            r"(?:^|[^A-Z])({MONTHS})\.?[-_ ]?([0-9]{{4}}|[0-9]{{2}})(?:[^0-9]|$)"
        ))
            .expect("valid filename date regex")
    })
}

/// What a query asks for in terms of report dates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateRequest {
    /// Explicit `YYYY-MM` / `YYYY-QN` periods
    Explicit(BTreeSet<String>),
    /// Nothing named: use the most recent report
    Latest,
}

impl DateRequest {
    /// Parse the dates named in a query; no tokens means [`DateRequest::Latest`]
    pub fn from_query(query: &str) -> Self {
        let dates = extract_report_dates(query);
        if dates.is_empty() {
            DateRequest::Latest
        } else {
            DateRequest::Explicit(dates)
        }
    }

    /// The requested dates as strings, with `LATEST` as the sentinel
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            DateRequest::Explicit(dates) => dates.iter().cloned().collect(),
            DateRequest::Latest => vec![LATEST.to_string()],
        }
    }
}

/// Extract every month+year and quarter token of a query as normalized dates.
///
/// Tokens whose year or month cannot be normalized are dropped silently.
pub fn extract_report_dates(query: &str) -> BTreeSet<String> {
    let mut dates = BTreeSet::new();

    for caps in query_month_regex().captures_iter(query) {
        if let Some(date) = month_date(&caps[1], &caps[2]) {
            dates.insert(date);
        }
    }

    for caps in quarter_regex().captures_iter(query) {
        dates.insert(format!("20{}-Q{}", &caps[2], &caps[1]));
    }

    dates
}

/// Report date (`YYYY-MM`) encoded in a report file name such as
/// `TrendForce_ServerDRAM_Aug2022.pdf`.
pub fn extract_report_date_from_filename(filename: &str) -> Option<String> {
    let base_name = std::path::Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());

    let caps = filename_regex().captures(&base_name)?;
    month_date(&caps[1], &caps[2])
}

fn month_date(month: &str, year: &str) -> Option<String> {
    let year = normalize_year(year)?;
    let month = month_number(month)?;
    Some(format!("{year}-{month:02}"))
}

fn normalize_year(year: &str) -> Option<String> {
    match year.len() {
        2 => Some(format!("20{year}")),
        4 => Some(year.to_string()),
        _ => None,
    }
}

fn month_number(name: &str) -> Option<u32> {
    use chrono::Datelike;

    let abbrev: String = name.chars().take(3).collect();
    NaiveDate::parse_from_str(&format!("1 {abbrev} 2000"), "%d %b %Y")
        .ok()
        .map(|d| d.month())
}

/// A sortable report period.
///
/// Months and quarters compare by the last month they cover, so `2024-Q1`
/// and `2024-03` are the same period and `2024-Q1` sorts after `2024-02`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportPeriod {
    pub year: i32,
    pub end_month: u32,
}

impl ReportPeriod {
    /// Parse `YYYY-MM` or `YYYY-QN`
    pub fn parse(date: &str) -> Option<Self> {
        let (year, rest) = date.trim().split_once('-')?;
        if year.len() != 4 {
            return None;
        }
        let year: i32 = year.parse().ok()?;

        let end_month = match rest.strip_prefix(['Q', 'q']) {
            Some(quarter) => {
                let quarter: u32 = quarter.parse().ok()?;
                if !(1..=4).contains(&quarter) {
                    return None;
                }
                quarter * 3
            }
            None => {
                let month: u32 = rest.parse().ok()?;
                if !(1..=12).contains(&month) {
                    return None;
                }
                month
            }
        };

        Some(Self { year, end_month })
    }
}
