//! Date reconstruction helpers shared by both sources.
//!
//! Source dates arrive as separate year/month/day fields (PubMed history
//! entries) or as partial `YYYY[-MM[-DD]]` strings (ClinicalTrials.gov date
//! structs). Missing month/day default to "01"; a missing year makes the
//! whole date null.

use chrono::NaiveDate;

/// Build `YYYY-MM-DD` from optional parts. No year means no date.
pub fn format_date(year: Option<&str>, month: Option<&str>, day: Option<&str>) -> Option<String> {
    let year = nonblank(year)?;
    let month = nonblank(month).unwrap_or("01");
    let day = nonblank(day).unwrap_or("01");
    Some(format!("{year}-{month:0>2}-{day:0>2}"))
}

/// Expand a partial `YYYY[-MM[-DD]]` string to full `YYYY-MM-DD`.
pub fn expand_date(date_str: &str) -> Option<String> {
    let date_str = date_str.trim();
    if date_str.is_empty() {
        return None;
    }
    let mut parts = date_str.split('-');
    let year = parts.next()?;
    let month = parts.next();
    let day = parts.next();
    format_date(Some(year), month, day)
}

/// Coerce a `YYYY[-MM[-DD]]` string to a calendar date, or None.
///
/// Used by the loaders when typing partition-file strings for the store.
pub fn str_to_date(date_str: &str) -> Option<NaiveDate> {
    let date_str = date_str.trim();
    if date_str.is_empty() {
        return None;
    }
    let mut parts = date_str.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1);
    let day: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn nonblank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
