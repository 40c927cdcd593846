//! Subsidy day counts, amounts and report totals.
//!
//! Everything here is a pure function of its inputs. Blank or malformed input
//! never produces an error: a range that cannot be read counts as 0 days and
//! a missing amount counts as 0.

use crate::config::Locale;
use crate::report::{DateRange, LineItem};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parse a form date. Accepts `YYYY-MM-DD`, RFC 3339 timestamps and
/// `YYYY-MM-DD HH:MM:SS`; only the calendar date is kept.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|d| d.date())
        })
}

/// Both ends of a range as dates, if present, parseable and ordered.
pub fn range_dates(range: Option<&DateRange>) -> Option<(NaiveDate, NaiveDate)> {
    let (start, end) = range?.bounds()?;
    let (start, end) = (parse_date(start)?, parse_date(end)?);
    (start <= end).then_some((start, end))
}

/// Inclusive number of days covered by the item's date range; 0 when the
/// range is missing, unparseable or reversed.
pub fn days(item: &LineItem) -> u32 {
    match range_dates(item.date_range.as_ref()) {
        Some((start, end)) => (end - start).num_days() as u32 + 1,
        None => 0,
    }
}

/// Subsidy owed for the item: `days × daily_rate`.
pub fn amount(item: &LineItem, daily_rate: f64) -> f64 {
    f64::from(days(item)) * daily_rate
}

/// "from 01-01 to 01-03 (total 3 days)" in the requested language.
pub fn remark(item: &LineItem, locale: Locale) -> Option<String> {
    let (start, end) = range_dates(item.date_range.as_ref())?;
    let (start, end) = (start.format("%m-%d"), end.format("%m-%d"));
    let n = days(item);
    Some(match locale {
        Locale::ZhCn => format!("从{start}至{end} (共{n}天)"),
        Locale::En => format!("from {start} to {end} (total {n} days)"),
    })
}

/// Whether the amount counts as entered. Zero is treated as blank.
fn has_amount(item: &LineItem) -> bool {
    matches!(item.amount, Some(a) if a > 0.0)
}

/// A subsidy item is rendered and totalled only when both ends of its date
/// range and its amount are filled in.
pub fn is_included(subsidy: &LineItem) -> bool {
    let has_range = subsidy
        .date_range
        .as_ref()
        .and_then(DateRange::bounds)
        .is_some();
    has_range && has_amount(subsidy)
}

/// Numeric grand total of project items plus included subsidies.
pub fn total_value(items: &[LineItem], subsidies: &[LineItem]) -> f64 {
    items
        .iter()
        .chain(subsidies.iter().filter(|s| is_included(s)))
        .map(|item| item.amount.unwrap_or(0.0))
        // Start from +0.0: an empty `sum()` of floats is -0.0.
        .fold(0.0, |acc, a| acc + a)
}

/// Grand total with exactly two decimals. `"0.00"` for no items.
pub fn total(items: &[LineItem], subsidies: &[LineItem]) -> String {
    format!("{:.2}", total_value(items, subsidies))
}

/// An amount as shown in a table cell: shortest form, no trailing zeros
/// (`10`, `10.5`).
pub fn format_amount(value: f64) -> String {
    if value == 0.0 {
        // Also folds -0.0.
        return "0".to_string();
    }
    format!("{value}")
}

/// Height that keeps `width × height` proportional at `target_width`.
///
/// Never below 1 px for a non-empty source, however wide. Returns 0 for a
/// zero-width source.
pub fn scaled_height(target_width: u32, width: u32, height: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let scaled = (f64::from(target_width) * f64::from(height) / f64::from(width)).round() as u32;
    if height > 0 {
        scaled.max(1)
    } else {
        scaled
    }
}
