//! Stata date encoding.
//!
//! Stata stores a date as the number of days since 1960-01-01 (day 0);
//! earlier dates are negative.

use chrono::{Datelike, NaiveDate};

/// Days from 0001-01-01 (day 1) to the Stata epoch, 1960-01-01.
const STATA_EPOCH_DAYS_FROM_CE: i32 = 715_510;

/// Day offset of `date` from 1960-01-01.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use odk_core::dates::stata_day_offset;
///
/// let date = NaiveDate::from_ymd_opt(1960, 1, 2).unwrap();
/// assert_eq!(stata_day_offset(date), 1);
/// ```
pub fn stata_day_offset(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - STATA_EPOCH_DAYS_FROM_CE
}

/// Parses a `YYYY-MM-DD` date value.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Converts a date value to its Stata day offset, as text.
///
/// Returns `None` when the value is not a `YYYY-MM-DD` date.
pub fn convert_date_value(value: &str) -> Option<String> {
    parse_date(value).map(|date| stata_day_offset(date).to_string())
}
