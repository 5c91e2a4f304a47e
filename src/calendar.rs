use crate::schedule::ScheduleError;
use chrono::{Datelike, Days, FixedOffset, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// How the first day of a distribution window is chosen from "today".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Rolling window starting on the run date.
    #[default]
    Today,
    /// Window anchored to the first day of the run date's month.
    FirstOfMonth,
}

impl StartPolicy {
    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            StartPolicy::Today => today,
            StartPolicy::FirstOfMonth => today.with_day(1).unwrap_or(today),
        }
    }
}

/// English weekday name as printed in schedule documents ("Monday" ...).
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|err| ScheduleError::InvalidStartDate(format!("'{input}': {err}")))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Last day of a `count`-day window beginning at `start`, or
/// `DateOutOfRange` when that day is past the supported calendar.
pub fn window_end(start: NaiveDate, count: usize) -> Result<NaiveDate, ScheduleError> {
    let out_of_range = ScheduleError::DateOutOfRange { start, days: count };
    let span = u64::try_from(count.saturating_sub(1)).map_err(|_| out_of_range.clone())?;
    start.checked_add_days(Days::new(span)).ok_or(out_of_range)
}

/// `count` consecutive calendar days beginning at `start`.
pub fn consecutive_dates(start: NaiveDate, count: usize) -> Result<Vec<NaiveDate>, ScheduleError> {
    window_end(start, count)?;
    let mut dates = Vec::with_capacity(count);
    for offset in 0..count {
        let date = start
            .checked_add_days(Days::new(offset as u64))
            .ok_or(ScheduleError::DateOutOfRange { start, days: count })?;
        dates.push(date);
    }
    Ok(dates)
}

/// The current calendar date in a fixed UTC offset (e.g. +9 for JST).
pub fn today_at_offset(utc_offset_hours: i32) -> Option<NaiveDate> {
    let offset = FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?;
    Some(Utc::now().with_timezone(&offset).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dates_cross_month_and_year_boundaries() {
        let dates = consecutive_dates(d(2024, 12, 20), 21).unwrap();
        assert_eq!(dates[0], d(2024, 12, 20));
        assert_eq!(dates[11], d(2025, 1, 1));
        assert_eq!(dates[20], d(2025, 1, 9));
        for pair in dates.windows(2) {
            assert_eq!(pair[1].signed_duration_since(pair[0]).num_days(), 1);
        }
    }

    #[test]
    fn leap_day_is_included() {
        let dates = consecutive_dates(d(2024, 2, 27), 4).unwrap();
        assert_eq!(
            dates,
            vec![d(2024, 2, 27), d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1)]
        );
    }

    #[test]
    fn overflow_past_max_date_is_an_error() {
        let result = consecutive_dates(NaiveDate::MAX, 2);
        assert!(matches!(result, Err(ScheduleError::DateOutOfRange { .. })));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("12/12/2024").is_err());
        assert_eq!(parse_date(" 2024-12-12 ").unwrap(), d(2024, 12, 12));
    }

    #[test]
    fn weekday_names_follow_chrono() {
        assert_eq!(weekday_name(d(2024, 12, 12).weekday()), "Thursday");
        assert_eq!(weekday_name(d(2025, 1, 1).weekday()), "Wednesday");
    }

    #[test]
    fn start_policy_resolves_first_of_month() {
        assert_eq!(StartPolicy::Today.resolve(d(2025, 3, 17)), d(2025, 3, 17));
        assert_eq!(StartPolicy::FirstOfMonth.resolve(d(2025, 3, 17)), d(2025, 3, 1));
    }

    #[test]
    fn invalid_offsets_yield_none() {
        assert!(today_at_offset(9).is_some());
        assert!(today_at_offset(30).is_none());
    }
}
