use crate::calendar::{consecutive_dates, weekday_name, window_end};
use crate::partition::partition_owned;
use crate::persistence::ScheduleRow;
use crate::site::Site;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Length of the publication window.
pub const DEFAULT_DAYS: usize = 21;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("day count must be positive")]
    ZeroDays,
    #[error("expected {expected} day slices, got {actual}")]
    SliceCountMismatch { expected: usize, actual: usize },
    #[error("invalid start date {0}")]
    InvalidStartDate(String),
    #[error("a {days}-day window starting {start} runs past the supported calendar")]
    DateOutOfRange { start: NaiveDate, days: usize },
    #[error("invalid schedule document: {0}")]
    InvalidDocument(String),
}

/// One day of the window: its date, weekday and the sites published on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySchedule {
    #[serde(skip)]
    day_index: usize,
    date: NaiveDate,
    day_of_week: String,
    sites_count: usize,
    sites: Vec<Site>,
}

impl DaySchedule {
    fn new(day_index: usize, date: NaiveDate, sites: Vec<Site>) -> Self {
        Self {
            day_index,
            date,
            day_of_week: weekday_name(date.weekday()).to_string(),
            sites_count: sites.len(),
            sites,
        }
    }

    /// 1-based position within the window.
    pub fn day_index(&self) -> usize {
        self.day_index
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn day_of_week(&self) -> &str {
        &self.day_of_week
    }

    pub fn sites_count(&self) -> usize {
        self.sites_count
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn summary(&self) -> DaySummary {
        DaySummary {
            day_index: self.day_index,
            date: self.date,
            day_of_week: self.day_of_week.clone(),
            sites_count: self.sites_count,
        }
    }

    /// Persistence request for this day; `is_added` starts out false.
    pub fn row(&self) -> ScheduleRow {
        ScheduleRow::pending(
            self.date,
            self.sites.iter().map(|site| site.site_id.clone()).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    #[serde(skip)]
    pub day_index: usize,
    pub date: NaiveDate,
    pub day_of_week: String,
    pub sites_count: usize,
}

/// Sites assigned to a window of consecutive days.
///
/// Serializes to the full document form:
/// `{"total_sites": N, "days": D, "schedule": {"day_1": {...}, ...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ScheduleDocument")]
pub struct Schedule {
    total_sites: usize,
    entries: Vec<DaySchedule>,
}

impl Schedule {
    pub fn total_sites(&self) -> usize {
        self.total_sites
    }

    pub fn days(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[DaySchedule] {
        &self.entries
    }

    /// Entry for a 1-based day index.
    pub fn day(&self, day_index: usize) -> Option<&DaySchedule> {
        day_index
            .checked_sub(1)
            .and_then(|idx| self.entries.get(idx))
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.entries.first().map(DaySchedule::date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.entries.last().map(DaySchedule::date)
    }

    pub fn summary(&self) -> ScheduleSummary {
        ScheduleSummary {
            total_sites: self.total_sites,
            entries: self.entries.iter().map(DaySchedule::summary).collect(),
        }
    }

    pub fn rows(&self) -> Vec<ScheduleRow> {
        self.entries.iter().map(DaySchedule::row).collect()
    }

    /// The summary as a table with `Day`, `Date`, `Day of Week` and
    /// `Sites Count` columns.
    pub fn summary_frame(&self) -> PolarsResult<DataFrame> {
        let days: Vec<i64> = self.entries.iter().map(|e| e.day_index as i64).collect();
        let dates: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.date.format(crate::calendar::DATE_FORMAT).to_string())
            .collect();
        let weekdays: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.day_of_week.clone())
            .collect();
        let counts: Vec<i64> = self.entries.iter().map(|e| e.sites_count as i64).collect();
        df!(
            "Day" => days,
            "Date" => dates,
            "Day of Week" => weekdays,
            "Sites Count" => counts
        )
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Schedule", 3)?;
        state.serialize_field("total_sites", &self.total_sites)?;
        state.serialize_field("days", &self.entries.len())?;
        state.serialize_field("schedule", &ByDayKey(&self.entries))?;
        state.end()
    }
}

/// Lightweight projection of a [`Schedule`] without site records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSummary {
    total_sites: usize,
    entries: Vec<DaySummary>,
}

impl ScheduleSummary {
    pub fn total_sites(&self) -> usize {
        self.total_sites
    }

    pub fn days(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[DaySummary] {
        &self.entries
    }
}

impl Serialize for ScheduleSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ScheduleSummary", 3)?;
        state.serialize_field("total_sites", &self.total_sites)?;
        state.serialize_field("days", &self.entries.len())?;
        state.serialize_field("summary", &ByDayKey(&self.entries))?;
        state.end()
    }
}

trait DayKeyed {
    fn day_index(&self) -> usize;
}

impl DayKeyed for DaySchedule {
    fn day_index(&self) -> usize {
        self.day_index
    }
}

impl DayKeyed for DaySummary {
    fn day_index(&self) -> usize {
        self.day_index
    }
}

/// Emits entries as a `day_N` keyed map in window order.
struct ByDayKey<'a, T>(&'a [T]);

impl<T: Serialize + DayKeyed> Serialize for ByDayKey<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in self.0 {
            map.serialize_entry(&day_key(entry.day_index()), entry)?;
        }
        map.end()
    }
}

fn day_key(day_index: usize) -> String {
    format!("day_{day_index}")
}

fn parse_day_key(key: &str) -> Option<usize> {
    key.strip_prefix("day_")?.parse().ok()
}

#[derive(Deserialize)]
struct DayDocument {
    date: NaiveDate,
    day_of_week: String,
    sites_count: usize,
    #[serde(default)]
    sites: Vec<Site>,
}

#[derive(Deserialize)]
struct ScheduleDocument {
    total_sites: usize,
    days: usize,
    schedule: BTreeMap<String, DayDocument>,
}

impl TryFrom<ScheduleDocument> for Schedule {
    type Error = ScheduleError;

    fn try_from(doc: ScheduleDocument) -> Result<Self, Self::Error> {
        if doc.days == 0 {
            return Err(ScheduleError::ZeroDays);
        }
        if doc.schedule.len() != doc.days {
            return Err(ScheduleError::SliceCountMismatch {
                expected: doc.days,
                actual: doc.schedule.len(),
            });
        }

        let mut ordered: Vec<Option<DayDocument>> = (0..doc.days).map(|_| None).collect();
        for (key, day) in doc.schedule {
            let slot = parse_day_key(&key)
                .filter(|idx| (1..=doc.days).contains(idx))
                .and_then(|idx| ordered.get_mut(idx - 1))
                .ok_or_else(|| ScheduleError::InvalidDocument(format!("unexpected key '{key}'")))?;
            if slot.replace(day).is_some() {
                return Err(ScheduleError::InvalidDocument(format!("duplicate key '{key}'")));
            }
        }
        let ordered: Vec<DayDocument> = ordered.into_iter().flatten().collect();

        let start = ordered
            .first()
            .map(|day| day.date)
            .ok_or(ScheduleError::ZeroDays)?;
        let expected_headers: Vec<(NaiveDate, String, usize)> = ordered
            .iter()
            .map(|day| (day.date, day.day_of_week.clone(), day.sites_count))
            .collect();
        let slices: Vec<Vec<Site>> = ordered.into_iter().map(|day| day.sites).collect();
        let schedule = ScheduleBuilder::new(start)
            .with_days(doc.days)
            .build(slices)?;

        for (entry, (date, day_of_week, sites_count)) in
            schedule.entries.iter().zip(expected_headers)
        {
            let key = day_key(entry.day_index);
            if entry.date != date {
                return Err(ScheduleError::InvalidDocument(format!(
                    "{key} has date {date}, expected {}",
                    entry.date
                )));
            }
            if entry.day_of_week != day_of_week {
                return Err(ScheduleError::InvalidDocument(format!(
                    "{key} is labelled {day_of_week}, but {date} is a {}",
                    entry.day_of_week
                )));
            }
            if entry.sites_count != sites_count {
                return Err(ScheduleError::InvalidDocument(format!(
                    "{key} declares {sites_count} sites but lists {}",
                    entry.sites_count
                )));
            }
        }
        if schedule.total_sites != doc.total_sites {
            return Err(ScheduleError::InvalidDocument(format!(
                "total_sites is {} but days list {}",
                doc.total_sites, schedule.total_sites
            )));
        }
        Ok(schedule)
    }
}

/// Pairs day slices with consecutive calendar dates starting at a fixed
/// date. The start date is always supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleBuilder {
    start_date: NaiveDate,
    days: usize,
}

impl ScheduleBuilder {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            days: DEFAULT_DAYS,
        }
    }

    pub fn with_days(mut self, days: usize) -> Self {
        self.days = days;
        self
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn days(&self) -> usize {
        self.days
    }

    /// Build from pre-partitioned slices; one slice per day, in day order.
    pub fn build(&self, slices: Vec<Vec<Site>>) -> Result<Schedule, ScheduleError> {
        self.check_window()?;
        if slices.len() != self.days {
            return Err(ScheduleError::SliceCountMismatch {
                expected: self.days,
                actual: slices.len(),
            });
        }
        let dates = consecutive_dates(self.start_date, self.days)?;
        let entries: Vec<DaySchedule> = dates
            .into_iter()
            .zip(slices)
            .enumerate()
            .map(|(idx, (date, sites))| DaySchedule::new(idx + 1, date, sites))
            .collect();
        let total_sites = entries.iter().map(DaySchedule::sites_count).sum();
        Ok(Schedule {
            total_sites,
            entries,
        })
    }

    /// Partition `sites` evenly over the window and build the schedule.
    pub fn build_from_sites(&self, sites: Vec<Site>) -> Result<Schedule, ScheduleError> {
        if sites.is_empty() {
            tracing::warn!(days = self.days, "no sites to distribute; every day will be empty");
        }
        self.check_window()?;
        let slices = partition_owned(sites, self.days)?;
        self.build(slices)
    }

    /// Rejects an empty window or one whose last day is past the calendar,
    /// before anything is sized by the day count.
    fn check_window(&self) -> Result<(), ScheduleError> {
        if self.days == 0 {
            return Err(ScheduleError::ZeroDays);
        }
        window_end(self.start_date, self.days)?;
        Ok(())
    }
}
