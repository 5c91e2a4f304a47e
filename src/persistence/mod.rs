use crate::schedule::ScheduleError;
use crate::site::{Site, SiteId};
use chrono::NaiveDate;
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use std::io;

/// Upper bound on the free-text `log` column of a schedule row.
pub const LOG_MAX_LEN: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("dataframe conversion error: {0}")]
    DataFrame(#[from] PolarsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("no schedule row for {0}")]
    NotFound(NaiveDate),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Supplies the ordered pool of active sites to distribute.
pub trait SiteSource {
    fn fetch_sites(&self) -> PersistenceResult<Vec<Site>>;
}

/// Receives one row per scheduled day.
pub trait ScheduleSink {
    /// Persist `rows`, returning how many were written. A row must never be
    /// observable half-written.
    fn write_rows(&self, rows: &[ScheduleRow]) -> PersistenceResult<usize>;
}

impl SiteSource for Vec<Site> {
    fn fetch_sites(&self) -> PersistenceResult<Vec<Site>> {
        Ok(self.clone())
    }
}

/// Persisted form of one day: the sites to add on `apply_on`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub apply_on: NaiveDate,
    pub list_sites: Vec<SiteId>,
    pub is_added: bool,
    #[serde(default)]
    pub log: Option<String>,
}

impl ScheduleRow {
    pub fn pending(apply_on: NaiveDate, list_sites: Vec<SiteId>) -> Self {
        Self {
            id: None,
            apply_on,
            list_sites,
            is_added: false,
            log: None,
        }
    }

    /// `list_sites` as stored: a plain JSON array such as `[1,2,3]`.
    pub fn list_sites_json(&self) -> PersistenceResult<String> {
        Ok(serde_json::to_string(&self.list_sites)?)
    }

    pub fn parse_list_sites(json: &str) -> PersistenceResult<Vec<SiteId>> {
        serde_json::from_str(json)
            .map_err(|err| PersistenceError::InvalidData(format!("invalid list_sites '{json}': {err}")))
    }
}

/// Result of applying one day's sites downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub succeeded: usize,
    pub failed: Vec<SiteId>,
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Text stored in the row's `log` column, capped at [`LOG_MAX_LEN`].
    pub fn log_message(&self) -> String {
        if self.is_success() {
            return "Success all".to_string();
        }
        let failed = serde_json::to_string(&self.failed).unwrap_or_else(|_| "[]".to_string());
        truncate_log(format!("Errors: {failed}"))
    }
}

pub fn truncate_log(mut message: String) -> String {
    if message.chars().count() > LOG_MAX_LEN {
        message = message.chars().take(LOG_MAX_LEN).collect();
    }
    message
}

pub mod file;
pub mod sqlite;

pub use file::{
    CsvSiteSource, load_schedule_from_json, save_schedule_to_csv, save_schedule_to_json,
    save_summary_to_json,
};
