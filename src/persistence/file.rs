use super::{PersistenceError, PersistenceResult, SiteSource};
use crate::calendar::format_date;
use crate::schedule::{Schedule, ScheduleSummary};
use crate::site::{Site, SiteId};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub fn save_schedule_to_json<P: AsRef<Path>>(schedule: &Schedule, path: P) -> PersistenceResult<()> {
    write_pretty_json(schedule, path)
}

pub fn save_summary_to_json<P: AsRef<Path>>(
    summary: &ScheduleSummary,
    path: P,
) -> PersistenceResult<()> {
    write_pretty_json(summary, path)
}

/// Load a full schedule document; every day is re-checked against the
/// window it claims to describe.
pub fn load_schedule_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<Schedule> {
    let file = File::open(path)?;
    let schedule: Schedule = serde_json::from_reader(BufReader::new(file))?;
    Ok(schedule)
}

fn write_pretty_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> PersistenceResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct AssignmentCsvRecord<'a> {
    day: usize,
    date: String,
    day_of_week: &'a str,
    site_id: String,
    site_url: &'a str,
    site_name: &'a str,
}

/// One CSV line per site assignment, in day order.
pub fn save_schedule_to_csv<P: AsRef<Path>>(schedule: &Schedule, path: P) -> PersistenceResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for entry in schedule.entries() {
        let date = format_date(entry.date());
        for site in entry.sites() {
            writer.serialize(AssignmentCsvRecord {
                day: entry.day_index(),
                date: date.clone(),
                day_of_week: entry.day_of_week(),
                site_id: site.site_id.to_string(),
                site_url: site.site_url.as_deref().unwrap_or_default(),
                site_name: site.site_name.as_deref().unwrap_or_default(),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[derive(Deserialize)]
struct SiteCsvRecord {
    site_id: String,
    #[serde(default)]
    site_url: String,
    #[serde(default)]
    site_name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    created_at: String,
}

impl SiteCsvRecord {
    fn into_site(self) -> PersistenceResult<Site> {
        if self.site_id.trim().is_empty() {
            return Err(PersistenceError::InvalidData("site row without site_id".into()));
        }
        let Ok(site_id) = self.site_id.parse::<SiteId>();
        let status = if self.status.trim().is_empty() {
            None
        } else {
            Some(self.status.trim().parse::<i64>().map_err(|e| {
                PersistenceError::InvalidData(format!("invalid status '{}': {e}", self.status))
            })?)
        };
        Ok(Site {
            site_id,
            site_url: non_empty(self.site_url),
            site_name: non_empty(self.site_name),
            status,
            created_at: non_empty(self.created_at),
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Site list kept in a CSV file with a `site_id` column and optional
/// `site_url`, `site_name`, `status` and `created_at` columns. Rows are
/// returned in file order.
#[derive(Debug, Clone)]
pub struct CsvSiteSource {
    path: PathBuf,
}

impl CsvSiteSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl SiteSource for CsvSiteSource {
    fn fetch_sites(&self) -> PersistenceResult<Vec<Site>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut sites = Vec::new();
        for record in reader.deserialize::<SiteCsvRecord>() {
            sites.push(record?.into_site()?);
        }
        Ok(sites)
    }
}
