use super::{
    ApplyOutcome, PersistenceError, PersistenceResult, ScheduleRow, ScheduleSink, SiteSource,
};
use crate::calendar::{format_date, parse_date};
use crate::site::{Site, SiteId};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::path::Path;

/// SQLite-backed site pool and schedule table.
///
/// Active sites are those with `status = 1 AND is_deleted = 0`. Schedule
/// rows are unique per `apply_on`; writing a day that already exists
/// replaces its site list and leaves `is_added`/`log` untouched.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> PersistenceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS sites (
                site_id INTEGER PRIMARY KEY,
                site_url TEXT,
                site_name TEXT,
                status INTEGER NOT NULL DEFAULT 1,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                created_at TEXT
            );
            CREATE TABLE IF NOT EXISTS schedule_rows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                apply_on TEXT NOT NULL UNIQUE,
                list_sites TEXT NOT NULL,
                is_added INTEGER NOT NULL DEFAULT 0,
                log TEXT
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    /// Insert or update sites by `site_id`. Only integer ids fit the
    /// `sites` table.
    pub fn insert_sites(&self, sites: &[Site]) -> PersistenceResult<usize> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let written = Self::upsert_sites(&tx, sites)?;
        tx.commit()?;
        tracing::debug!(written, "upserted sites");
        Ok(written)
    }

    fn upsert_sites(tx: &Transaction, sites: &[Site]) -> PersistenceResult<usize> {
        let mut stmt = tx.prepare(
            "INSERT INTO sites (site_id, site_url, site_name, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(site_id) DO UPDATE SET
                site_url = excluded.site_url,
                site_name = excluded.site_name,
                status = excluded.status,
                created_at = excluded.created_at",
        )?;
        for site in sites {
            let SiteId::Int(id) = site.site_id else {
                return Err(PersistenceError::InvalidData(format!(
                    "site id '{}' is not an integer",
                    site.site_id
                )));
            };
            stmt.execute(params![
                id,
                site.site_url,
                site.site_name,
                site.status.unwrap_or(1),
                site.created_at
            ])?;
        }
        Ok(sites.len())
    }

    /// Soft-delete a site so it no longer takes part in distribution.
    pub fn delete_site(&self, site_id: i64) -> PersistenceResult<bool> {
        let conn = self.connection.lock();
        let changed = conn.execute(
            "UPDATE sites SET is_deleted = 1 WHERE site_id = ?1",
            params![site_id],
        )?;
        Ok(changed > 0)
    }

    pub fn find_by_apply_on(&self, apply_on: NaiveDate) -> PersistenceResult<Option<ScheduleRow>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT id, apply_on, list_sites, is_added, log
             FROM schedule_rows WHERE apply_on = ?1 LIMIT 1",
        )?;
        let raw = stmt
            .query_row(params![format_date(apply_on)], RawRow::from_row)
            .optional()?;
        raw.map(RawRow::into_schedule_row).transpose()
    }

    pub fn list_rows(&self) -> PersistenceResult<Vec<ScheduleRow>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT id, apply_on, list_sites, is_added, log
             FROM schedule_rows ORDER BY apply_on ASC",
        )?;
        let raw_rows = stmt.query_map([], RawRow::from_row)?;
        let mut rows = Vec::new();
        for raw in raw_rows {
            rows.push(raw?.into_schedule_row()?);
        }
        Ok(rows)
    }

    /// Mark the row for `apply_on` as applied and store the outcome log.
    pub fn record_applied(
        &self,
        apply_on: NaiveDate,
        outcome: &ApplyOutcome,
    ) -> PersistenceResult<ScheduleRow> {
        {
            let conn = self.connection.lock();
            let changed = conn.execute(
                "UPDATE schedule_rows SET is_added = 1, log = ?1 WHERE apply_on = ?2",
                params![outcome.log_message(), format_date(apply_on)],
            )?;
            if changed == 0 {
                return Err(PersistenceError::NotFound(apply_on));
            }
        }
        tracing::info!(%apply_on, failed = outcome.failed.len(), "recorded applied row");
        self.find_by_apply_on(apply_on)?
            .ok_or(PersistenceError::NotFound(apply_on))
    }
}

impl SiteSource for SqliteStore {
    fn fetch_sites(&self) -> PersistenceResult<Vec<Site>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT site_id, site_url, site_name, status, created_at
             FROM sites WHERE status = 1 AND is_deleted = 0
             ORDER BY site_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Site {
                site_id: SiteId::Int(row.get(0)?),
                site_url: row.get(1)?,
                site_name: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        let mut sites = Vec::new();
        for site in rows {
            sites.push(site?);
        }
        Ok(sites)
    }
}

impl ScheduleSink for SqliteStore {
    fn write_rows(&self, rows: &[ScheduleRow]) -> PersistenceResult<usize> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO schedule_rows (apply_on, list_sites, is_added, log)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(apply_on) DO UPDATE SET list_sites = excluded.list_sites",
            )?;
            for row in rows {
                stmt.execute(params![
                    format_date(row.apply_on),
                    row.list_sites_json()?,
                    row.is_added,
                    row.log
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }
}

struct RawRow {
    id: i64,
    apply_on: String,
    list_sites: String,
    is_added: bool,
    log: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            apply_on: row.get(1)?,
            list_sites: row.get(2)?,
            is_added: row.get(3)?,
            log: row.get(4)?,
        })
    }

    fn into_schedule_row(self) -> PersistenceResult<ScheduleRow> {
        let apply_on = parse_date(&self.apply_on)
            .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
        Ok(ScheduleRow {
            id: Some(self.id),
            apply_on,
            list_sites: ScheduleRow::parse_list_sites(&self.list_sites)?,
            is_added: self.is_added,
            log: self.log,
        })
    }
}
