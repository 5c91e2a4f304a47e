use crate::persistence::{PersistenceError, ScheduleSink, SiteSource};
use crate::schedule::{Schedule, ScheduleBuilder, ScheduleError};
use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    #[error("step {step} failed: {source}")]
    Source {
        step: &'static str,
        #[source]
        source: PersistenceError,
    },
    #[error("step {step} failed: {source}")]
    Schedule {
        step: &'static str,
        #[source]
        source: ScheduleError,
    },
    #[error("step {step} failed: {source}")]
    Sink {
        step: &'static str,
        #[source]
        source: PersistenceError,
    },
}

impl DistributeError {
    pub fn step(&self) -> &'static str {
        match self {
            DistributeError::Source { step, .. }
            | DistributeError::Schedule { step, .. }
            | DistributeError::Sink { step, .. } => *step,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub schedule: Schedule,
    pub rows_written: usize,
}

pub const STEP_FETCH: &str = "get_all_sites";
pub const STEP_BUILD: &str = "build_schedule";
pub const STEP_PERSIST: &str = "insert_schedule";

fn run_step<T, E: Display>(
    name: &'static str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let span = tracing::info_span!("step", name);
    let _entered = span.enter();
    tracing::info!("start");
    match f() {
        Ok(value) => {
            tracing::info!("done");
            Ok(value)
        }
        Err(err) => {
            tracing::error!(error = %err, "failed");
            Err(err)
        }
    }
}

/// Fetch sites and build the schedule without writing anything.
pub fn plan<S>(source: &S, builder: &ScheduleBuilder) -> Result<Schedule, DistributeError>
where
    S: SiteSource + ?Sized,
{
    let sites = run_step(STEP_FETCH, || source.fetch_sites())
        .map_err(|err| DistributeError::Source {
            step: STEP_FETCH,
            source: err,
        })?;
    tracing::info!(sites = sites.len(), "fetched sites");

    let schedule = run_step(STEP_BUILD, || builder.build_from_sites(sites))
        .map_err(|err| DistributeError::Schedule {
            step: STEP_BUILD,
            source: err,
        })?;
    tracing::info!(
        total_sites = schedule.total_sites(),
        days = schedule.days(),
        start = ?schedule.start_date(),
        end = ?schedule.end_date(),
        "built schedule"
    );
    Ok(schedule)
}

/// Full run: fetch, build, then persist one row per day. Nothing reaches
/// the sink unless the schedule was built successfully.
pub fn distribute<S, K>(
    source: &S,
    sink: &K,
    builder: &ScheduleBuilder,
) -> Result<Distribution, DistributeError>
where
    S: SiteSource + ?Sized,
    K: ScheduleSink + ?Sized,
{
    let schedule = plan(source, builder)?;
    let rows = schedule.rows();
    let rows_written = run_step(STEP_PERSIST, || sink.write_rows(&rows))
        .map_err(|err| DistributeError::Sink {
            step: STEP_PERSIST,
            source: err,
        })?;
    tracing::info!(
        rows_written,
        total_sites = schedule.total_sites(),
        "distribution completed"
    );
    Ok(Distribution {
        schedule,
        rows_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{PersistenceResult, ScheduleRow};
    use crate::site::Site;
    use chrono::NaiveDate;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        rows: RefCell<Vec<ScheduleRow>>,
    }

    impl ScheduleSink for RecordingSink {
        fn write_rows(&self, rows: &[ScheduleRow]) -> PersistenceResult<usize> {
            self.rows.borrow_mut().extend_from_slice(rows);
            Ok(rows.len())
        }
    }

    struct FailingSource;

    impl SiteSource for FailingSource {
        fn fetch_sites(&self) -> PersistenceResult<Vec<Site>> {
            Err(PersistenceError::InvalidData("connection refused".into()))
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn invalid_builder_writes_nothing() {
        let sites: Vec<Site> = (1..=5).map(Site::new).collect();
        let sink = RecordingSink::default();
        let builder = ScheduleBuilder::new(start()).with_days(0);

        let err = distribute(&sites, &sink, &builder).unwrap_err();
        assert_eq!(err.step(), STEP_BUILD);
        assert!(sink.rows.borrow().is_empty());
    }

    #[test]
    fn source_failures_propagate_unchanged() {
        let sink = RecordingSink::default();
        let err = distribute(&FailingSource, &sink, &ScheduleBuilder::new(start())).unwrap_err();
        match err {
            DistributeError::Source { step, source } => {
                assert_eq!(step, STEP_FETCH);
                assert!(source.to_string().contains("connection refused"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(sink.rows.borrow().is_empty());
    }

    #[test]
    fn one_row_per_day_is_written() {
        let sites: Vec<Site> = (1..=30).map(Site::new).collect();
        let sink = RecordingSink::default();
        let result = distribute(&sites, &sink, &ScheduleBuilder::new(start())).unwrap();
        assert_eq!(result.rows_written, 21);

        let rows = sink.rows.borrow();
        assert_eq!(rows.len(), 21);
        assert_eq!(rows[0].list_sites.len(), 2);
        assert_eq!(rows[20].list_sites.len(), 1);
        assert_eq!(rows[20].apply_on, NaiveDate::from_ymd_opt(2024, 1, 21).unwrap());
    }
}
