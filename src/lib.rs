pub mod calendar;
pub mod config;
pub mod distributor;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod partition;
pub mod persistence;
pub mod schedule;
pub mod site;

pub use calendar::StartPolicy;
pub use config::{ConfigError, DistributorConfig};
pub use distributor::{DistributeError, Distribution, distribute, plan};
pub use partition::{day_sizes, partition, partition_owned};
pub use persistence::sqlite::SqliteStore;
pub use persistence::{
    ApplyOutcome, CsvSiteSource, LOG_MAX_LEN, PersistenceError, PersistenceResult, ScheduleRow,
    ScheduleSink, SiteSource, load_schedule_from_json, save_schedule_to_csv,
    save_schedule_to_json, save_summary_to_json,
};
pub use schedule::{
    DEFAULT_DAYS, DaySchedule, DaySummary, Schedule, ScheduleBuilder, ScheduleError,
    ScheduleSummary,
};
pub use site::{Site, SiteId};
