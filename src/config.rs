use crate::calendar::{StartPolicy, today_at_offset};
use crate::schedule::DEFAULT_DAYS;
use chrono::NaiveDate;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "distributor.toml";
pub const ENV_PREFIX: &str = "DISTRIBUTOR_";
/// Japan Standard Time.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime settings (distributor.toml + DISTRIBUTOR_* env overrides;
/// nested keys use `__`, e.g. `DISTRIBUTOR_DATABASE__PATH`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributorConfig {
    #[serde(default = "default_days")]
    pub days: usize,
    #[serde(default)]
    pub start: StartPolicy,
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_schedule_path")]
    pub schedule_path: PathBuf,
    #[serde(default = "default_summary_path")]
    pub summary_path: PathBuf,
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            start: StartPolicy::default(),
            utc_offset_hours: default_utc_offset_hours(),
            database: DatabaseConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            schedule_path: default_schedule_path(),
            summary_path: default_summary_path(),
            csv_path: None,
        }
    }
}

impl DistributorConfig {
    /// Load from `path` (or `distributor.toml` in the working directory when
    /// absent; a missing file is not an error) and then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        Self::from_figment(
            Figment::from(Serialized::defaults(Self::default()))
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days == 0 {
            return Err(ConfigError::Invalid("days must be greater than zero".into()));
        }
        if !(-23..=23).contains(&self.utc_offset_hours) {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_hours {} is outside -23..=23",
                self.utc_offset_hours
            )));
        }
        Ok(())
    }

    /// First day of the window for a run happening now.
    pub fn start_date_now(&self) -> Result<NaiveDate, ConfigError> {
        let today = today_at_offset(self.utc_offset_hours).ok_or_else(|| {
            ConfigError::Invalid(format!("bad utc offset {}", self.utc_offset_hours))
        })?;
        Ok(self.start.resolve(today))
    }
}

fn default_days() -> usize {
    DEFAULT_DAYS
}

fn default_utc_offset_hours() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}

fn default_db_path() -> PathBuf {
    PathBuf::from("distributor.db")
}

fn default_schedule_path() -> PathBuf {
    PathBuf::from("schedule_output.json")
}

fn default_summary_path() -> PathBuf {
    PathBuf::from("schedule_summary.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_21_day_rolling_window() {
        let config = DistributorConfig::default();
        assert_eq!(config.days, 21);
        assert_eq!(config.start, StartPolicy::Today);
        assert_eq!(config.utc_offset_hours, 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_values_override_defaults() {
        let figment = Figment::from(Serialized::defaults(DistributorConfig::default())).merge(
            Toml::string(
                r#"
                days = 7
                start = "first_of_month"

                [database]
                path = "/tmp/sites.db"
                "#,
            ),
        );
        let config = DistributorConfig::from_figment(figment).unwrap();
        assert_eq!(config.days, 7);
        assert_eq!(config.start, StartPolicy::FirstOfMonth);
        assert_eq!(config.database.path, PathBuf::from("/tmp/sites.db"));
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn zero_days_is_rejected() {
        let figment = Figment::from(Serialized::defaults(DistributorConfig::default()))
            .merge(Toml::string("days = 0"));
        assert!(matches!(
            DistributorConfig::from_figment(figment),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn negative_days_fail_to_parse() {
        let figment = Figment::from(Serialized::defaults(DistributorConfig::default()))
            .merge(Toml::string("days = -3"));
        assert!(matches!(
            DistributorConfig::from_figment(figment),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let mut config = DistributorConfig::default();
        config.utc_offset_hours = 30;
        assert!(config.validate().is_err());
    }
}
