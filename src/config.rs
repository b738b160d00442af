//! Configuration loaded from `kcb.toml`.
//!
//! [`KcbConfig`] holds every tunable value. Missing keys fall back to
//! defaults. `KCB_OLD_ACTIVE_JOB_MINUTES` takes precedence over the file.

use std::path::Path;

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

const OLD_ACTIVE_JOB_ENV: &str = "KCB_OLD_ACTIVE_JOB_MINUTES";

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

/// Source of global settings the job tracker consults.
pub trait GlobalConfigStore {
    /// Age after which a running job counts as stale.
    fn old_active_job_threshold(&self) -> Result<Duration, ConfigError>;
}

/// How long a job may sit in its current state before it counts as old.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldActiveJobThreshold {
    #[serde(default)]
    pub days: i64,
    #[serde(default)]
    pub hours: i64,
    #[serde(default)]
    pub minutes: i64,
}

impl Default for OldActiveJobThreshold {
    fn default() -> Self {
        Self {
            days: 1,
            hours: 0,
            minutes: 0,
        }
    }
}

impl OldActiveJobThreshold {
    pub fn from_minutes(total: i64) -> Self {
        Self {
            days: total / MINUTES_PER_DAY,
            hours: (total % MINUTES_PER_DAY) / MINUTES_PER_HOUR,
            minutes: total % MINUTES_PER_HOUR,
        }
    }

    pub fn total_minutes(&self) -> i64 {
        self.days * MINUTES_PER_DAY + self.hours * MINUTES_PER_HOUR + self.minutes
    }

    /// Rejects negative components and a zero total.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days < 0 || self.hours < 0 || self.minutes < 0 || self.total_minutes() == 0 {
            return Err(ConfigError::Invalid {
                key: "old_active_job".to_string(),
                value: format!("{}d {}h {}m", self.days, self.hours, self.minutes),
            });
        }
        Ok(())
    }
}

/// Top-level configuration loaded from `kcb.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct KcbConfig {
    #[serde(default)]
    pub old_active_job: OldActiveJobThreshold,

    /// Default tracing filter, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for KcbConfig {
    fn default() -> Self {
        Self {
            old_active_job: OldActiveJobThreshold::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl KcbConfig {
    /// Loads `kcb.toml` from the working directory, or defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("kcb.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<KcbConfig>(&contents)?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        if let Ok(raw) = std::env::var(OLD_ACTIVE_JOB_ENV)
            && !raw.is_empty()
        {
            config.apply_old_active_job_override(&raw)?;
        }

        config.old_active_job.validate()?;
        Ok(config)
    }

    fn apply_old_active_job_override(&mut self, raw: &str) -> Result<(), ConfigError> {
        let minutes = raw.trim().parse::<i64>().map_err(|_| ConfigError::Invalid {
            key: OLD_ACTIVE_JOB_ENV.to_string(),
            value: raw.to_string(),
        })?;
        self.old_active_job = OldActiveJobThreshold::from_minutes(minutes);
        Ok(())
    }
}

impl GlobalConfigStore for KcbConfig {
    fn old_active_job_threshold(&self) -> Result<Duration, ConfigError> {
        self.old_active_job.validate()?;
        Ok(Duration::minutes(self.old_active_job.total_minutes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = KcbConfig::default();
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.old_active_job.total_minutes(), 1440);
        assert_eq!(
            config.old_active_job_threshold().unwrap(),
            Duration::days(1)
        );
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            [old_active_job]
            hours = 2
            minutes = 30
        "#;
        let config: KcbConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.old_active_job.days, 0);
        assert_eq!(config.old_active_job.total_minutes(), 150);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn threshold_splits_back_into_units() {
        let threshold = OldActiveJobThreshold::from_minutes(1440 + 3 * 60 + 7);
        assert_eq!(threshold.days, 1);
        assert_eq!(threshold.hours, 3);
        assert_eq!(threshold.minutes, 7);
        assert_eq!(threshold.total_minutes(), 1627);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let zero = OldActiveJobThreshold {
            days: 0,
            hours: 0,
            minutes: 0,
        };
        assert!(matches!(zero.validate(), Err(ConfigError::Invalid { .. })));

        let config = KcbConfig {
            old_active_job: OldActiveJobThreshold {
                days: -1,
                hours: 0,
                minutes: 0,
            },
            ..KcbConfig::default()
        };
        assert!(config.old_active_job_threshold().is_err());
    }

    #[test]
    fn override_parses_minutes() {
        let mut config = KcbConfig::default();
        config.apply_old_active_job_override(" 90 ").unwrap();
        assert_eq!(config.old_active_job.hours, 1);
        assert_eq!(config.old_active_job.minutes, 30);

        let err = config.apply_old_active_job_override("soon").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_filter = \"kcb=debug\"").unwrap();
        writeln!(file, "[old_active_job]").unwrap();
        writeln!(file, "days = 2").unwrap();

        let config = KcbConfig::load_from(file.path()).unwrap();
        assert_eq!(config.log_filter, "kcb=debug");
        if std::env::var(OLD_ACTIVE_JOB_ENV).is_err() {
            assert_eq!(config.old_active_job.total_minutes(), 2880);
        }
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = KcbConfig::load_from(&dir.path().join("kcb.toml")).unwrap();
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn load_rejects_broken_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "old_active_job = [").unwrap();
        assert!(KcbConfig::load_from(file.path()).is_err());
    }
}
