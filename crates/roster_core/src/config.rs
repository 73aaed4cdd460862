//! Runtime configuration for roster entry points.
//!
//! # Responsibility
//! - Describe storage, logging, registration and enrolment settings in one
//!   struct.
//! - Load settings from JSON and `ROSTER_*` environment overrides.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - A loaded config has passed `validate()`.

use crate::logging::{default_log_level, normalize_level};
use crate::service::class_service::DEFAULT_MAX_STUDENTS_PER_CLASS;
use crate::service::registration_service::DuplicatePolicy;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB_PATH: &str = "ROSTER_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "ROSTER_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "ROSTER_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ROSTER_LOG_DIR";
pub const ENV_DUPLICATE_POLICY: &str = "ROSTER_DUPLICATE_POLICY";
pub const ENV_MAX_STUDENTS_PER_CLASS: &str = "ROSTER_MAX_STUDENTS_PER_CLASS";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration loading error.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidValue {
        key: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::InvalidValue { key, message } => write!(f, "invalid `{key}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

/// Roster runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RosterConfig {
    /// SQLite file. `None` leaves the choice to the entry point.
    pub db_path: Option<PathBuf>,
    /// Upper bound on waiting for a database lock.
    pub busy_timeout_ms: u64,
    pub log_level: String,
    /// Absolute log directory. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    pub duplicate_policy: DuplicatePolicy,
    /// Enrolment limit of one class.
    pub max_students_per_class: u32,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_level: default_log_level().to_string(),
            log_dir: None,
            duplicate_policy: DuplicatePolicy::default(),
            max_students_per_class: DEFAULT_MAX_STUDENTS_PER_CLASS,
        }
    }
}

impl RosterConfig {
    /// Parses a JSON document; absent keys keep their defaults.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    /// Applies `ROSTER_*` process environment overrides.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides resolved by `lookup`, keyed by `ROSTER_*` names.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(value.trim()));
        }
        if let Some(value) = get(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms =
                value
                    .trim()
                    .parse()
                    .map_err(|err| ConfigError::InvalidValue {
                        key: ENV_BUSY_TIMEOUT_MS,
                        message: format!("`{value}` is not a millisecond count: {err}"),
                    })?;
        }
        if let Some(value) = get(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        if let Some(value) = get(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(value.trim()));
        }
        if let Some(value) = get(ENV_DUPLICATE_POLICY) {
            self.duplicate_policy =
                value
                    .parse()
                    .map_err(|message| ConfigError::InvalidValue {
                        key: ENV_DUPLICATE_POLICY,
                        message,
                    })?;
        }

        if let Some(value) = get(ENV_MAX_STUDENTS_PER_CLASS) {
            self.max_students_per_class =
                value
                    .trim()
                    .parse()
                    .map_err(|err| ConfigError::InvalidValue {
                        key: ENV_MAX_STUDENTS_PER_CLASS,
                        message: format!("`{value}` is not a student count: {err}"),
                    })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Checks cross-field constraints and normalizes the log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "busy_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.max_students_per_class == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_students_per_class",
                message: "must be greater than zero".to_string(),
            });
        }
        normalize_level(&self.log_level).map_err(|message| ConfigError::InvalidValue {
            key: "log_level",
            message,
        })?;
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, RosterConfig, ENV_BUSY_TIMEOUT_MS, ENV_DUPLICATE_POLICY,
        ENV_MAX_STUDENTS_PER_CLASS,
    };
    use crate::service::registration_service::DuplicatePolicy;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_json_uses_defaults() {
        let config = RosterConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RosterConfig::default());
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_students_per_class, 30);
    }

    #[test]
    fn json_fields_are_applied() {
        let config = RosterConfig::from_json_str(
            r#"{"db_path": "/tmp/roster.db", "busy_timeout_ms": 250, "duplicate_policy": "reject"}"#,
        )
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/roster.db")));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
    }

    #[test]
    fn unknown_json_field_is_rejected() {
        let err = RosterConfig::from_json_str(r#"{"db_host": "localhost"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn overrides_replace_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BUSY_TIMEOUT_MS, "1200"),
            (ENV_DUPLICATE_POLICY, "reject"),
            (ENV_MAX_STUDENTS_PER_CLASS, "12"),
        ]);
        let config = RosterConfig::default()
            .apply_overrides(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.busy_timeout_ms, 1200);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.max_students_per_class, 12);
    }

    #[test]
    fn class_size_must_be_positive() {
        let err = RosterConfig::default()
            .apply_overrides(|key| (key == ENV_MAX_STUDENTS_PER_CLASS).then(|| "0".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("max_students_per_class"));

        let config = RosterConfig::from_json_str(r#"{"max_students_per_class": 45}"#).unwrap();
        assert_eq!(config.max_students_per_class, 45);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let err = RosterConfig::default()
            .apply_overrides(|key| (key == ENV_BUSY_TIMEOUT_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_BUSY_TIMEOUT_MS,
                ..
            }
        ));

        let err = RosterConfig::from_json_str(r#"{"busy_timeout_ms": 0}"#).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));

        let err = RosterConfig::from_json_str(r#"{"log_level": "loud"}"#).unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }
}
