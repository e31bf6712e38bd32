//! Typed settings parsed from the free-form option maps.

use serde::Deserialize;
use unitwork::{ConfigError, OptionMap};

const PROVIDER_KEYS: &[&str] = &["busy_timeout_ms", "pool_max_size", "wal", "foreign_keys"];
const SESSION_KEYS: &[&str] = &["behavior", "query_only"];

/// Provider-level tunables, taken from the `provider_options` map.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqliteProviderSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,

    /// Whether to put the database in WAL journal mode.
    pub wal: bool,

    /// Whether to enforce foreign key constraints.
    pub foreign_keys: bool,
}

impl Default for SqliteProviderSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
            wal: true,
            foreign_keys: true,
        }
    }
}

impl SqliteProviderSettings {
    /// Parses provider options, rejecting unknown keys by name.
    pub fn from_options(options: &OptionMap) -> Result<Self, ConfigError> {
        options.expect_keys(PROVIDER_KEYS)?;
        options.parse_into()
    }
}

/// How a session's transaction takes its locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionBehavior {
    /// Take locks lazily, on first read or write.
    #[default]
    Deferred,
    /// Take the write lock up front.
    Immediate,
    /// Take an exclusive lock up front.
    Exclusive,
}

impl TransactionBehavior {
    pub(crate) fn begin_sql(self) -> &'static str {
        match self {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// Session-level settings, taken from the merged session option map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqliteSessionSettings {
    /// Transaction locking behavior for the session.
    pub behavior: TransactionBehavior,

    /// Puts the connection in query-only mode for the session's lifetime;
    /// writes fail. Reset when the connection returns to the pool.
    pub query_only: bool,
}

impl SqliteSessionSettings {
    /// Parses session options, rejecting unknown keys by name.
    pub fn from_options(options: &OptionMap) -> Result<Self, ConfigError> {
        options.expect_keys(SESSION_KEYS)?;
        options.parse_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_defaults() {
        let settings =
            SqliteProviderSettings::from_options(&OptionMap::new()).expect("empty map is valid");
        assert_eq!(settings, SqliteProviderSettings::default());
        assert!(settings.wal);
        assert_eq!(settings.pool_max_size, 8);
    }

    #[test]
    fn provider_rejects_unknown_keys_by_name() {
        let options = OptionMap::new().with("pool_max_szie", 4);
        let err = SqliteProviderSettings::from_options(&options).expect_err("typo key");
        match err {
            ConfigError::UnknownKey { key } => assert_eq!(key, "pool_max_szie"),
            other => panic!("expected UnknownKey, got: {other}"),
        }
    }

    #[test]
    fn session_behavior_parses_lowercase_names() {
        let options = OptionMap::new().with("behavior", "immediate");
        let settings = SqliteSessionSettings::from_options(&options).expect("valid options");
        assert_eq!(settings.behavior, TransactionBehavior::Immediate);
        assert!(!settings.query_only);
    }

    #[test]
    fn session_rejects_bad_values() {
        let options = OptionMap::new().with("behavior", "yolo");
        let err = SqliteSessionSettings::from_options(&options).expect_err("bad variant");
        assert!(matches!(err, ConfigError::InvalidOptions(_)));
    }
}
