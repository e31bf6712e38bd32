//! Deserializable configuration for the session layer.

use serde::Deserialize;

use crate::options::OptionMap;
use crate::scope::SessionManagerBuilder;

/// The session layer's configuration surface, as it appears in a config
/// file (e.g. a `[database]` table in TOML).
///
/// Unknown keys are rejected at deserialization time: a typo in a config
/// file fails startup with an error naming the key, rather than being
/// silently ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Connection descriptor handed to the backend connector.
    pub connection_target: Option<String>,

    /// Backend-specific provider construction options.
    pub provider_options: OptionMap,

    /// Session options applied to every session unless overridden per scope.
    pub default_session_options: OptionMap,

    /// Whether owning scopes commit on clean exit.
    pub commit_on_exit: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection_target: None,
            provider_options: OptionMap::new(),
            default_session_options: OptionMap::new(),
            commit_on_exit: true,
        }
    }
}

impl SessionConfig {
    /// Converts the config into a manager builder carrying its values.
    pub fn into_builder(self) -> SessionManagerBuilder {
        let mut builder = crate::SessionManager::builder()
            .provider_options(self.provider_options)
            .default_session_options(self.default_session_options)
            .commit_on_exit(self.commit_on_exit);
        if let Some(target) = self.connection_target {
            builder = builder.connection_target(target);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_commit_on_exit() {
        let config: SessionConfig = serde_json::from_str("{}").expect("empty config is valid");
        assert!(config.commit_on_exit);
        assert!(config.connection_target.is_none());
        assert!(config.provider_options.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected_by_name() {
        let err = serde_json::from_str::<SessionConfig>(r#"{"connection_tagret": "x.db"}"#)
            .expect_err("typo key should be rejected");
        assert!(
            err.to_string().contains("connection_tagret"),
            "error should name the offending key: {err}"
        );
    }
}
