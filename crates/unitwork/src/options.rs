//! Free-form option maps for provider and session construction.
//!
//! Options are deliberately untyped at this layer. Each backend declares the
//! keys it understands and rejects anything it does not recognise, by name,
//! at construction time — unknown keys are never silently dropped.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// An ordered name → value option map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionMap(BTreeMap<String, Value>);

impl OptionMap {
    /// Creates an empty option map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no options are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value for `key`, if set.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Iterates over the option keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns a copy of `self` with `overrides` applied on top.
    ///
    /// Overrides win key by key; keys absent from `overrides` keep the
    /// value from `self`.
    pub fn merged_with(&self, overrides: &OptionMap) -> OptionMap {
        let mut merged = self.0.clone();
        for (key, value) in &overrides.0 {
            merged.insert(key.clone(), value.clone());
        }
        OptionMap(merged)
    }

    /// Rejects any key not present in `allowed`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] naming the first offending key.
    pub fn expect_keys(&self, allowed: &[&str]) -> Result<(), ConfigError> {
        for key in self.0.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(ConfigError::UnknownKey { key: key.clone() });
            }
        }
        Ok(())
    }

    /// Deserializes the map into a typed settings struct.
    ///
    /// Callers should run [`expect_keys`](Self::expect_keys) first so that
    /// unknown keys surface as [`ConfigError::UnknownKey`] rather than a
    /// generic deserialization message.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOptions`] when a value has the wrong
    /// shape for the target struct.
    pub fn parse_into<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let object = Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        serde_json::from_value(object).map_err(|e| ConfigError::InvalidOptions(e.to_string()))
    }
}
