use std::collections::BTreeMap;

use crate::foundation::error::{LucentError, LucentResult};

/// Flat key-value configuration bag.
///
/// Values are JSON scalars; typed getters reject present-but-mistyped
/// values instead of silently falling back to defaults.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Properties {
    values: BTreeMap<String, serde_json::Value>,
}

impl Properties {
    /// Empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Set `key` to a JSON scalar value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`Properties::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Integer value of `key`, if present.
    pub fn get_i64(&self, key: &str) -> LucentResult<Option<i64>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or_else(|| {
                LucentError::validation(format!("property '{key}' must be an integer"))
            }),
        }
    }

    /// Float value of `key`, if present. Integers coerce.
    pub fn get_f32(&self, key: &str) -> LucentResult<Option<f32>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) => v.as_f64().map(|f| Some(f as f32)).ok_or_else(|| {
                LucentError::validation(format!("property '{key}' must be a number"))
            }),
        }
    }

    /// String value of `key`, if present.
    pub fn get_str(&self, key: &str) -> LucentResult<Option<&str>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| {
                LucentError::validation(format!("property '{key}' must be a string"))
            }),
        }
    }
}
