use crate::error::CanvasError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field values keyed by field name. Missing keys read as the empty string.
///
/// The engine only borrows a record immutably, so its contents stay fixed for
/// the length of a generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRecord {
    values: BTreeMap<String, String>,
}

impl DataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parses a flat JSON object. Non-string scalars are stringified and `null`
    /// becomes the empty string; nested arrays or objects are rejected.
    pub fn from_json_str(raw: &str) -> Result<Self, CanvasError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| CanvasError::Configuration(format!("record json: {err}")))?;
        let serde_json::Value::Object(map) = value else {
            return Err(CanvasError::Configuration(
                "record json must be an object".to_string(),
            ));
        };
        let mut record = DataRecord::new();
        for (key, value) in map {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(CanvasError::Configuration(format!(
                        "record field '{key}' must be a scalar"
                    )));
                }
            };
            record.values.insert(key, text);
        }
        Ok(record)
    }

    pub fn from_json_path(path: &std::path::Path) -> Result<Self, CanvasError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DataRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
