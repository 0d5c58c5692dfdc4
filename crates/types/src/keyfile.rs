//! Grouped key/value configuration file.
//!
//! Instance and main configuration files are organised in named groups
//! (`Icon`, `Desklet`, `System`, ...) each holding loosely-typed keys. The
//! on-disk representation is pretty-printed JSON; an optional top-level
//! `version` records which module version last wrote the file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::version::Version;

/// Errors raised while reading or writing a [`KeyFile`].
#[derive(Debug, thiserror::Error)]
pub enum KeyFileError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    groups: BTreeMap<String, BTreeMap<String, Value>>,
}

impl KeyFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a key file from disk.
    pub fn load(path: &Path) -> Result<Self, KeyFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| KeyFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| KeyFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the key file to disk, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), KeyFileError> {
        let io_err = |source| KeyFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| KeyFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// Load `path`, apply `edit`, and write it back.
    pub fn update_file<F>(path: &Path, edit: F) -> Result<(), KeyFileError>
    where
        F: FnOnce(&mut KeyFile),
    {
        let mut key_file = Self::load(path)?;
        edit(&mut key_file);
        key_file.save(path)
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn has_key(&self, group: &str, key: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|keys| keys.contains_key(key))
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn keys(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, group: &str, key: &str) -> Option<&Value> {
        self.groups.get(group).and_then(|keys| keys.get(key))
    }

    /// String value; numbers and booleans are stringified, empty strings are `None`.
    pub fn get_string(&self, group: &str, key: &str) -> Option<String> {
        match self.get(group, key)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn get_string_or(&self, group: &str, key: &str, default: &str) -> String {
        self.get_string(group, key)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_int_opt(&self, group: &str, key: &str) -> Option<i64> {
        match self.get(group, key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn get_int(&self, group: &str, key: &str, default: i64) -> i64 {
        self.get_int_opt(group, key).unwrap_or(default)
    }

    pub fn get_double_opt(&self, group: &str, key: &str) -> Option<f64> {
        match self.get(group, key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_double(&self, group: &str, key: &str, default: f64) -> f64 {
        self.get_double_opt(group, key).unwrap_or(default)
    }

    pub fn get_bool_opt(&self, group: &str, key: &str) -> Option<bool> {
        match self.get(group, key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn get_bool(&self, group: &str, key: &str, default: bool) -> bool {
        self.get_bool_opt(group, key).unwrap_or(default)
    }

    /// Numeric list, stored either as a JSON array or a `;`-separated string.
    pub fn get_double_list(&self, group: &str, key: &str) -> Option<Vec<f64>> {
        match self.get(group, key)? {
            Value::Array(items) => Some(items.iter().filter_map(Value::as_f64).collect()),
            Value::String(s) => Some(
                s.split(';')
                    .filter(|part| !part.trim().is_empty())
                    .filter_map(|part| part.trim().parse().ok())
                    .collect(),
            ),
            Value::Number(n) => n.as_f64().map(|v| vec![v]),
            _ => None,
        }
    }

    /// String list, stored either as a JSON array or a `;`-separated string.
    pub fn get_string_list(&self, group: &str, key: &str) -> Vec<String> {
        match self.get(group, key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => s
                .split(';')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Width/height pair read from `<prefix>width` and `<prefix>height`,
    /// falling back to a legacy combined `<prefix>size` key (`"48;48"`).
    ///
    /// Missing components are 0 so callers can apply their own defaults.
    pub fn get_size(&self, group: &str, prefix: &str) -> (i32, i32) {
        let width = self.get_int_opt(group, &format!("{prefix}width"));
        let height = self.get_int_opt(group, &format!("{prefix}height"));
        if width.is_some() || height.is_some() {
            return (width.unwrap_or(0) as i32, height.unwrap_or(0) as i32);
        }

        match self.get_double_list(group, &format!("{prefix}size")) {
            Some(values) => {
                let w = values.first().copied().unwrap_or(0.0) as i32;
                let h = values.get(1).copied().unwrap_or(w as f64) as i32;
                (w, h)
            }
            None => (0, 0),
        }
    }

    pub fn set_value(&mut self, group: &str, key: &str, value: Value) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn set_string(&mut self, group: &str, key: &str, value: &str) {
        self.set_value(group, key, Value::String(value.to_string()));
    }

    pub fn set_int(&mut self, group: &str, key: &str, value: i64) {
        self.set_value(group, key, Value::from(value));
    }

    pub fn set_double(&mut self, group: &str, key: &str, value: f64) {
        self.set_value(group, key, Value::from(value));
    }

    pub fn set_bool(&mut self, group: &str, key: &str, value: bool) {
        self.set_value(group, key, Value::Bool(value));
    }

    pub fn remove_key(&mut self, group: &str, key: &str) -> Option<Value> {
        self.groups.get_mut(group).and_then(|keys| keys.remove(key))
    }

    /// Whether the file was written by an older module version than `current`
    /// (or carries no version at all).
    pub fn is_older_than(&self, current: &str) -> bool {
        let Some(file_version) = self.version.as_deref() else {
            return true;
        };
        match (file_version.parse::<Version>(), current.parse::<Version>()) {
            (Ok(file), Ok(current)) => file < current,
            _ => file_version != current,
        }
    }

    /// Template keys overlaid with this file's values.
    ///
    /// Keys the template introduces are added with their defaults, keys the
    /// user already set keep their value. Groups or keys absent from the
    /// template are preserved too.
    pub fn merged_over(&self, template: &KeyFile) -> KeyFile {
        let mut merged = template.clone();
        for (group, keys) in &self.groups {
            for (key, value) in keys {
                merged.set_value(group, key, value.clone());
            }
        }
        merged.version = self.version.clone().or_else(|| template.version.clone());
        merged
    }
}
