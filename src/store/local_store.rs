use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::store::StoreError;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const USER_DATA_KEY: &str = "user_data";
pub const ALERT_RULES_KEY: &str = "aqi_alert_rules";
pub const THEME_KEY: &str = "theme";
pub const ALERT_LAST_FIRED_KEY: &str = "aqi_alert_last_fired";

/// String-keyed durable key-value store backed by one JSON object on disk.
///
/// Nothing is cached: every read goes back to the file so that writes from
/// another process sharing the file are observed. Writes replace the whole
/// file atomically and the last writer wins.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: Arc<PathBuf>,
}

impl LocalStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let contents = match fs::read_to_string(self.path.as_path()) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    #[instrument(skip(self, entries), fields(path = %self.path.display(), keys = entries.len()))]
    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path.as_path())?;

        debug!("State file written");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    /// Removes `key`. Missing keys are not an error.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.remove_many(&[key])
    }

    /// Removes several keys in one write.
    pub fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        let before = entries.len();
        for key in keys {
            entries.remove(*key);
        }
        if entries.len() == before {
            return Ok(());
        }
        self.save(&entries)
    }

    /// Reads a value stored as serialized JSON text.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}
