//! Local key-value persistence.
//!
//! Everything lives under one key as a single JSON document; writes replace
//! the whole document and the last write wins.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::model::{Account, AdAccount, CloudinarySettings, Thumbnail};

pub const DATA_KEY: &str = "data";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt store document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store document at {0} is not a JSON object")]
    NotAnObject(PathBuf),
    #[error("store lock poisoned")]
    Poisoned,
}

pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn write(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Starts empty and lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// A JSON object on disk; each key is a top-level field. A missing file
/// reads as empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn load_document(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject(self.path.clone())),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load_document()?.remove(key))
    }

    fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut doc = self.load_document()?;
        doc.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // Replace the document in one rename so a crash never leaves it half written.
        let staged = self.staging_path();
        fs::write(&staged, serde_json::to_string_pretty(&Value::Object(doc))?)?;
        fs::rename(&staged, &self.path)?;
        Ok(())
    }
}

/// The document stored under [`DATA_KEY`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppData {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub ad_accounts: Vec<AdAccount>,
    #[serde(default)]
    pub cloudinary: CloudinarySettings,
    #[serde(default)]
    pub images: Vec<Thumbnail>,
}

impl AppData {
    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }
}

pub fn load(store: &dyn KeyValueStore) -> Result<AppData, StoreError> {
    match store.read(DATA_KEY)? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(AppData::default()),
    }
}

pub fn save(store: &dyn KeyValueStore, data: &AppData) -> Result<(), StoreError> {
    store.write(DATA_KEY, serde_json::to_value(data)?)
}

fn update<T>(
    store: &dyn KeyValueStore,
    f: impl FnOnce(&mut AppData) -> T,
) -> Result<T, StoreError> {
    let mut data = load(store)?;
    let out = f(&mut data);
    save(store, &data)?;
    Ok(out)
}

/// Link an account. Returns `false` when one with the same id already exists;
/// the stored entry is kept.
pub fn add_account(store: &dyn KeyValueStore, account: Account) -> Result<bool, StoreError> {
    update(store, |data| {
        if data.accounts.iter().any(|a| a.id == account.id) {
            return false;
        }
        data.accounts.push(account);
        true
    })
}

pub fn remove_account(store: &dyn KeyValueStore, id: &str) -> Result<bool, StoreError> {
    update(store, |data| {
        let before = data.accounts.len();
        data.accounts.retain(|a| a.id != id);
        data.accounts.len() != before
    })
}

pub fn set_ad_accounts(store: &dyn KeyValueStore, ad_accounts: Vec<AdAccount>) -> Result<(), StoreError> {
    update(store, |data| data.ad_accounts = ad_accounts)
}

pub fn setup_cloudinary(store: &dyn KeyValueStore, settings: CloudinarySettings) -> Result<(), StoreError> {
    update(store, |data| data.cloudinary = settings)
}

pub fn set_cloud_name(store: &dyn KeyValueStore, cloud_name: &str) -> Result<(), StoreError> {
    update(store, |data| data.cloudinary.cloud_name = Some(cloud_name.to_string()))
}

pub fn set_preset(store: &dyn KeyValueStore, preset: &str) -> Result<(), StoreError> {
    update(store, |data| data.cloudinary.preset = Some(preset.to_string()))
}

pub fn add_image(store: &dyn KeyValueStore, image: Thumbnail) -> Result<(), StoreError> {
    update(store, |data| data.images.push(image))
}

/// Remove the first image with `id`; the document is left untouched when
/// none matches.
pub fn remove_image(store: &dyn KeyValueStore, id: &str) -> Result<bool, StoreError> {
    let mut data = load(store)?;
    let Some(idx) = data.images.iter().position(|img| img.id == id) else {
        return Ok(false);
    };
    data.images.remove(idx);
    save(store, &data)?;
    Ok(true)
}
