//! Persistent key/value storage for the commander list.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage format invalid: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Commit rejected")]
    CommitRejected,
}

/// Small key/value store committed as a whole.
///
/// Items are staged in memory with `add_item` and written out together by
/// `commit`. `fetch` replaces the staged items with what was last committed.
pub trait KeyValueStore: Send {
    /// Load committed items. Returns false when nothing usable is stored.
    fn fetch(&mut self) -> bool;
    fn add_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn commit(&mut self) -> Result<(), StorageError>;
    /// Staged items in insertion order.
    fn items(&self) -> Vec<(String, String)>;
    fn clear(&mut self);
    /// Invalidate the stored data so the next `fetch` finds nothing.
    fn mark_unused(&mut self) -> Result<(), StorageError>;
}

fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.contains(['=', '`']) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn upsert(items: &mut Vec<(String, String)>, key: &str, value: &str) {
    match items.iter_mut().find(|(k, _)| k == key) {
        Some((_, v)) => *v = value.to_string(),
        None => items.push((key.to_string(), value.to_string())),
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredItem {
    key: String,
    value: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredFile {
    in_use: bool,
    #[serde(default)]
    items: Vec<StoredItem>,
}

/// Store kept as a JSON document on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    items: Vec<(String, String)>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            items: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, file: &StoredFile) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(file)?;
        // replace in one step so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn fetch(&mut self) -> bool {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No commander store at {:?}: {}", self.path, e);
                return false;
            }
        };
        let file: StoredFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                debug!("Commander store {:?} unreadable: {}", self.path, e);
                return false;
            }
        };
        if !file.in_use {
            return false;
        }
        self.items = file.items.into_iter().map(|item| (item.key, item.value)).collect();
        true
    }

    fn add_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        check_key(key)?;
        upsert(&mut self.items, key, value);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let file = StoredFile {
            in_use: true,
            items: self
                .items
                .iter()
                .map(|(key, value)| StoredItem {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        self.write(&file)?;
        debug!("Committed {} item(s) to {:?}", self.items.len(), self.path);
        Ok(())
    }

    fn items(&self) -> Vec<(String, String)> {
        self.items.clone()
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn mark_unused(&mut self) -> Result<(), StorageError> {
        self.items.clear();
        self.write(&StoredFile::default())?;
        info!("Commander store {:?} marked unused", self.path);
        Ok(())
    }
}

/// In-memory store with a switch to make commits fail.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    staged: Vec<(String, String)>,
    committed: Option<Vec<(String, String)>>,
    fail_commit: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `numbers` as commanders.
    pub fn with_numbers(numbers: &[&str]) -> Self {
        let committed = numbers
            .iter()
            .enumerate()
            .map(|(i, n)| (format!("phone{}", i + 1), n.to_string()))
            .collect();
        Self {
            committed: Some(committed),
            ..Self::default()
        }
    }

    pub fn set_fail_commit(&mut self, fail: bool) {
        self.fail_commit = fail;
    }

    /// Last committed items, `None` when unused.
    pub fn committed(&self) -> Option<&[(String, String)]> {
        self.committed.as_deref()
    }
}

impl KeyValueStore for MemoryStore {
    fn fetch(&mut self) -> bool {
        match &self.committed {
            Some(items) => {
                self.staged = items.clone();
                true
            }
            None => false,
        }
    }

    fn add_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        check_key(key)?;
        upsert(&mut self.staged, key, value);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if self.fail_commit {
            return Err(StorageError::CommitRejected);
        }
        self.committed = Some(self.staged.clone());
        Ok(())
    }

    fn items(&self) -> Vec<(String, String)> {
        self.staged.clone()
    }

    fn clear(&mut self) {
        self.staged.clear();
    }

    fn mark_unused(&mut self) -> Result<(), StorageError> {
        self.staged.clear();
        self.committed = None;
        Ok(())
    }
}
