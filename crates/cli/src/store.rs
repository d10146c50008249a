// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage for the pending-write queue.
//!
//! The queue lives behind a flat key-value boundary ([`KvStore`]) so the engine
//! does not care whether it ends up in files, a browser-style local store or
//! memory. [`QueueStore`] is the only component that touches it.
//!
//! Keys:
//! - `sync_queue` - JSON array of pending items, in processing order
//! - `sync_rejections` - permanent-rejection counts per item id
//! - `sync_dead_letters` - items removed from active retry

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fk_core::{SyncItem, SyncItemId};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::queue::DeadLetter;

pub const QUEUE_KEY: &str = "sync_queue";
pub const REJECTIONS_KEY: &str = "sync_rejections";
pub const DEAD_LETTERS_KEY: &str = "sync_dead_letters";

const LOCK_NAME: &str = "store.lock";

/// Flat key-value store that survives process restarts.
pub trait KvStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the value stored under `key`.
    ///
    /// Readers never observe a partially written value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// File-backed store: one `<key>.json` file per key in a directory.
pub struct FileStore {
    dir: PathBuf,
    /// Held for the lifetime of the store so only one process writes.
    /// `None` for read-only stores.
    lock: Option<File>,
}

impl FileStore {
    /// Opens or creates a store in `dir`.
    ///
    /// Fails with [`Error::StoreLocked`] if another process holds the store.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        use fs2::FileExt;

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dir.join(LOCK_NAME))?;
        lock.try_lock_exclusive()
            .map_err(|_| Error::StoreLocked(dir.clone()))?;

        Ok(FileStore {
            dir,
            lock: Some(lock),
        })
    }

    /// Opens `dir` for reading without taking the lock.
    ///
    /// Values are replaced by rename, so reads never see a half-written file
    /// even while another process holds the store. Every `set` fails.
    pub fn open_read_only(dir: impl AsRef<Path>) -> Self {
        FileStore {
            dir: dir.as_ref().to_path_buf(),
            lock: None,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.lock.is_none() {
            return Err(Error::Store(format!(
                "store at {} is open read-only",
                self.dir.display()
            )));
        }
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));

        // Write aside, fsync, then rename over the old value
        let mut file = File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;

        Ok(())
    }
}

/// In-memory store. Clones share contents, so a clone outlives an engine the
/// way a file outlives a process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| Error::Store("memory store poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Store("memory store poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to the persisted queue state.
#[derive(Clone)]
pub struct QueueStore {
    kv: Arc<dyn KvStore>,
}

impl QueueStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        QueueStore { kv }
    }

    /// Loads the pending queue. Missing or unreadable data yields an empty queue.
    pub fn load(&self) -> Vec<SyncItem> {
        self.load_or_default(QUEUE_KEY)
    }

    /// Overwrites the persisted queue.
    pub fn save(&self, items: &[SyncItem]) -> Result<()> {
        self.save_value(QUEUE_KEY, items)
    }

    /// Loads permanent-rejection counts.
    pub fn load_rejections(&self) -> HashMap<SyncItemId, u32> {
        self.load_or_default(REJECTIONS_KEY)
    }

    /// Overwrites permanent-rejection counts.
    pub fn save_rejections(&self, rejections: &HashMap<SyncItemId, u32>) -> Result<()> {
        self.save_value(REJECTIONS_KEY, rejections)
    }

    /// Loads the dead-letter list.
    pub fn load_dead_letters(&self) -> Vec<DeadLetter> {
        self.load_or_default(DEAD_LETTERS_KEY)
    }

    /// Overwrites the dead-letter list.
    pub fn save_dead_letters(&self, dead: &[DeadLetter]) -> Result<()> {
        self.save_value(DEAD_LETTERS_KEY, dead)
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let text = match self.kv.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => return T::default(),
            Err(e) => {
                tracing::warn!("failed to read {}, starting empty: {}", key, e);
                return T::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("discarding unreadable {}: {}", key, e);
                T::default()
            }
        }
    }

    fn save_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.kv.set(key, &json)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
