//! Storage backend implementations.
//!
//! - InMemoryStore: ephemeral storage for tests and one-shot runs
//! - FileStore: JSON file with hex-encoded keys and values

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key type for storage operations
pub type StorageKey = Vec<u8>;

/// Value type for storage operations
pub type StorageValue = Vec<u8>;

/// Trait for storage backends
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>>;

    /// Set a value for a key
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key, returning whether it existed
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// List keys with a given prefix, in key order
    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>>;

    /// Flush pending writes to persistent storage
    fn flush(&self) -> Result<()>;

    /// Clear all data
    fn clear(&self) -> Result<()>;
}

type Entries = BTreeMap<StorageKey, StorageValue>;

fn read_lock(entries: &RwLock<Entries>) -> Result<RwLockReadGuard<'_, Entries>> {
    entries
        .read()
        .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))
}

fn write_lock(entries: &RwLock<Entries>) -> Result<RwLockWriteGuard<'_, Entries>> {
    entries
        .write()
        .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))
}

fn keys_with_prefix(entries: &Entries, prefix: &[u8]) -> Vec<StorageKey> {
    entries
        .range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<Entries>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of entries
    pub fn len(&self) -> Result<usize> {
        Ok(read_lock(&self.entries)?.len())
    }

    /// Check if empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(read_lock(&self.entries)?.is_empty())
    }
}

impl StorageBackend for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(read_lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        write_lock(&self.entries)?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        Ok(write_lock(&self.entries)?.remove(key).is_some())
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let entries = read_lock(&self.entries)?;
        Ok(keys_with_prefix(&entries, prefix))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        write_lock(&self.entries)?.clear();
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BASED STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// File-based storage backend; all entries live in one JSON document
#[derive(Debug)]
pub struct FileStore {
    /// Directory holding the data file
    base_path: PathBuf,
    /// Working copy of the entries
    entries: RwLock<Entries>,
    /// Unflushed changes exist
    dirty: RwLock<bool>,
}

impl FileStore {
    /// Data file name inside the base directory
    pub const DATA_FILE: &'static str = "state.json";

    /// Open (or create) a file store in `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            Error::Storage(format!("failed to create {}: {}", base_path.display(), e))
        })?;

        let store = Self {
            entries: RwLock::new(BTreeMap::new()),
            dirty: RwLock::new(false),
            base_path,
        };
        store.load_from_disk()?;
        Ok(store)
    }

    /// Path of the data file
    pub fn data_file_path(&self) -> PathBuf {
        self.base_path.join(Self::DATA_FILE)
    }

    fn load_from_disk(&self) -> Result<()> {
        let path = self.data_file_path();
        if !path.exists() {
            return Ok(());
        }

        let file = File::open(&path)
            .map_err(|e| Error::Storage(format!("failed to open {}: {}", path.display(), e)))?;
        let encoded: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Deserialization(format!("{}: {}", path.display(), e)))?;

        let mut entries = write_lock(&self.entries)?;
        for (key_hex, value_hex) in encoded {
            let key = hex::decode(&key_hex)
                .map_err(|e| Error::Deserialization(format!("invalid key {}: {}", key_hex, e)))?;
            let value = hex::decode(&value_hex)
                .map_err(|e| Error::Deserialization(format!("invalid value for {}: {}", key_hex, e)))?;
            entries.insert(key, value);
        }
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the data file
    fn save_to_disk(&self) -> Result<()> {
        let encoded: BTreeMap<String, String> = read_lock(&self.entries)?
            .iter()
            .map(|(k, v)| (hex::encode(k), hex::encode(v)))
            .collect();

        let path = self.data_file_path();
        let tmp_path = path.with_extension("json.tmp");
        let file = File::create(&tmp_path)
            .map_err(|e| Error::Storage(format!("failed to create {}: {}", tmp_path.display(), e)))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &encoded)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| Error::Storage(format!("failed to write {}: {}", tmp_path.display(), e)))?;
        fs::rename(&tmp_path, &path)
            .map_err(|e| Error::Storage(format!("failed to replace {}: {}", path.display(), e)))?;

        self.set_dirty(false)
    }

    fn set_dirty(&self, value: bool) -> Result<()> {
        let mut dirty = self
            .dirty
            .write()
            .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))?;
        *dirty = value;
        Ok(())
    }

    fn is_dirty(&self) -> Result<bool> {
        self.dirty
            .read()
            .map(|d| *d)
            .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(read_lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        write_lock(&self.entries)?.insert(key.to_vec(), value.to_vec());
        self.set_dirty(true)
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let existed = write_lock(&self.entries)?.remove(key).is_some();
        if existed {
            self.set_dirty(true)?;
        }
        Ok(existed)
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let entries = read_lock(&self.entries)?;
        Ok(keys_with_prefix(&entries, prefix))
    }

    fn flush(&self) -> Result<()> {
        if self.is_dirty()? {
            self.save_to_disk()?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        write_lock(&self.entries)?.clear();
        self.set_dirty(true)
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush file store on drop");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED STORE WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Bincode-typed view over a storage backend
pub struct TypedStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> TypedStore<B> {
    /// Create a new typed store
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        self.backend
            .get(key)?
            .map(|data| {
                bincode::deserialize(&data).map_err(|e| {
                    Error::Deserialization(format!("{}: {}", String::from_utf8_lossy(key), e))
                })
            })
            .transpose()
    }

    /// Set a typed value
    pub fn set<T: Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        let data = bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.backend.set(key, &data)
    }

    /// Delete a value
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.backend.delete(key)
    }

    /// Check if a key exists
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.backend.exists(key)
    }

    /// List keys with prefix
    pub fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        self.backend.list_prefix(prefix)
    }

    /// Delete every key with a prefix
    pub fn delete_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let keys = self.backend.list_prefix(prefix)?;
        for key in &keys {
            self.backend.delete(key)?;
        }
        Ok(keys.len())
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Clear all data
    pub fn clear(&self) -> Result<()> {
        self.backend.clear()
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key prefixes for different data types
pub mod prefixes {
    /// Position data, keyed by account bytes
    pub const POSITION: &[u8] = b"pos:";
    /// Debt pool and liquidation statistics
    pub const POOL: &[u8] = b"pool:";
    /// Engine configuration and store metadata
    pub const CONFIG: &[u8] = b"cfg:";
    /// Price feed
    pub const PRICE: &[u8] = b"prc:";
    /// Debt-asset balances, keyed by account bytes
    pub const BALANCE: &[u8] = b"bal:";
}

/// Create a key with a prefix
pub fn make_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(prefix.len() + key.len());
    result.extend_from_slice(prefix);
    result.extend_from_slice(key);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new();

        store.set(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get(b"missing").unwrap(), None);

        assert!(store.exists(b"key1").unwrap());
        assert!(store.delete(b"key1").unwrap());
        assert!(!store.delete(b"key1").unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_prefix_listing_is_ordered() {
        let store = InMemoryStore::new();
        store.set(b"pos:b", b"2").unwrap();
        store.set(b"pos:a", b"1").unwrap();
        store.set(b"pool:state", b"3").unwrap();
        store.set(b"prc:feed", b"4").unwrap();

        let keys = store.list_prefix(prefixes::POSITION).unwrap();
        assert_eq!(keys, vec![b"pos:a".to_vec(), b"pos:b".to_vec()]);
        assert_eq!(store.list_prefix(prefixes::POOL).unwrap().len(), 1);
    }

    #[test]
    fn test_typed_store() {
        let store = TypedStore::new(InMemoryStore::new());

        store.set(b"number", &12345u128).unwrap();
        assert_eq!(store.get::<u128>(b"number").unwrap(), Some(12345));

        store.set(b"bal:1", &1u64).unwrap();
        store.set(b"bal:2", &2u64).unwrap();
        assert_eq!(store.delete_prefix(prefixes::BALANCE).unwrap(), 2);
        assert!(store.list_prefix(prefixes::BALANCE).unwrap().is_empty());
    }

    #[test]
    fn test_typed_store_corrupt_value() {
        let store = TypedStore::new(InMemoryStore::new());
        store.backend().set(b"cfg:engine", &[1]).unwrap();
        assert!(matches!(
            store.get::<u128>(b"cfg:engine"),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_make_key() {
        let key = make_key(prefixes::POSITION, b"12345");
        assert!(key.starts_with(b"pos:"));
        assert_eq!(&key[4..], b"12345");
    }

    #[test]
    fn test_file_store_persistence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().to_path_buf();

        {
            let store = FileStore::open(&path).unwrap();
            store.set(b"persistent", b"data").unwrap();
            store.flush().unwrap();
            assert!(store.data_file_path().exists());
        }

        {
            let store = FileStore::open(&path).unwrap();
            assert_eq!(store.get(b"persistent").unwrap(), Some(b"data".to_vec()));
            store.delete(b"persistent").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert!(store.get(b"persistent").unwrap().is_none());
    }

    #[test]
    fn test_file_store_prefix_listing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        store.set(&make_key(prefixes::POSITION, b"b"), b"2").unwrap();
        store.set(&make_key(prefixes::POSITION, b"a"), b"1").unwrap();
        store.set(&make_key(prefixes::CONFIG, b"engine"), b"3").unwrap();

        let keys = store.list_prefix(prefixes::POSITION).unwrap();
        assert_eq!(keys, vec![b"pos:a".to_vec(), b"pos:b".to_vec()]);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(FileStore::DATA_FILE), "not json").unwrap();
        assert!(matches!(
            FileStore::open(temp_dir.path()),
            Err(Error::Deserialization(_))
        ));
    }
}
