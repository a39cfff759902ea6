//! Storage backend trait and its implementations.
//!
//! A backend is a flat string-to-string map, the same shape as a browser's
//! `sessionStorage`/`localStorage`. Backends are shared and unsynchronized with
//! respect to other users of the same store; callers keep out of each other's
//! way with key prefixes.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use crate::db::Database;

/// Trait for key/value storage backends.
pub trait Storage: Send + Sync {
  /// Get the raw value stored under `key`.
  fn get_item(&self, key: &str) -> Result<Option<String>>;

  /// Store `value` under `key`, replacing any previous value.
  fn set_item(&self, key: &str, value: &str) -> Result<()>;

  /// Remove `key`. Removing a missing key is not an error.
  fn remove_item(&self, key: &str) -> Result<()>;

  /// Every key currently stored, from every user of this backend.
  fn keys(&self) -> Result<Vec<String>>;
}

/// Fail a write that would push the store past `quota` bytes.
fn check_quota(quota: Option<u64>, used: u64, key: &str, value: &str) -> Result<()> {
  let Some(quota) = quota else {
    return Ok(());
  };
  let needed = used + key.len() as u64 + value.len() as u64;
  if needed > quota {
    return Err(eyre!(
      "Storage quota exceeded: {} bytes needed, {} allowed",
      needed,
      quota
    ));
  }
  Ok(())
}

/// Backend for an execution context with no persistence at all.
/// Every operation fails; the tier cache turns that into misses and dropped writes.
pub struct UnavailableStorage;

impl Storage for UnavailableStorage {
  fn get_item(&self, _key: &str) -> Result<Option<String>> {
    Err(eyre!("Storage backend unavailable"))
  }

  fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
    Err(eyre!("Storage backend unavailable"))
  }

  fn remove_item(&self, _key: &str) -> Result<()> {
    Err(eyre!("Storage backend unavailable"))
  }

  fn keys(&self) -> Result<Vec<String>> {
    Err(eyre!("Storage backend unavailable"))
  }
}

/// In-process storage that lives as long as the process does.
#[derive(Default)]
pub struct MemoryStorage {
  items: Mutex<BTreeMap<String, String>>,
  quota_bytes: Option<u64>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Limit total stored bytes (keys plus values).
  pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
    self.quota_bytes = quota_bytes;
    self
  }
}

impl Storage for MemoryStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let mut items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let used: u64 = items
      .iter()
      .filter(|(k, _)| k.as_str() != key)
      .map(|(k, v)| (k.len() + v.len()) as u64)
      .sum();
    check_quota(self.quota_bytes, used, key, value)?;

    items.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let mut items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    items.remove(key);
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.keys().cloned().collect())
  }
}

/// SQLite-based storage; survives process restarts.
pub struct SqliteStorage {
  db: Mutex<Database>,
  quota_bytes: Option<u64>,
}

impl SqliteStorage {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    Ok(Self {
      db: Mutex::new(Database::open(path)?),
      quota_bytes: None,
    })
  }

  /// Open a private in-memory store.
  pub fn open_in_memory() -> Result<Self> {
    Ok(Self {
      db: Mutex::new(Database::open_in_memory()?),
      quota_bytes: None,
    })
  }

  /// Limit total stored bytes (keys plus values).
  pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
    self.quota_bytes = quota_bytes;
    self
  }
}

impl Storage for SqliteStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let db = self.db.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    db.conn()
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read key '{}': {}", key, e))
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let db = self.db.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let conn = db.conn();

    if self.quota_bytes.is_some() {
      let used: i64 = conn
        .query_row(
          "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
           FROM kv_store WHERE key != ?",
          params![key],
          |row| row.get(0),
        )
        .map_err(|e| eyre!("Failed to measure storage usage: {}", e))?;
      check_quota(self.quota_bytes, used.max(0) as u64, key, value)?;
    }

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store key '{}': {}", key, e))?;

    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let db = self.db.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    db.conn()
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove key '{}': {}", key, e))?;

    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let db = self.db.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = db
      .conn()
      .prepare("SELECT key FROM kv_store ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare key query: {}", e))?;

    let keys = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list keys: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read key: {}", e))?;

    Ok(keys)
  }
}
