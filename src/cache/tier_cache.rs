//! Expiring, optionally size-bounded key/value cache over a storage tier.
//!
//! Every public operation is fail-soft: storage errors, quota failures and
//! unreadable entries never reach the caller. Reads degrade to `None`, writes
//! are dropped. All state lives in the backend; a `TierCache` only carries its
//! key prefix and defaults.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{AccessStamp, CacheEntry};
use super::storage::Storage;
use super::tier::{Tier, Tiers};

/// TTL applied when a write does not name one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Options for [`TierCache::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
  pub storage: Tier,
  /// Time to live; the cache's default TTL when `None`
  pub expiry: Option<Duration>,
  /// Evict least recently used entries until at most this many remain
  pub max_size: Option<usize>,
}

impl SetOptions {
  pub fn storage(mut self, tier: Tier) -> Self {
    self.storage = tier;
    self
  }

  pub fn expiry(mut self, ttl: Duration) -> Self {
    self.expiry = Some(ttl);
    self
  }

  pub fn max_size(mut self, max_size: usize) -> Self {
    self.max_size = Some(max_size);
    self
  }
}

/// A namespaced view of the storage tiers.
#[derive(Clone)]
pub struct TierCache {
  prefix: String,
  tiers: Tiers,
  default_ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl TierCache {
  pub fn new(prefix: impl Into<String>, tiers: Tiers) -> Self {
    Self {
      prefix: prefix.into(),
      tiers,
      default_ttl: DEFAULT_TTL,
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  fn storage_key(&self, key: &str) -> String {
    format!("{}{}", self.prefix, key)
  }

  /// Read `key`, refreshing its LRU timestamp on a hit.
  ///
  /// Expired entries are deleted and reported absent. Entries that are not a
  /// valid cache envelope are deleted too. An entry whose payload does not fit
  /// `T` is reported absent but left in place.
  pub fn get<T: DeserializeOwned>(&self, key: &str, tier: Tier) -> Option<T> {
    if key.is_empty() {
      debug!("Ignoring read of empty cache key");
      return None;
    }

    let storage = self.tiers.get(tier);
    let storage_key = self.storage_key(key);

    let raw = match storage.get_item(&storage_key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        debug!(key = %storage_key, %tier, "Cache read failed: {}", e);
        return None;
      }
    };

    let mut entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&raw) {
      Ok(entry) => entry,
      Err(e) => {
        debug!(key = %storage_key, %tier, "Discarding unreadable cache entry: {}", e);
        discard(storage, &storage_key);
        return None;
      }
    };

    let now = self.clock.now_ms();
    if entry.is_expired(now) {
      debug!(key = %storage_key, %tier, "Cache entry expired");
      discard(storage, &storage_key);
      return None;
    }

    let data = match T::deserialize(&entry.data) {
      Ok(data) => data,
      Err(e) => {
        debug!(key = %storage_key, %tier, "Cached payload has unexpected shape: {}", e);
        return None;
      }
    };

    entry.touch(now);
    match serde_json::to_string(&entry) {
      Ok(text) => {
        if let Err(e) = storage.set_item(&storage_key, &text) {
          warn!(key = %storage_key, %tier, "Failed to refresh cache entry: {}", e);
        }
      }
      Err(e) => warn!(key = %storage_key, "Failed to serialize cache entry: {}", e),
    }

    Some(data)
  }

  /// Store `data` under `key`, replacing whatever was there.
  pub fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, options: SetOptions) {
    if key.is_empty() {
      debug!("Ignoring write of empty cache key");
      return;
    }

    let tier = options.storage;
    let storage = self.tiers.get(tier);
    let storage_key = self.storage_key(key);
    let ttl = options.expiry.unwrap_or(self.default_ttl);

    let entry = CacheEntry::new(data, self.clock.now_ms(), ttl);
    let text = match serde_json::to_string(&entry) {
      Ok(text) => text,
      Err(e) => {
        warn!(key = %storage_key, "Failed to serialize cache entry: {}", e);
        return;
      }
    };

    if let Err(e) = storage.set_item(&storage_key, &text) {
      warn!(key = %storage_key, %tier, "Cache write dropped: {}", e);
      return;
    }

    if let Some(max_size) = options.max_size {
      self.evict_lru(storage, tier, max_size, &storage_key);
    }
  }

  /// Delete `key`. Missing keys are fine.
  pub fn remove(&self, key: &str, tier: Tier) {
    if key.is_empty() {
      debug!("Ignoring removal of empty cache key");
      return;
    }
    let storage_key = self.storage_key(key);
    discard(self.tiers.get(tier), &storage_key);
  }

  /// Delete every key under this cache's prefix, leaving other users' keys alone.
  pub fn clear_all(&self, tier: Tier) {
    let storage = self.tiers.get(tier);
    for key in self.prefixed_keys(storage, tier) {
      discard(storage, &key);
    }
  }

  /// Number of stored keys under this prefix, expired or not.
  pub fn size(&self, tier: Tier) -> usize {
    self.prefixed_keys(self.tiers.get(tier), tier).len()
  }

  /// Raw storage keys (prefix included) under this prefix, expired or not.
  pub fn get_all_keys(&self, tier: Tier) -> Vec<String> {
    self.prefixed_keys(self.tiers.get(tier), tier)
  }

  fn prefixed_keys(&self, storage: &dyn Storage, tier: Tier) -> Vec<String> {
    match storage.keys() {
      Ok(keys) => keys
        .into_iter()
        .filter(|k| k.starts_with(&self.prefix))
        .collect(),
      Err(e) => {
        debug!(prefix = %self.prefix, %tier, "Failed to enumerate keys: {}", e);
        Vec::new()
      }
    }
  }

  /// Drop the least recently used entries until at most `max_size` remain.
  ///
  /// Scans and sorts the whole prefix; tiers hold a few dozen entries at most.
  /// `just_written` ranks after every entry with the same timestamp, so it is
  /// only evicted when nothing else is left.
  fn evict_lru(&self, storage: &dyn Storage, tier: Tier, max_size: usize, just_written: &str) {
    let keys = self.prefixed_keys(storage, tier);
    if keys.len() <= max_size {
      return;
    }

    let mut ranked: Vec<(i64, bool, String)> = keys
      .into_iter()
      .map(|key| {
        let rank = match storage.get_item(&key) {
          Ok(Some(raw)) => AccessStamp::rank(&raw),
          _ => 0,
        };
        (rank, key == just_written, key)
      })
      .collect();
    ranked.sort_by_key(|(rank, newest, _)| (*rank, *newest));

    let excess = ranked.len() - max_size;
    for (_, _, key) in ranked.into_iter().take(excess) {
      debug!(key = %key, %tier, "Evicting least recently used entry");
      discard(storage, &key);
    }
  }
}

/// Best-effort delete.
fn discard(storage: &dyn Storage, key: &str) {
  if let Err(e) = storage.remove_item(key) {
    debug!(key = %key, "Failed to remove cache entry: {}", e);
  }
}

/// Entry metadata as reported by [`TierCache::inspect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
  pub key: String,
  pub expiry: i64,
  pub last_accessed: i64,
  pub expired: bool,
}

impl TierCache {
  /// Metadata for every readable entry under the prefix, without touching
  /// timestamps or deleting anything.
  pub fn inspect(&self, tier: Tier) -> Vec<EntryInfo> {
    let storage = self.tiers.get(tier);
    let now = self.clock.now_ms();

    self
      .prefixed_keys(storage, tier)
      .into_iter()
      .filter_map(|key| {
        let raw = storage.get_item(&key).ok().flatten()?;
        let entry: CacheEntry<serde_json::Value> = serde_json::from_str(&raw).ok()?;
        Some(EntryInfo {
          expired: entry.is_expired(now),
          expiry: entry.expiry,
          last_accessed: entry.last_accessed,
          key,
        })
      })
      .collect()
  }
}
