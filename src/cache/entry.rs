//! The persisted cache entry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::clock::duration_ms;

/// One stored value plus its expiry and LRU bookkeeping.
///
/// Serialized as `{"data": ..., "expiry": <ms>, "lastAccessed": <ms>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
  pub data: T,
  /// Epoch millis at and after which the entry is gone
  pub expiry: i64,
  /// Epoch millis of the last successful read (or the write)
  pub last_accessed: i64,
}

impl<T> CacheEntry<T> {
  pub fn new(data: T, now_ms: i64, ttl: Duration) -> Self {
    Self {
      data,
      expiry: now_ms.saturating_add(duration_ms(ttl)),
      last_accessed: now_ms,
    }
  }

  pub fn is_expired(&self, now_ms: i64) -> bool {
    now_ms >= self.expiry
  }

  /// Record a read. Never moves `last_accessed` backwards.
  pub fn touch(&mut self, now_ms: i64) {
    self.last_accessed = self.last_accessed.max(now_ms);
  }
}

/// Just the LRU rank of a stored entry, for eviction scans.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessStamp {
  pub last_accessed: i64,
}

impl AccessStamp {
  /// Rank of a raw stored value; unreadable values rank oldest.
  pub fn rank(raw: &str) -> i64 {
    serde_json::from_str::<AccessStamp>(raw)
      .map(|s| s.last_accessed)
      .unwrap_or(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_wire_format() {
    let entry = CacheEntry::new(json!({"name": "A"}), 10_000, Duration::from_secs(1));
    let text = serde_json::to_string(&entry).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(
      value,
      json!({"data": {"name": "A"}, "expiry": 11_000, "lastAccessed": 10_000})
    );
  }

  #[test]
  fn test_expiry_boundary_is_absent() {
    let entry = CacheEntry::new(1, 0, Duration::from_millis(1_000));
    assert!(!entry.is_expired(999));
    assert!(entry.is_expired(1_000));
    assert!(entry.is_expired(1_001));
  }

  #[test]
  fn test_touch_is_monotonic() {
    let mut entry = CacheEntry::new("x", 500, Duration::from_secs(60));
    entry.touch(700);
    assert_eq!(entry.last_accessed, 700);

    // Clock stepped backwards
    entry.touch(600);
    assert_eq!(entry.last_accessed, 700);
  }

  #[test]
  fn test_rank_of_corrupt_entry_is_zero() {
    assert_eq!(AccessStamp::rank("not json"), 0);
    assert_eq!(AccessStamp::rank(r#"{"data": 1}"#), 0);
    assert_eq!(
      AccessStamp::rank(r#"{"data": 1, "expiry": 9, "lastAccessed": 42}"#),
      42
    );
  }
}
