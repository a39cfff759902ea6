//! Tier selection and the pair of backends behind it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use super::storage::{MemoryStorage, SqliteStorage, Storage, UnavailableStorage};
use crate::config::StorageConfig;

/// Which durable store an operation addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
  /// Cleared when the session (this process) ends
  #[default]
  #[serde(rename = "session-scoped", alias = "session")]
  Session,
  /// Persists across sessions
  #[serde(rename = "device-scoped", alias = "device")]
  Device,
}

impl Tier {
  pub fn as_str(&self) -> &'static str {
    match self {
      Tier::Session => "session-scoped",
      Tier::Device => "device-scoped",
    }
  }
}

impl fmt::Display for Tier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Tier {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "session-scoped" | "session" => Ok(Tier::Session),
      "device-scoped" | "device" => Ok(Tier::Device),
      other => Err(format!(
        "unknown storage tier '{}' (expected session-scoped or device-scoped)",
        other
      )),
    }
  }
}

/// The session and device backends, cheap to clone.
#[derive(Clone)]
pub struct Tiers {
  session: Arc<dyn Storage>,
  device: Arc<dyn Storage>,
}

impl Tiers {
  pub fn new(session: Arc<dyn Storage>, device: Arc<dyn Storage>) -> Self {
    Self { session, device }
  }

  /// Both tiers in process memory. Handy for tests.
  pub fn in_memory() -> Self {
    Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
  }

  /// No persistence at all: every read misses and every write is dropped.
  pub fn unavailable() -> Self {
    Self::new(Arc::new(UnavailableStorage), Arc::new(UnavailableStorage))
  }

  /// Production tiers: process memory for the session, SQLite for the device.
  ///
  /// If the device database cannot be opened the device tier degrades to
  /// [`UnavailableStorage`] instead of failing.
  pub fn open(config: &StorageConfig) -> Self {
    let session: Arc<dyn Storage> = Arc::new(MemoryStorage::new().with_quota(config.quota_bytes));

    let device: Arc<dyn Storage> = match config
      .resolved_device_path()
      .and_then(|path| SqliteStorage::open(&path))
    {
      Ok(storage) => Arc::new(storage.with_quota(config.quota_bytes)),
      Err(e) => {
        warn!("Device-scoped tier unavailable: {}", e);
        Arc::new(UnavailableStorage)
      }
    };

    Self { session, device }
  }

  pub fn get(&self, tier: Tier) -> &dyn Storage {
    match tier {
      Tier::Session => self.session.as_ref(),
      Tier::Device => self.device.as_ref(),
    }
  }
}
