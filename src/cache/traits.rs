//! Core traits and types for the consumer protocol.

/// Something that names a cached query.
pub trait QueryKey {
  /// Logical cache key (prefix is added by the cache itself)
  fn cache_key(&self) -> String;

  /// Human-readable description for logs
  fn description(&self) -> String;
}

impl QueryKey for str {
  fn cache_key(&self) -> String {
    self.to_string()
  }

  fn description(&self) -> String {
    self.to_string()
  }
}

impl QueryKey for String {
  fn cache_key(&self) -> String {
    self.clone()
  }

  fn description(&self) -> String {
    self.clone()
  }
}

/// Result from a cache lookup, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Which step of the lookup produced it
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn from_facade(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Facade,
    }
  }

  pub fn from_tier(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Tier,
    }
  }

  pub fn from_remote(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Remote,
    }
  }

  pub fn is_cached(&self) -> bool {
    self.source != CacheSource::Remote
  }
}

/// Indicates where data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Process-wide facade hit
  Facade,
  /// Screen-scoped tier cache hit, promoted into the facade
  Tier,
  /// Full miss, fetched from the remote source
  Remote,
}
