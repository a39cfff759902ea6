//! Three-step lookup every data-fetching call site goes through.

use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::context::CacheContext;
use super::tier::Tier;
use super::tier_cache::{SetOptions, TierCache, DEFAULT_TTL};
use super::traits::{CacheResult, QueryKey};

/// Cache layer that sits between a screen and the remote source.
///
/// 1. Ask the process-wide facade
/// 2. Ask the screen's own tier cache; promote a hit into the facade
/// 3. Fetch remotely and populate both
#[derive(Clone)]
pub struct CacheLayer {
  facade: Arc<CacheContext>,
  screen: TierCache,
  /// Tier the screen cache lives in
  screen_tier: Tier,
  /// TTL for values written to the screen cache after a remote fetch
  remote_ttl: Duration,
}

impl CacheLayer {
  pub fn new(facade: Arc<CacheContext>, screen: TierCache) -> Self {
    Self {
      facade,
      screen,
      screen_tier: Tier::Device,
      remote_ttl: DEFAULT_TTL,
    }
  }

  pub fn with_screen_tier(mut self, tier: Tier) -> Self {
    self.screen_tier = tier;
    self
  }

  pub fn with_remote_ttl(mut self, ttl: Duration) -> Self {
    self.remote_ttl = ttl;
    self
  }

  /// Look up `key`, falling back to `fetcher` on a full miss.
  ///
  /// Remote errors are returned as-is and nothing is cached.
  pub async fn fetch<K, T, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>>
  where
    K: QueryKey + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let cache_key = key.cache_key();
    let facade_tier = self.facade.default_tier();

    if let Some(data) = self.facade.get::<T>(&cache_key, facade_tier).await {
      debug!(query = %key.description(), "Facade hit");
      return Ok(CacheResult::from_facade(data));
    }

    if let Some(data) = self.screen.get::<T>(&cache_key, self.screen_tier) {
      debug!(query = %key.description(), "Tier hit, promoting into facade");
      self
        .facade
        .set(&cache_key, &data, SetOptions::default().storage(facade_tier))
        .await;
      return Ok(CacheResult::from_tier(data));
    }

    debug!(query = %key.description(), "Cache miss, fetching from source");
    let data = fetcher().await?;

    self.screen.set(
      &cache_key,
      &data,
      SetOptions::default()
        .storage(self.screen_tier)
        .expiry(self.remote_ttl),
    );
    self
      .facade
      .set(&cache_key, &data, SetOptions::default().storage(facade_tier))
      .await;

    Ok(CacheResult::from_remote(data))
  }

  /// Drop `key` from both the facade and the screen cache.
  pub async fn invalidate<K: QueryKey + ?Sized>(&self, key: &K) {
    let cache_key = key.cache_key();
    self
      .facade
      .remove(&cache_key, self.facade.default_tier())
      .await;
    self.screen.remove(&cache_key, self.screen_tier);
  }
}
