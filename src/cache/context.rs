//! The process-wide cache facade and its provisioning scope.
//!
//! One [`CacheContext`] exists per running application. It is created by the
//! root [`CacheProvider`] and handed to the rest of the program through
//! [`Scope`] handles, so there is no global variable and tests get their own
//! instance. The facade's methods are `async` so a storage engine that really
//! suspends can be dropped in later without touching callers; with the
//! built-in backends they resolve on first poll.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, warn};

use super::clock::Clock;
use super::tier::{Tier, Tiers};
use super::tier_cache::{SetOptions, TierCache};

/// Namespace of the facade's keys in the shared storage tiers.
pub const APP_CACHE_PREFIX: &str = "app_cache_";

/// Callback invoked with the key and the newly written value.
pub type Listener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
  next_id: AtomicU64,
  torn_down: AtomicBool,
  by_key: Mutex<HashMap<String, Vec<(u64, Listener)>>>,
}

impl ListenerRegistry {
  fn add(&self, key: &str, listener: Listener) -> Option<u64> {
    if self.torn_down.load(Ordering::SeqCst) {
      return None;
    }
    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    match self.by_key.lock() {
      Ok(mut by_key) => {
        by_key
          .entry(key.to_string())
          .or_default()
          .push((id, listener));
        Some(id)
      }
      Err(e) => {
        warn!("Listener registry lock poisoned: {}", e);
        None
      }
    }
  }

  fn remove(&self, key: &str, id: u64) {
    if let Ok(mut by_key) = self.by_key.lock() {
      if let Some(listeners) = by_key.get_mut(key) {
        listeners.retain(|(existing, _)| *existing != id);
        if listeners.is_empty() {
          by_key.remove(key);
        }
      }
    }
  }

  /// Snapshot of the listeners for `key`, so they run without the lock held.
  fn listeners_for(&self, key: &str) -> Vec<Listener> {
    match self.by_key.lock() {
      Ok(by_key) => by_key
        .get(key)
        .map(|ls| ls.iter().map(|(_, l)| Arc::clone(l)).collect())
        .unwrap_or_default(),
      Err(_) => Vec::new(),
    }
  }

  fn count(&self) -> usize {
    self
      .by_key
      .lock()
      .map(|by_key| by_key.values().map(Vec::len).sum())
      .unwrap_or(0)
  }

  fn tear_down(&self) {
    self.torn_down.store(true, Ordering::SeqCst);
    if let Ok(mut by_key) = self.by_key.lock() {
      by_key.clear();
    }
  }
}

/// Handle returned by [`CacheContext::subscribe`].
///
/// Dropping it leaves the listener registered; call [`Subscription::unsubscribe`]
/// to remove it.
#[must_use = "dropping a Subscription keeps the listener; call unsubscribe() to remove it"]
pub struct Subscription {
  registry: Weak<ListenerRegistry>,
  key: String,
  id: Option<u64>,
}

impl Subscription {
  /// Remove the listener. A no-op once the facade has been torn down.
  pub fn unsubscribe(self) {
    if let (Some(registry), Some(id)) = (self.registry.upgrade(), self.id) {
      registry.remove(&self.key, id);
    }
  }
}

/// The process-wide cache facade.
pub struct CacheContext {
  cache: TierCache,
  default_tier: Tier,
  listeners: Arc<ListenerRegistry>,
}

impl CacheContext {
  pub fn new(tiers: Tiers) -> Self {
    Self {
      cache: TierCache::new(APP_CACHE_PREFIX, tiers),
      default_tier: Tier::Session,
      listeners: Arc::new(ListenerRegistry::default()),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.cache = self.cache.with_clock(clock);
    self
  }

  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.cache = self.cache.with_default_ttl(ttl);
    self
  }

  pub fn with_default_tier(mut self, tier: Tier) -> Self {
    self.default_tier = tier;
    self
  }

  /// Tier used by the facade's own consumers when they don't pick one.
  pub fn default_tier(&self) -> Tier {
    self.default_tier
  }

  pub async fn get<T: DeserializeOwned>(&self, key: &str, tier: Tier) -> Option<T> {
    self.cache.get(key, tier)
  }

  /// Write through to the tier, then notify this key's listeners.
  pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, options: SetOptions) {
    let value = match serde_json::to_value(data) {
      Ok(value) => value,
      Err(e) => {
        warn!(key = %key, "Failed to serialize cache value: {}", e);
        return;
      }
    };

    self.cache.set(key, &value, options);

    let listeners = self.listeners.listeners_for(key);
    if !listeners.is_empty() {
      debug!(key = %key, count = listeners.len(), "Notifying cache listeners");
    }
    for listener in listeners {
      listener(key, &value);
    }
  }

  pub async fn remove(&self, key: &str, tier: Tier) {
    self.cache.remove(key, tier);
  }

  pub async fn clear_all(&self, tier: Tier) {
    self.cache.clear_all(tier);
  }

  /// Call `listener` whenever this facade `set`s `key`.
  ///
  /// Writes made directly against the storage tiers, or by other processes,
  /// are not observed.
  pub fn subscribe<F>(&self, key: &str, listener: F) -> Subscription
  where
    F: Fn(&str, &Value) + Send + Sync + 'static,
  {
    let id = self.listeners.add(key, Arc::new(listener));
    Subscription {
      registry: Arc::downgrade(&self.listeners),
      key: key.to_string(),
      id,
    }
  }

  /// Number of registered listeners across all keys.
  pub fn listener_count(&self) -> usize {
    self.listeners.count()
  }

  pub fn is_torn_down(&self) -> bool {
    self.listeners.torn_down.load(Ordering::SeqCst)
  }

  fn tear_down(&self) {
    debug!("Tearing down cache context");
    self.listeners.tear_down();
  }
}

/// Root scope that owns the application's single [`CacheContext`].
///
/// Dropping or unmounting the provider tears the facade down.
pub struct CacheProvider {
  context: Arc<CacheContext>,
}

impl CacheProvider {
  pub fn mount(context: CacheContext) -> Self {
    Self {
      context: Arc::new(context),
    }
  }

  /// Handle for code running under this provider.
  pub fn scope(&self) -> Scope {
    Scope {
      context: Some(Arc::downgrade(&self.context)),
    }
  }

  pub fn unmount(self) {}
}

impl Drop for CacheProvider {
  fn drop(&mut self) {
    self.context.tear_down();
  }
}

/// Where a piece of code sits relative to a [`CacheProvider`].
#[derive(Clone, Default)]
pub struct Scope {
  context: Option<Weak<CacheContext>>,
}

impl Scope {
  /// A scope that is not under any provider.
  pub fn detached() -> Self {
    Self::default()
  }

  /// The application's cache facade.
  ///
  /// # Panics
  ///
  /// If this scope is not under a mounted [`CacheProvider`]. That is a wiring
  /// mistake, not a runtime condition.
  pub fn use_cache(&self) -> Arc<CacheContext> {
    match self.context.as_ref().and_then(Weak::upgrade) {
      Some(context) if !context.is_torn_down() => context,
      _ => panic!("use_cache must be called within a mounted CacheProvider"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;
  use serde_json::json;
  use std::sync::atomic::AtomicUsize;

  fn provider() -> (CacheProvider, Tiers, ManualClock) {
    let tiers = Tiers::in_memory();
    let clock = ManualClock::new(0);
    let context = CacheContext::new(tiers.clone()).with_clock(Arc::new(clock.clone()));
    (CacheProvider::mount(context), tiers, clock)
  }

  #[tokio::test]
  async fn test_facade_uses_app_prefix() {
    let (provider, tiers, _) = provider();
    let cache = provider.scope().use_cache();

    cache.set("courses", &json!([1, 2]), SetOptions::default()).await;
    assert_eq!(
      tiers.get(Tier::Session).keys().unwrap(),
      vec!["app_cache_courses"]
    );
    assert_eq!(
      cache.get::<Vec<u32>>("courses", Tier::Session).await,
      Some(vec![1, 2])
    );

    cache.remove("courses", Tier::Session).await;
    assert_eq!(cache.get::<Value>("courses", Tier::Session).await, None);
  }

  #[tokio::test]
  async fn test_facade_expiry_follows_clock() {
    let (provider, _, clock) = provider();
    let cache = provider.scope().use_cache();

    cache
      .set("k", &1, SetOptions::default().expiry(Duration::from_secs(1)))
      .await;
    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get::<i32>("k", Tier::Session).await, None);
  }

  #[tokio::test]
  async fn test_subscribers_see_sets_for_their_key() {
    let (provider, _, _) = provider();
    let cache = provider.scope().use_cache();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let _sub = cache.subscribe("profile", move |key, data| {
      sink.lock().unwrap().push((key.to_string(), data.clone()));
    });

    cache.set("profile", &json!({"name": "A"}), SetOptions::default()).await;
    cache.set("other", &json!(1), SetOptions::default()).await;

    let seen = seen.lock().unwrap();
    assert_eq!(
      *seen,
      vec![("profile".to_string(), json!({"name": "A"}))]
    );
  }

  #[tokio::test]
  async fn test_direct_tier_writes_do_not_notify() {
    let (provider, tiers, _) = provider();
    let cache = provider.scope().use_cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let _sub = cache.subscribe("k", move |_, _| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    TierCache::new(APP_CACHE_PREFIX, tiers).set("k", &1, SetOptions::default());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_unsubscribe_stops_notifications() {
    let (provider, _, _) = provider();
    let cache = provider.scope().use_cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let sub = cache.subscribe("k", move |_, _| {
      counter.fetch_add(1, Ordering::SeqCst);
    });
    cache.set("k", &1, SetOptions::default()).await;
    sub.unsubscribe();
    cache.set("k", &2, SetOptions::default()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.listener_count(), 0);
  }

  #[tokio::test]
  async fn test_listener_may_resubscribe_during_notify() {
    let (provider, _, _) = provider();
    let cache = provider.scope().use_cache();

    let inner = Arc::clone(&cache);
    let _sub = cache.subscribe("k", move |_, _| {
      let _ = inner.subscribe("k2", |_, _| {});
    });
    cache.set("k", &1, SetOptions::default()).await;

    assert_eq!(cache.listener_count(), 2);
  }

  #[tokio::test]
  async fn test_unmount_tears_down_listeners() {
    let (provider, _, _) = provider();
    let scope = provider.scope();
    let cache = scope.use_cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let sub = cache.subscribe("k", move |_, _| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    provider.unmount();
    assert!(cache.is_torn_down());
    assert_eq!(cache.listener_count(), 0);

    cache.set("k", &1, SetOptions::default()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Disposer after teardown is harmless
    sub.unsubscribe();
    let late = cache.subscribe("k", |_, _| {});
    late.unsubscribe();
    assert_eq!(cache.listener_count(), 0);
  }

  #[test]
  #[should_panic(expected = "within a mounted CacheProvider")]
  fn test_use_cache_outside_provider_panics() {
    Scope::detached().use_cache();
  }

  #[test]
  #[should_panic(expected = "within a mounted CacheProvider")]
  fn test_use_cache_after_unmount_panics() {
    let (provider, _, _) = provider();
    let scope = provider.scope();
    drop(provider);
    scope.use_cache();
  }

  #[test]
  fn test_scopes_share_one_instance() {
    let (provider, _, _) = provider();
    let a = provider.scope().use_cache();
    let b = provider.scope().clone().use_cache();
    assert!(Arc::ptr_eq(&a, &b));
  }
}
