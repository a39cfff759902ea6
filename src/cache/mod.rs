//! Client-side caching engine.
//!
//! This module provides:
//! - [`TierCache`]: expiring key/value storage over a session-scoped or
//!   device-scoped tier, with optional LRU size bounds
//! - [`CacheContext`]: the single process-wide facade, provisioned by a
//!   [`CacheProvider`] and reached through a [`Scope`], with same-process
//!   change notification
//! - [`CacheLayer`]: the facade → tier → remote lookup every screen uses
//!
//! Nothing here returns a storage error to the caller. A broken or missing
//! backend looks like an empty cache.

mod clock;
mod context;
mod entry;
mod layer;
mod storage;
mod tier;
mod tier_cache;
mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{CacheContext, CacheProvider, Listener, Scope, Subscription, APP_CACHE_PREFIX};
pub use entry::CacheEntry;
pub use layer::CacheLayer;
pub use storage::{MemoryStorage, SqliteStorage, Storage, UnavailableStorage};
pub use tier::{Tier, Tiers};
pub use tier_cache::{EntryInfo, SetOptions, TierCache, DEFAULT_TTL};
pub use traits::{CacheResult, CacheSource, QueryKey};
