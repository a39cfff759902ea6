//! Wall-clock source for entry timestamps.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
  fn now_ms(&self) -> i64;
}

/// Real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_ms(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
  now: Arc<AtomicI64>,
}

impl ManualClock {
  pub fn new(start_ms: i64) -> Self {
    Self {
      now: Arc::new(AtomicI64::new(start_ms)),
    }
  }

  pub fn set(&self, now_ms: i64) {
    self.now.store(now_ms, Ordering::SeqCst);
  }

  pub fn advance(&self, by: Duration) {
    self.now.fetch_add(duration_ms(by), Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_ms(&self) -> i64 {
    self.now.load(Ordering::SeqCst)
  }
}

/// Milliseconds in `d`, saturating at `i64::MAX`.
pub(crate) fn duration_ms(d: Duration) -> i64 {
  i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
