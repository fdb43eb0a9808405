//! Wall-clock source used to stamp archives and evaluate the interval guard.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Unix epoch seconds.
pub type Timestamp = u64;

pub trait Clock {
  /// Current time in whole seconds.
  fn now(&self) -> Timestamp;
}

/// The system clock via [`chrono::Utc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Timestamp {
    // Pre-epoch system clocks clamp to zero.
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
  }
}

/// A clock that only moves when told to. Useful for driving rotations in tests
/// without sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
  now: AtomicU64,
}

impl ManualClock {
  pub fn new(start: Timestamp) -> Self { Self { now: AtomicU64::new(start) } }

  pub fn set(&self, to: Timestamp) { self.now.store(to, Ordering::SeqCst); }

  pub fn advance(&self, secs: u64) { self.now.fetch_add(secs, Ordering::SeqCst); }
}

impl Clock for ManualClock {
  fn now(&self) -> Timestamp { self.now.load(Ordering::SeqCst) }
}

impl<C: Clock + ?Sized> Clock for &C {
  fn now(&self) -> Timestamp { (**self).now() }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
  fn now(&self) -> Timestamp { (**self).now() }
}
