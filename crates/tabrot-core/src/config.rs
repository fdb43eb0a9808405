//! Per-table rotation settings.

use serde::{Deserialize, Serialize};

use crate::{PruneMode, RetentionPolicy};

/// One day.
pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Settings for [`ArchiveManager::archive`](crate::ArchiveManager::archive),
/// deserialisable from a `[defaults]` or `[tables.<name>]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
  pub retention:         RetentionPolicy,
  /// Minimum seconds between the newest archive and a new rotation.
  pub min_interval_secs: u64,
  pub prune_mode:        PruneMode,
}

impl Default for RotationConfig {
  fn default() -> Self {
    Self {
      retention:         RetentionPolicy::default(),
      min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
      prune_mode:        PruneMode::default(),
    }
  }
}

impl RotationConfig {
  pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
    self.retention = retention;
    self
  }

  pub fn with_min_interval(mut self, secs: u64) -> Self {
    self.min_interval_secs = secs;
    self
  }

  pub fn with_prune_mode(mut self, mode: PruneMode) -> Self {
    self.prune_mode = mode;
    self
  }
}
