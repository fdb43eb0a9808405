//! Error types for `tabrot-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A table name matched the archive marker but its suffix is not a valid
  /// non-negative integer.
  #[error("no valid timestamp for {table}: expected `_<digits>` at the end")]
  InvalidTimestamp { table: String },

  /// Rotation aborted before any DDL ran; the live table is untouched.
  #[error("{table} already exists; aborting rotation")]
  ArchiveAlreadyExists { table: String },

  /// Rotation refused by the interval guard; the live table is untouched.
  #[error(
    "there must be at least {min_interval} seconds between archives of {base} \
     ({elapsed} elapsed)"
  )]
  NotEnoughTimeBetweenArchives {
    base:         String,
    min_interval: u64,
    elapsed:      u64,
  },

  /// The live table backing a base name does not exist.
  #[error("table not found: {0}")]
  TableNotFound(String),

  /// A drop candidate failed the archive grammar check for its base table.
  #[error("refusing to drop {table}: not an archive of {base}")]
  UnsafeDrop { base: String, table: String },

  /// Fail-fast pruning stopped at `table`. `dropped` lists the archives that
  /// were already removed before the failure.
  #[error("pruning aborted at {table} after dropping {dropped:?}: {source}")]
  PruneAborted {
    table:   String,
    dropped: Vec<String>,
    #[source]
    source:  Box<Error>,
  },

  /// The schema gateway or entity factory failed. After a failed rotation the
  /// caller should re-verify which tables exist before retrying.
  #[error("schema error: {0}")]
  Schema(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error verbatim.
  pub fn schema<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Schema(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
