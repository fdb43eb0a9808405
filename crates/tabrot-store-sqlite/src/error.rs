//! Error type for `tabrot-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("table not found: {0}")]
  MissingTable(String),

  /// The stored DDL for a table or index could not be cloned.
  #[error("cannot clone schema of {name}: {reason}")]
  MalformedSchema { name: String, reason: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
