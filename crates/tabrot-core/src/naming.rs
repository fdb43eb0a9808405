//! Archive table naming: `{base}_tra_{timestamp}`.
//!
//! `tra` stands for "table rotate archive". The timestamp is a non-negative
//! decimal integer (Unix epoch seconds).

use crate::{Error, Result, Timestamp};

/// Marker placed between the base name and the timestamp.
pub const ARCHIVE_MARKER: &str = "tra";

/// Build the archive name for `base` at `timestamp`.
pub fn encode(base: &str, timestamp: Timestamp) -> String {
  format!("{base}_{ARCHIVE_MARKER}_{timestamp}")
}

/// Name of the scratch table created during rotation. It never matches the
/// archive grammar.
pub fn temp_table_name(base: &str) -> String {
  format!("{base}_{ARCHIVE_MARKER}_new")
}

/// Extract the timestamp from the segment after the final `_`.
///
/// The base-name prefix is not checked here; see [`is_archive_of`].
pub fn decode(table: &str) -> Result<Timestamp> {
  let invalid = || Error::InvalidTimestamp { table: table.to_owned() };

  let suffix = table.rsplit('_').next().unwrap_or_default();
  if !is_digits(suffix) {
    return Err(invalid());
  }
  suffix.parse().map_err(|_| invalid())
}

/// True iff `table` matches `^{base}_tra_\d+$` exactly.
pub fn is_archive_of(base: &str, table: &str) -> bool {
  table
    .strip_prefix(base)
    .and_then(|rest| rest.strip_prefix('_'))
    .and_then(|rest| rest.strip_prefix(ARCHIVE_MARKER))
    .and_then(|rest| rest.strip_prefix('_'))
    .is_some_and(is_digits)
}

fn is_digits(s: &str) -> bool {
  !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
