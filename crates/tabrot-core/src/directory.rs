//! Archive discovery: which physical tables are archives of a base table.

use serde::Serialize;
use tracing::debug;

use crate::{Error, Result, SchemaGateway, Timestamp, naming};

/// One archive table with its decoded timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveTable {
  pub name:      String,
  pub timestamp: Timestamp,
}

/// List the archives of `base`, newest first.
///
/// Reads the full table listing from `gateway` on every call and keeps only
/// names matching `^{base}_tra_\d+$`. Ordering is by the decoded integer, so
/// `..._tra_9` sorts before `..._tra_10`.
pub fn list<G>(gateway: &G, base: &str) -> Result<Vec<ArchiveTable>>
where
  G: SchemaGateway + ?Sized,
{
  let tables = gateway.list_tables().map_err(Error::schema)?;

  let mut archives = tables
    .into_iter()
    .filter(|t| naming::is_archive_of(base, t))
    .map(|name| {
      let timestamp = naming::decode(&name)?;
      Ok(ArchiveTable { name, timestamp })
    })
    .collect::<Result<Vec<_>>>()?;

  archives.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
  debug!(base, count = archives.len(), "listed archives");
  Ok(archives)
}

/// The most recent archive of `base`, if any.
pub fn newest<G>(gateway: &G, base: &str) -> Result<Option<ArchiveTable>>
where
  G: SchemaGateway + ?Sized,
{
  Ok(list(gateway, base)?.into_iter().next())
}
