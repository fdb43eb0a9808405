//! Rotation: retire the live table into an archive and install a fresh one.

use tracing::info;

use crate::{
  ArchiveTable, Clock, Error, Result, SchemaGateway,
  naming::{self, temp_table_name},
};

/// Rotate `base` and return the archive it was renamed to.
///
/// Steps, in order:
///
/// 1. Stamp the archive name with `clock.now()`.
/// 2. Abort with [`Error::ArchiveAlreadyExists`] if that name is taken. No
///    retry with another timestamp is attempted.
/// 3. Create `{base}_tra_new` structurally identical to `base`.
/// 4. In one atomic step, rename `base` to the archive name and
///    `{base}_tra_new` to `base`.
///
/// Rows and identity counters stay with the archive; the new live table starts
/// empty. Schema caches for every touched name are invalidated before
/// returning, even when a DDL step fails.
pub fn rotate<G, C>(gateway: &G, clock: &C, base: &str) -> Result<ArchiveTable>
where
  G: SchemaGateway + ?Sized,
  C: Clock + ?Sized,
{
  let timestamp = clock.now();
  let archived = naming::encode(base, timestamp);
  let temp = temp_table_name(base);

  let tables = gateway.list_tables().map_err(Error::schema)?;
  if tables.iter().any(|t| *t == archived) {
    return Err(Error::ArchiveAlreadyExists { table: archived });
  }

  info!(base, archive = %archived, "archiving active table and replacing with new one");

  let result = gateway
    .create_table_like(&temp, base)
    .and_then(|()| gateway.swap_tables(base, &archived, &temp));

  for table in [base, archived.as_str(), temp.as_str()] {
    gateway.invalidate_schema_cache(table);
  }
  result.map_err(Error::schema)?;

  info!(base, archive = %archived, "rotation complete");
  Ok(ArchiveTable { name: archived, timestamp })
}
