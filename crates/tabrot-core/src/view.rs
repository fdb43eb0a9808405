//! Read fan-out across the live table and its archives.
//!
//! No query translation happens here: callers run their reads against each
//! returned entity directly.

use tracing::debug;

use crate::{EntityBinder, EntityFactory, Error, Result, SchemaGateway, directory};

/// Entities for the newest `count` archives of `base` (all when `None`),
/// newest first.
pub fn archives<G, F>(
  gateway: &G,
  binder: &EntityBinder<F>,
  base: &str,
  count: Option<usize>,
) -> Result<Vec<F::Entity>>
where
  G: SchemaGateway + ?Sized,
  F: EntityFactory,
{
  let listed = directory::list(gateway, base)?;
  let count = count.unwrap_or(listed.len());

  let mut entities = Vec::with_capacity(count.min(listed.len()));
  for archive in listed.into_iter().take(count) {
    match binder.resolve(&archive.name)? {
      Some(entity) => entities.push(entity),
      None => debug!(archive = %archive.name, "no archive exists for {}", archive.timestamp),
    }
  }
  Ok(entities)
}

/// The live entity for `base` followed by [`archives`].
///
/// Fails with [`Error::TableNotFound`] if the live table itself is missing.
pub fn all<G, F>(
  gateway: &G,
  binder: &EntityBinder<F>,
  base: &str,
  count: Option<usize>,
) -> Result<Vec<F::Entity>>
where
  G: SchemaGateway + ?Sized,
  F: EntityFactory,
{
  let live = binder
    .resolve(base)?
    .ok_or_else(|| Error::TableNotFound(base.to_owned()))?;

  let mut entities = vec![live];
  entities.extend(archives(gateway, binder, base, count)?);
  Ok(entities)
}
