//! Minimum-interval guard between rotations.
//!
//! Only the single newest archive is consulted. An archive stamped in the
//! future (clock skew, manual creation) counts as zero seconds ago.

use tracing::warn;

use crate::{Clock, Error, Result, SchemaGateway, directory};

/// Seconds since the newest archive of `base`, or `None` if it has none.
pub fn elapsed_since_last<G, C>(
  gateway: &G,
  clock: &C,
  base: &str,
) -> Result<Option<u64>>
where
  G: SchemaGateway + ?Sized,
  C: Clock + ?Sized,
{
  let newest = directory::newest(gateway, base)?;
  Ok(newest.map(|a| clock.now().saturating_sub(a.timestamp)))
}

/// True if `base` has no archive yet, or its newest archive is at least
/// `min_interval` seconds old.
pub fn can_rotate<G, C>(
  gateway: &G,
  clock: &C,
  base: &str,
  min_interval: u64,
) -> Result<bool>
where
  G: SchemaGateway + ?Sized,
  C: Clock + ?Sized,
{
  Ok(
    elapsed_since_last(gateway, clock, base)?
      .is_none_or(|elapsed| elapsed >= min_interval),
  )
}

/// Like [`can_rotate`] but fails with
/// [`Error::NotEnoughTimeBetweenArchives`] on refusal.
pub fn ensure_can_rotate<G, C>(
  gateway: &G,
  clock: &C,
  base: &str,
  min_interval: u64,
) -> Result<()>
where
  G: SchemaGateway + ?Sized,
  C: Clock + ?Sized,
{
  match elapsed_since_last(gateway, clock, base)? {
    Some(elapsed) if elapsed < min_interval => {
      warn!(base, elapsed, min_interval, "rotation refused by interval guard");
      Err(Error::NotEnoughTimeBetweenArchives {
        base: base.to_owned(),
        min_interval,
        elapsed,
      })
    }
    _ => Ok(()),
  }
}
