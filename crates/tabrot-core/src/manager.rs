//! [`ArchiveManager`] — the operations exposed to schedulers and callers.

use crate::{
  ArchiveTable, Clock, EntityBinder, EntityFactory, PruneReport, Result,
  RotationConfig, SchemaGateway, SystemClock, directory, guard, naming, retention,
  rotator, view,
};

/// The outcome of a successful [`ArchiveManager::archive`].
#[derive(Debug)]
pub struct Rotation {
  pub archive: ArchiveTable,
  pub pruned:  PruneReport,
}

/// Rotation, retention and read fan-out for tables in one store.
///
/// Assumes a single writer per base table. Concurrent rotations of the same
/// table from several processes can race between the existence check and the
/// rename; the rename then fails rather than losing rows, but production
/// deployments running more than one scheduler need an external lock keyed by
/// base table name.
pub struct ArchiveManager<G, F: EntityFactory, C = SystemClock> {
  gateway: G,
  binder:  EntityBinder<F>,
  clock:   C,
}

impl<G, F> ArchiveManager<G, F>
where
  G: SchemaGateway,
  F: EntityFactory,
{
  pub fn new(gateway: G, factory: F) -> Self {
    Self::with_clock(gateway, factory, SystemClock)
  }
}

impl<G, F, C> ArchiveManager<G, F, C>
where
  G: SchemaGateway,
  F: EntityFactory,
  C: Clock,
{
  pub fn with_clock(gateway: G, factory: F, clock: C) -> Self {
    Self { gateway, binder: EntityBinder::new(factory), clock }
  }

  pub fn gateway(&self) -> &G { &self.gateway }

  pub fn binder(&self) -> &EntityBinder<F> { &self.binder }

  pub fn clock(&self) -> &C { &self.clock }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Rotate `base` and prune its archives.
  ///
  /// Refused with
  /// [`NotEnoughTimeBetweenArchives`](crate::Error::NotEnoughTimeBetweenArchives)
  /// if the newest archive is younger than `config.min_interval_secs`. Under
  /// [`PruneMode::FailFast`](crate::PruneMode::FailFast) a pruning failure is
  /// returned as an error even though the rotation itself has happened.
  pub fn archive(&self, base: &str, config: &RotationConfig) -> Result<Rotation> {
    guard::ensure_can_rotate(&self.gateway, &self.clock, base, config.min_interval_secs)?;

    let rotated = rotator::rotate(&self.gateway, &self.clock, base);
    for table in [base, naming::temp_table_name(base).as_str()] {
      self.binder.invalidate(table);
    }
    let archive = rotated?;
    self.binder.invalidate(&archive.name);

    let pruned = self.prune(base, config)?;
    Ok(Rotation { archive, pruned })
  }

  /// Apply `config`'s retention policy without rotating.
  pub fn prune(&self, base: &str, config: &RotationConfig) -> Result<PruneReport> {
    retention::prune(
      &self.gateway,
      &self.binder,
      &self.clock,
      base,
      config.retention,
      config.prune_mode,
    )
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  /// Whether [`archive`](Self::archive) would pass the interval guard now.
  pub fn can_rotate(&self, base: &str, min_interval_secs: u64) -> Result<bool> {
    guard::can_rotate(&self.gateway, &self.clock, base, min_interval_secs)
  }

  /// Archive names and timestamps for `base`, newest first.
  pub fn archive_tables(&self, base: &str) -> Result<Vec<ArchiveTable>> {
    directory::list(&self.gateway, base)
  }

  /// Entities for up to `count` archives of `base`, newest first.
  pub fn list_archives(&self, base: &str, count: Option<usize>) -> Result<Vec<F::Entity>> {
    view::archives(&self.gateway, &self.binder, base, count)
  }

  /// The live entity followed by up to `count` archives, newest first.
  pub fn query_all(&self, base: &str, count: Option<usize>) -> Result<Vec<F::Entity>> {
    view::all(&self.gateway, &self.binder, base, count)
  }

  /// Run `f` against the live entity and each archive, collecting the results
  /// in the same order as [`query_all`](Self::query_all).
  pub fn with_archives<T>(
    &self,
    base: &str,
    count: Option<usize>,
    f: impl FnMut(&F::Entity) -> T,
  ) -> Result<Vec<T>> {
    Ok(self.query_all(base, count)?.iter().map(f).collect())
  }
}
