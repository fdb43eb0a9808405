//! Retention: dropping archives beyond a count or older than a cutoff.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  ArchiveTable, Clock, EntityBinder, EntityFactory, Error, Result, SchemaGateway,
  Timestamp, directory, naming,
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// How many or how old archives may be before they are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetentionPolicy {
  /// Keep the newest `max_count` archives.
  MaxCount { max_count: usize },
  /// Drop archives stamped more than `max_age_secs` before now.
  MaxAge { max_age_secs: u64 },
  /// Drop archives stamped strictly before `cutoff`.
  OlderThan { cutoff: Timestamp },
}

impl Default for RetentionPolicy {
  fn default() -> Self { Self::MaxCount { max_count: 3 } }
}

/// What to do when dropping one archive fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneMode {
  /// Stop at the first failure with [`Error::PruneAborted`].
  #[default]
  FailFast,
  /// Record the failure in [`PruneReport::failures`] and keep going.
  BestEffort,
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PruneFailure {
  pub table: String,
  pub error: Error,
}

#[derive(Debug, Default)]
pub struct PruneReport {
  /// Dropped archive names, in the order they were dropped.
  pub dropped:  Vec<String>,
  /// Only ever non-empty under [`PruneMode::BestEffort`].
  pub failures: Vec<PruneFailure>,
}

impl PruneReport {
  pub fn is_clean(&self) -> bool { self.failures.is_empty() }

  fn failed(&self, table: &str) -> bool {
    self.failures.iter().any(|f| f.table == table)
  }
}

// ─── Pruning ─────────────────────────────────────────────────────────────────

/// Apply `policy` to the archives of `base`.
///
/// Under [`RetentionPolicy::MaxCount`] the oldest surplus archive is dropped
/// and the directory re-read until the count fits. An archive that failed to
/// drop is never retried, so newer archives within the limit are never
/// sacrificed in its place. Age-based policies drop every archive stamped
/// strictly before the cutoff, oldest first; one exactly at the cutoff stays.
///
/// Every candidate is re-checked against the archive grammar right before its
/// drop.
pub fn prune<G, F, C>(
  gateway: &G,
  binder: &EntityBinder<F>,
  clock: &C,
  base: &str,
  policy: RetentionPolicy,
  mode: PruneMode,
) -> Result<PruneReport>
where
  G: SchemaGateway + ?Sized,
  F: EntityFactory,
  C: Clock + ?Sized,
{
  let mut report = PruneReport::default();

  match policy {
    RetentionPolicy::MaxCount { max_count } => loop {
      let archives = directory::list(gateway, base)?;
      let candidate = archives
        .iter()
        .skip(max_count)
        .rev()
        .find(|a| !report.failed(&a.name));

      match candidate {
        Some(oldest) => drop_one(gateway, binder, base, oldest, mode, &mut report)?,
        None => break,
      }
    },
    RetentionPolicy::MaxAge { max_age_secs } => {
      let cutoff = clock.now().saturating_sub(max_age_secs);
      prune_older_than(gateway, binder, base, cutoff, mode, &mut report)?;
    }
    RetentionPolicy::OlderThan { cutoff } => {
      prune_older_than(gateway, binder, base, cutoff, mode, &mut report)?;
    }
  }

  Ok(report)
}

fn prune_older_than<G, F>(
  gateway: &G,
  binder: &EntityBinder<F>,
  base: &str,
  cutoff: Timestamp,
  mode: PruneMode,
  report: &mut PruneReport,
) -> Result<()>
where
  G: SchemaGateway + ?Sized,
  F: EntityFactory,
{
  let expired = directory::list(gateway, base)?
    .into_iter()
    .rev()
    .take_while(|a| a.timestamp < cutoff);

  for archive in expired {
    drop_one(gateway, binder, base, &archive, mode, report)?;
  }
  Ok(())
}

fn drop_one<G, F>(
  gateway: &G,
  binder: &EntityBinder<F>,
  base: &str,
  archive: &ArchiveTable,
  mode: PruneMode,
  report: &mut PruneReport,
) -> Result<()>
where
  G: SchemaGateway + ?Sized,
  F: EntityFactory,
{
  let table = archive.name.as_str();

  let result = if naming::is_archive_of(base, table) {
    let dropped = gateway.drop_table(table).map_err(Error::schema);
    gateway.invalidate_schema_cache(table);
    binder.invalidate(table);
    dropped
  } else {
    Err(Error::UnsafeDrop { base: base.to_owned(), table: table.to_owned() })
  };

  match (result, mode) {
    (Ok(()), _) => {
      info!(base, table, "dropped archive");
      report.dropped.push(table.to_owned());
      Ok(())
    }
    (Err(error), PruneMode::BestEffort) => {
      warn!(base, table, %error, "failed to drop archive; continuing");
      report.failures.push(PruneFailure { table: table.to_owned(), error });
      Ok(())
    }
    (Err(error), PruneMode::FailFast) => Err(Error::PruneAborted {
      table:   table.to_owned(),
      dropped: std::mem::take(&mut report.dropped),
      source:  Box::new(error),
    }),
  }
}
