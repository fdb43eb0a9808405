//! Scenario tests for the core against an in-memory schema.

use std::{
  cell::{Cell, RefCell},
  collections::{BTreeMap, HashSet},
  rc::Rc,
  sync::Arc,
};

use crate::{
  ArchiveManager, EntityFactory, Error, ManualClock, PruneMode, RetentionPolicy,
  RotationConfig, SchemaGateway, directory, guard, rotator,
};

// ─── In-memory store ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MemError(String);

#[derive(Debug, Default)]
struct State {
  /// Table name → row count.
  tables:        BTreeMap<String, u64>,
  failing_drops: HashSet<String>,
  fail_swap:     bool,
  invalidated:   Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct MemoryStore(Rc<RefCell<State>>);

impl MemoryStore {
  fn with_table(name: &str, rows: u64) -> Self {
    let store = Self::default();
    store.put(name, rows);
    store
  }

  fn put(&self, name: &str, rows: u64) {
    self.0.borrow_mut().tables.insert(name.to_owned(), rows);
  }

  fn rows(&self, name: &str) -> Option<u64> {
    self.0.borrow().tables.get(name).copied()
  }

  fn names(&self) -> Vec<String> { self.0.borrow().tables.keys().cloned().collect() }

  fn fail_drop_of(&self, name: &str) {
    self.0.borrow_mut().failing_drops.insert(name.to_owned());
  }
}

impl SchemaGateway for MemoryStore {
  type Error = MemError;

  fn list_tables(&self) -> Result<Vec<String>, MemError> { Ok(self.names()) }

  fn execute(&self, statement: &str) -> Result<(), MemError> {
    Err(MemError(format!("unsupported statement: {statement}")))
  }

  fn invalidate_schema_cache(&self, table: &str) {
    self.0.borrow_mut().invalidated.push(table.to_owned());
  }

  fn create_table_like(&self, new_table: &str, template: &str) -> Result<(), MemError> {
    let mut state = self.0.borrow_mut();
    if !state.tables.contains_key(template) {
      return Err(MemError(format!("no such table: {template}")));
    }
    if state.tables.contains_key(new_table) {
      return Err(MemError(format!("table {new_table} already exists")));
    }
    state.tables.insert(new_table.to_owned(), 0);
    Ok(())
  }

  fn swap_tables(&self, live: &str, archive: &str, replacement: &str) -> Result<(), MemError> {
    let mut state = self.0.borrow_mut();
    if state.fail_swap || state.tables.contains_key(archive) {
      return Err(MemError("rename failed".into()));
    }
    let (Some(rows), Some(fresh)) =
      (state.tables.remove(live), state.tables.remove(replacement))
    else {
      return Err(MemError("rename source missing".into()));
    };
    state.tables.insert(archive.to_owned(), rows);
    state.tables.insert(live.to_owned(), fresh);
    Ok(())
  }

  fn drop_table(&self, table: &str) -> Result<(), MemError> {
    let mut state = self.0.borrow_mut();
    if state.failing_drops.contains(table) {
      return Err(MemError(format!("cannot drop {table}")));
    }
    state
      .tables
      .remove(table)
      .map(drop)
      .ok_or_else(|| MemError(format!("no such table: {table}")))
  }
}

/// Entity handle with an existence flag cached the way an ORM would.
#[derive(Debug, Clone)]
struct MemEntity {
  name:   String,
  store:  MemoryStore,
  exists: Rc<Cell<Option<bool>>>,
}

impl MemEntity {
  fn count(&self) -> u64 { self.store.rows(&self.name).unwrap_or(0) }
}

struct MemFactory(MemoryStore);

impl EntityFactory for MemFactory {
  type Entity = MemEntity;
  type Error = MemError;

  fn entity_for(&self, table: &str) -> Result<MemEntity, MemError> {
    Ok(MemEntity {
      name:   table.to_owned(),
      store:  self.0.clone(),
      exists: Rc::default(),
    })
  }

  fn table_exists(&self, entity: &MemEntity) -> Result<bool, MemError> {
    let exists = entity
      .exists
      .get()
      .unwrap_or_else(|| self.0.rows(&entity.name).is_some());
    entity.exists.set(Some(exists));
    Ok(exists)
  }

  fn reset_metadata(&self, entity: &MemEntity) { entity.exists.set(None); }
}

type Manager = ArchiveManager<MemoryStore, MemFactory, Arc<ManualClock>>;

fn manager(store: &MemoryStore, now: u64) -> (Manager, Arc<ManualClock>) {
  let clock = Arc::new(ManualClock::new(now));
  let m = ArchiveManager::with_clock(
    store.clone(),
    MemFactory(store.clone()),
    Arc::clone(&clock),
  );
  (m, clock)
}

fn every_second(max_count: usize) -> RotationConfig {
  RotationConfig::default()
    .with_retention(RetentionPolicy::MaxCount { max_count })
    .with_min_interval(1)
}

fn names(m: &Manager, base: &str) -> Vec<String> {
  m.archive_tables(base)
    .unwrap()
    .into_iter()
    .map(|a| a.name)
    .collect()
}

// ─── Rotation ────────────────────────────────────────────────────────────────

#[test]
fn archive_moves_rows_into_new_archive() {
  let store = MemoryStore::with_table("widgets", 10);
  let (m, _) = manager(&store, 1_000);

  let rotation = m.archive("widgets", &RotationConfig::default()).unwrap();

  assert_eq!(rotation.archive.name, "widgets_tra_1000");
  assert!(rotation.pruned.dropped.is_empty());
  assert_eq!(store.rows("widgets"), Some(0));
  assert_eq!(store.rows("widgets_tra_1000"), Some(10));
  assert_eq!(store.names().len(), 2);

  let archives = m.list_archives("widgets", None).unwrap();
  assert_eq!(archives.len(), 1);
  assert_eq!(archives[0].count(), 10);
}

#[test]
fn second_archive_within_interval_is_refused() {
  let store = MemoryStore::with_table("widgets", 10);
  let (m, clock) = manager(&store, 1_000);
  let cfg = RotationConfig::default().with_min_interval(60);

  m.archive("widgets", &cfg).unwrap();
  store.put("widgets", 4);
  clock.advance(59);

  let err = m.archive("widgets", &cfg).unwrap_err();
  assert!(matches!(
    err,
    Error::NotEnoughTimeBetweenArchives { min_interval: 60, elapsed: 59, .. }
  ));
  assert_eq!(store.rows("widgets"), Some(4));
  assert_eq!(names(&m, "widgets"), ["widgets_tra_1000"]);

  clock.advance(1);
  m.archive("widgets", &cfg).unwrap();
  assert_eq!(names(&m, "widgets").len(), 2);
}

#[test]
fn existing_archive_at_current_second_aborts_rotation() {
  let store = MemoryStore::with_table("widgets", 10);
  store.put("widgets_tra_1000", 3);
  let (m, _) = manager(&store, 1_000);

  let err = m
    .archive("widgets", &RotationConfig::default().with_min_interval(0))
    .unwrap_err();

  assert!(matches!(err, Error::ArchiveAlreadyExists { ref table } if table == "widgets_tra_1000"));
  assert_eq!(store.rows("widgets"), Some(10));
  assert_eq!(store.rows("widgets_tra_1000"), Some(3));
  assert_eq!(store.names().len(), 2);
}

#[test]
fn failed_rename_keeps_live_rows() {
  let store = MemoryStore::with_table("widgets", 10);
  store.0.borrow_mut().fail_swap = true;
  let (m, _) = manager(&store, 1_000);

  let err = m.archive("widgets", &RotationConfig::default()).unwrap_err();

  assert!(matches!(err, Error::Schema(_)));
  assert_eq!(store.rows("widgets"), Some(10));
  assert!(names(&m, "widgets").is_empty());
  let invalidated = store.0.borrow().invalidated.clone();
  assert!(invalidated.contains(&"widgets".to_owned()));
  assert!(invalidated.contains(&"widgets_tra_1000".to_owned()));
}

#[test]
fn max_count_keeps_the_two_newest() {
  let store = MemoryStore::with_table("widgets", 10);
  let (m, clock) = manager(&store, 1_000);
  let cfg = every_second(2);

  m.archive("widgets", &cfg).unwrap();
  clock.advance(2);
  m.archive("widgets", &cfg).unwrap();
  assert_eq!(m.list_archives("widgets", None).unwrap().len(), 2);
  clock.advance(2);
  let rotation = m.archive("widgets", &cfg).unwrap();

  assert_eq!(rotation.pruned.dropped, ["widgets_tra_1000"]);
  assert_eq!(names(&m, "widgets"), ["widgets_tra_1004", "widgets_tra_1002"]);
}

#[test]
fn default_statements_use_create_like_and_combined_rename() {
  struct Recording(RefCell<Vec<String>>);

  impl SchemaGateway for Recording {
    type Error = MemError;
    fn list_tables(&self) -> Result<Vec<String>, MemError> { Ok(vec!["widgets".into()]) }
    fn execute(&self, statement: &str) -> Result<(), MemError> {
      self.0.borrow_mut().push(statement.to_owned());
      Ok(())
    }
    fn invalidate_schema_cache(&self, _: &str) {}
  }

  let gateway = Recording(RefCell::default());
  let archive = rotator::rotate(&gateway, &ManualClock::new(42), "widgets").unwrap();
  gateway.drop_table(&archive.name).unwrap();

  assert_eq!(*gateway.0.borrow(), [
    "CREATE TABLE widgets_tra_new LIKE widgets",
    "RENAME TABLE widgets TO widgets_tra_42, widgets_tra_new TO widgets",
    "DROP TABLE widgets_tra_42",
  ]);
}

// ─── Directory & guard ───────────────────────────────────────────────────────

#[test]
fn listing_orders_numerically_newest_first() {
  let store = MemoryStore::with_table("widgets", 0);
  for ts in [9, 100, 10] {
    store.put(&format!("widgets_tra_{ts}"), 0);
  }
  let (m, _) = manager(&store, 1_000);

  assert_eq!(names(&m, "widgets"), [
    "widgets_tra_100",
    "widgets_tra_10",
    "widgets_tra_9",
  ]);
}

#[test]
fn listing_rotations_at_increasing_timestamps_is_descending() {
  let store = MemoryStore::with_table("widgets", 1);
  let (m, clock) = manager(&store, 98);
  let cfg = every_second(10).with_min_interval(0);

  for _ in 0..4 {
    m.archive("widgets", &cfg).unwrap();
    clock.advance(1);
  }

  let stamps: Vec<_> = m
    .archive_tables("widgets")
    .unwrap()
    .into_iter()
    .map(|a| a.timestamp)
    .collect();
  assert_eq!(stamps, [101, 100, 99, 98]);
}

#[test]
fn listing_ignores_lookalike_tables() {
  let store = MemoryStore::with_table("widgets", 0);
  for name in [
    "widgets2_tra_5",
    "widgets_tra_new",
    "widgets_tra_5x",
    "old_widgets_tra_5",
    "widgets_tra_7",
  ] {
    store.put(name, 0);
  }
  let (m, _) = manager(&store, 1_000);

  assert_eq!(names(&m, "widgets"), ["widgets_tra_7"]);
}

#[test]
fn listing_surfaces_unparseable_timestamps() {
  let store = MemoryStore::with_table("widgets", 0);
  store.put("widgets_tra_99999999999999999999999", 0);

  let err = directory::list(&store, "widgets").unwrap_err();
  assert!(matches!(err, Error::InvalidTimestamp { .. }));
}

#[test]
fn guard_allows_first_rotation_and_checks_newest_only() {
  let store = MemoryStore::with_table("widgets", 0);
  let clock = ManualClock::new(1_000);

  assert!(guard::can_rotate(&store, &clock, "widgets", u64::MAX).unwrap());

  store.put("widgets_tra_100", 0);
  store.put("widgets_tra_900", 0);
  assert!(guard::can_rotate(&store, &clock, "widgets", 100).unwrap());
  assert!(!guard::can_rotate(&store, &clock, "widgets", 101).unwrap());
}

#[test]
fn guard_treats_future_archive_as_just_created() {
  let store = MemoryStore::with_table("widgets", 0);
  store.put("widgets_tra_5000", 0);
  let clock = ManualClock::new(1_000);

  assert!(!guard::can_rotate(&store, &clock, "widgets", 1).unwrap());
  assert!(guard::can_rotate(&store, &clock, "widgets", 0).unwrap());
}

// ─── Retention ───────────────────────────────────────────────────────────────

fn store_with_archives(stamps: &[u64]) -> MemoryStore {
  let store = MemoryStore::with_table("widgets", 0);
  for ts in stamps {
    store.put(&format!("widgets_tra_{ts}"), 1);
  }
  store
}

#[test]
fn age_cutoff_keeps_archive_exactly_at_boundary() {
  let store = store_with_archives(&[100, 200, 300]);
  let (m, _) = manager(&store, 1_000);
  let cfg = RotationConfig::default()
    .with_retention(RetentionPolicy::OlderThan { cutoff: 200 });

  let report = m.prune("widgets", &cfg).unwrap();

  assert_eq!(report.dropped, ["widgets_tra_100"]);
  assert_eq!(names(&m, "widgets"), ["widgets_tra_300", "widgets_tra_200"]);
}

#[test]
fn max_age_cutoff_is_relative_to_now() {
  let store = store_with_archives(&[100, 199, 200, 300]);
  let (m, _) = manager(&store, 1_000);
  let cfg = RotationConfig::default()
    .with_retention(RetentionPolicy::MaxAge { max_age_secs: 800 });

  let report = m.prune("widgets", &cfg).unwrap();

  assert_eq!(report.dropped, ["widgets_tra_100", "widgets_tra_199"]);
  assert!(report.is_clean());
}

#[test]
fn pruning_never_touches_lookalike_tables() {
  let store = store_with_archives(&[1, 2]);
  for name in ["widgets2_tra_1", "widgets_tra_new", "widgets_tra_3_copy"] {
    store.put(name, 1);
  }
  let (m, _) = manager(&store, 1_000);

  let report = m.prune("widgets", &every_second(0)).unwrap();

  assert_eq!(report.dropped, ["widgets_tra_1", "widgets_tra_2"]);
  assert_eq!(store.names(), [
    "widgets",
    "widgets2_tra_1",
    "widgets_tra_3_copy",
    "widgets_tra_new",
  ]);
}

#[test]
fn fail_fast_stops_at_first_failed_drop() {
  let store = store_with_archives(&[100, 200, 300]);
  store.fail_drop_of("widgets_tra_100");
  let (m, _) = manager(&store, 1_000);

  let err = m.prune("widgets", &every_second(1)).unwrap_err();

  match err {
    Error::PruneAborted { table, dropped, source } => {
      assert_eq!(table, "widgets_tra_100");
      assert!(dropped.is_empty());
      assert!(matches!(*source, Error::Schema(_)));
    }
    other => panic!("unexpected error: {other:?}"),
  }
  assert_eq!(names(&m, "widgets").len(), 3);
}

#[test]
fn best_effort_skips_failed_drop_without_sacrificing_newer_archives() {
  let store = store_with_archives(&[100, 200, 300]);
  store.fail_drop_of("widgets_tra_100");
  let (m, _) = manager(&store, 1_000);
  let cfg = every_second(1).with_prune_mode(PruneMode::BestEffort);

  let report = m.prune("widgets", &cfg).unwrap();

  assert_eq!(report.dropped, ["widgets_tra_200"]);
  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].table, "widgets_tra_100");
  assert_eq!(names(&m, "widgets"), ["widgets_tra_300", "widgets_tra_100"]);
}

// ─── Binder & view ───────────────────────────────────────────────────────────

#[test]
fn query_all_without_archives_is_just_live() {
  let store = MemoryStore::with_table("widgets", 10);
  let (m, _) = manager(&store, 1_000);

  let counts = m.with_archives("widgets", None, MemEntity::count).unwrap();
  assert_eq!(counts, [10]);
}

#[test]
fn query_all_puts_live_first_then_newest_archives() {
  let store = MemoryStore::with_table("widgets", 10);
  let (m, clock) = manager(&store, 1_000);
  let cfg = every_second(5);

  m.archive("widgets", &cfg).unwrap();
  store.put("widgets", 2);
  clock.advance(1);
  m.archive("widgets", &cfg).unwrap();
  store.put("widgets", 1);

  let counts = m.with_archives("widgets", None, MemEntity::count).unwrap();
  assert_eq!(counts, [1, 2, 10]);

  let limited = m.query_all("widgets", Some(1)).unwrap();
  assert_eq!(limited.len(), 2);
  assert_eq!(limited[1].name, "widgets_tra_1001");

  assert_eq!(m.list_archives("widgets", Some(10)).unwrap().len(), 2);
}

#[test]
fn query_all_requires_live_table() {
  let store = MemoryStore::default();
  let (m, _) = manager(&store, 1_000);

  let err = m.query_all("widgets", None).unwrap_err();
  assert!(matches!(err, Error::TableNotFound(ref t) if t == "widgets"));
}

#[test]
fn dropped_archive_no_longer_resolves() {
  let store = store_with_archives(&[100, 200]);
  let (m, _) = manager(&store, 1_000);

  assert!(m.binder().resolve("widgets_tra_100").unwrap().is_some());
  m.prune("widgets", &every_second(1)).unwrap();

  assert!(m.binder().resolve("widgets_tra_100").unwrap().is_none());
}

#[test]
fn stale_absence_is_refreshed_once() {
  let store = MemoryStore::with_table("widgets", 0);
  let (m, _) = manager(&store, 1_000);

  assert!(m.binder().resolve("widgets_tra_5").unwrap().is_none());
  store.put("widgets_tra_5", 3);

  let entity = m.binder().resolve("widgets_tra_5").unwrap().unwrap();
  assert_eq!(entity.count(), 3);
}
