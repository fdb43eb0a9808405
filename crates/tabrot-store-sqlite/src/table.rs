//! [`SqliteTable`] — an entity handle bound to one physical table.
//!
//! The same type serves the live table and every archive; only the name it
//! carries differs. Existence and column metadata are loaded lazily and cached
//! until [`SqliteTable::reset_metadata`].

use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::{Params, params_from_iter};
use serde::Serialize;
use tracing::debug;

use crate::{
  Result, SqliteStore,
  encode::{Row, decode_row, encode_value},
  schema::quote,
};

// ─── Metadata ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
  pub name:        String,
  pub decl_type:   String,
  pub primary_key: bool,
}

/// What is known about a table as of the last metadata load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMeta {
  pub exists:  bool,
  pub columns: Vec<Column>,
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// A queryable binding to exactly one physical table.
///
/// Clones share the metadata cache, so resetting one resets all of them.
#[derive(Clone)]
pub struct SqliteTable {
  store: SqliteStore,
  name:  String,
  meta:  Arc<Mutex<Option<TableMeta>>>,
}

impl std::fmt::Debug for SqliteTable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteTable").field("name", &self.name).finish_non_exhaustive()
  }
}

impl SqliteTable {
  pub(crate) fn new(store: SqliteStore, name: &str) -> Self {
    Self { store, name: name.to_owned(), meta: Arc::default() }
  }

  pub fn name(&self) -> &str { &self.name }

  /// Cached metadata, loading it on first use.
  pub fn metadata(&self) -> Result<TableMeta> {
    let mut meta = self.meta.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(m) = meta.as_ref() {
      return Ok(m.clone());
    }
    let loaded = self.load_metadata()?;
    *meta = Some(loaded.clone());
    Ok(loaded)
  }

  pub fn reset_metadata(&self) {
    *self.meta.lock().unwrap_or_else(PoisonError::into_inner) = None;
    debug!(table = %self.name, "reset table metadata");
  }

  fn load_metadata(&self) -> Result<TableMeta> {
    let name = self.name.clone();
    self.store.call(move |conn| {
      let exists = conn
        .prepare_cached("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
        .exists([&name])?;

      let mut stmt =
        conn.prepare_cached("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
      let columns = stmt
        .query_map([&name], |row| {
          Ok(Column {
            name:        row.get(0)?,
            decl_type:   row.get(1)?,
            primary_key: row.get::<_, i64>(2)? > 0,
          })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

      Ok(TableMeta { exists, columns })
    })
  }

  /// The single-column primary key, falling back to `rowid`.
  fn key_column(&self) -> Result<String> {
    let columns = self.metadata()?.columns;
    let mut keys = columns.iter().filter(|c| c.primary_key);
    Ok(match (keys.next(), keys.next()) {
      (Some(only), None) => only.name.clone(),
      _ => "rowid".to_owned(),
    })
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  pub fn count(&self) -> Result<u64> {
    self.count_where("1", [])
  }

  /// Rows matching a SQL `predicate`, with `?N` placeholders bound to
  /// `params`.
  pub fn count_where<P: Params>(&self, predicate: &str, params: P) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {predicate}", quote(&self.name));
    self.store.call(|conn| {
      let n: i64 = conn.prepare_cached(&sql)?.query_row(params, |r| r.get(0))?;
      Ok(u64::try_from(n).unwrap_or(0))
    })
  }

  pub fn find_by_id(&self, id: i64) -> Result<Option<Row>> {
    let key = self.key_column()?;
    let predicate = format!("{} = ?1", quote(&key));
    Ok(self.rows_where(&predicate, [id])?.into_iter().next())
  }

  pub fn rows(&self) -> Result<Vec<Row>> { self.rows_where("1", []) }

  pub fn rows_where<P: Params>(&self, predicate: &str, params: P) -> Result<Vec<Row>> {
    let sql = format!("SELECT * FROM {} WHERE {predicate}", quote(&self.name));
    self.store.call(|conn| {
      let mut stmt = conn.prepare_cached(&sql)?;
      let columns: Vec<String> =
        stmt.column_names().into_iter().map(str::to_owned).collect();
      let rows = stmt
        .query_map(params, |row| decode_row(row, &columns))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
  }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Insert one row and return its rowid.
  pub fn insert(&self, row: &Row) -> Result<i64> {
    let sql = if row.is_empty() {
      format!("INSERT INTO {} DEFAULT VALUES", quote(&self.name))
    } else {
      let columns: Vec<String> = row.keys().map(|k| quote(k)).collect();
      let slots: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
      format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(&self.name),
        columns.join(", "),
        slots.join(", ")
      )
    };
    let values = row.values().map(encode_value);

    self.store.call(|conn| {
      conn.prepare_cached(&sql)?.execute(params_from_iter(values))?;
      Ok(conn.last_insert_rowid())
    })
  }
}
