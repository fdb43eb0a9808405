//! [`SqliteStore`] — the SQLite implementation of [`SchemaGateway`] and
//! [`EntityFactory`].

use std::{
  path::Path,
  sync::{Arc, Mutex, PoisonError},
};

use rusqlite::Connection;
use tabrot_core::{ArchiveManager, EntityFactory, SchemaGateway};
use tracing::debug;

use crate::{
  Error, Result, SqliteTable,
  schema::{self, quote},
};

/// An [`ArchiveManager`] whose gateway and entity factory are the same store.
pub type SqliteArchiveManager = ArchiveManager<SqliteStore, SqliteStore>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A SQLite database whose tables can be rotated.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  /// Open (or create) the database at `path`.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    Ok(Self::from_connection(Connection::open(path)?))
  }

  /// Open an in-memory database — useful for testing.
  pub fn open_in_memory() -> Result<Self> {
    Ok(Self::from_connection(Connection::open_in_memory()?))
  }

  pub fn from_connection(conn: Connection) -> Self {
    Self { conn: Arc::new(Mutex::new(conn)) }
  }

  /// An [`ArchiveManager`] over this store using the system clock.
  pub fn manager(&self) -> SqliteArchiveManager {
    ArchiveManager::new(self.clone(), self.clone())
  }

  /// Run `f` with exclusive access to the connection.
  pub fn call<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
    f(&conn)
  }

  /// Execute one or more `;`-separated statements.
  pub fn execute_batch(&self, sql: &str) -> Result<()> {
    self.call(|conn| Ok(conn.execute_batch(sql)?))
  }
}

// ─── SchemaGateway impl ──────────────────────────────────────────────────────

impl SchemaGateway for SqliteStore {
  type Error = Error;

  fn list_tables(&self) -> Result<Vec<String>> {
    self.call(|conn| {
      let mut stmt = conn.prepare_cached(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
         ORDER BY name",
      )?;
      let names = stmt
        .query_map([], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
      Ok(names)
    })
  }

  fn execute(&self, statement: &str) -> Result<()> { self.execute_batch(statement) }

  fn invalidate_schema_cache(&self, table: &str) {
    self.call(|conn| {
      conn.flush_prepared_statement_cache();
      Ok(())
    })
    .ok();
    debug!(table, "flushed prepared statement cache");
  }

  /// Copy the template's table DDL and each explicit index in one
  /// transaction. Triggers are not copied.
  fn create_table_like(&self, new_table: &str, template: &str) -> Result<()> {
    self.call(|conn| {
      let sql = schema::table_sql(conn, template)?
        .ok_or_else(|| Error::MissingTable(template.to_owned()))?;

      let tx = conn.unchecked_transaction()?;
      tx.execute_batch(&schema::clone_table_sql(&sql, new_table)?)?;

      let mut taken = schema::index_names(&tx)?;
      for (index, index_sql) in schema::explicit_indexes(&tx, template)? {
        let fresh = schema::fresh_index_name(&index, &mut taken);
        tx.execute_batch(&schema::clone_index_sql(&index_sql, &fresh, new_table)?)?;
      }

      tx.commit()?;
      debug!(new_table, template, "created table like template");
      Ok(())
    })
  }

  /// Both renames run in one transaction. `legacy_alter_table` is engaged so
  /// that views and triggers elsewhere keep referring to the live name rather
  /// than following the old table into the archive.
  fn swap_tables(&self, live: &str, archive: &str, replacement: &str) -> Result<()> {
    self.call(|conn| {
      conn.execute_batch("PRAGMA legacy_alter_table = ON")?;

      let swapped = conn.unchecked_transaction().and_then(|tx| {
        tx.execute_batch(&format!(
          "ALTER TABLE {live_q} RENAME TO {archive_q};
           ALTER TABLE {replacement_q} RENAME TO {live_q};",
          live_q = quote(live),
          archive_q = quote(archive),
          replacement_q = quote(replacement),
        ))?;
        tx.commit()
      });

      conn.execute_batch("PRAGMA legacy_alter_table = OFF")?;
      Ok(swapped?)
    })
  }

  fn drop_table(&self, table: &str) -> Result<()> {
    self.execute_batch(&format!("DROP TABLE {}", quote(table)))
  }
}

// ─── EntityFactory impl ──────────────────────────────────────────────────────

impl EntityFactory for SqliteStore {
  type Entity = SqliteTable;
  type Error = Error;

  fn entity_for(&self, table: &str) -> Result<SqliteTable> {
    Ok(SqliteTable::new(self.clone(), table))
  }

  fn table_exists(&self, entity: &SqliteTable) -> Result<bool> {
    Ok(entity.metadata()?.exists)
  }

  fn reset_metadata(&self, entity: &SqliteTable) { entity.reset_metadata(); }
}
