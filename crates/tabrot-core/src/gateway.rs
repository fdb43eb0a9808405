//! The `SchemaGateway` trait: the slice of a SQL engine that rotation needs.
//!
//! The provided methods issue MySQL-flavoured DDL (`CREATE TABLE ... LIKE`,
//! multi-table `RENAME TABLE`). Backends whose dialect differs override them.

/// Abstraction over the physical schema of a relational store.
///
/// All calls are synchronous. Implementations must report the live schema on
/// every [`list_tables`](Self::list_tables) call; nothing above this layer
/// caches the listing.
pub trait SchemaGateway {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Names of every table in the store.
  fn list_tables(&self) -> Result<Vec<String>, Self::Error>;

  /// Execute a single DDL or DML statement.
  fn execute(&self, statement: &str) -> Result<(), Self::Error>;

  /// Forget any cached schema information held for `table`.
  fn invalidate_schema_cache(&self, table: &str);

  /// Create `new_table` with the same columns, types and indexes as
  /// `template`, but no rows.
  fn create_table_like(
    &self,
    new_table: &str,
    template: &str,
  ) -> Result<(), Self::Error> {
    self.execute(&format!("CREATE TABLE {new_table} LIKE {template}"))
  }

  /// Atomically rename `live` to `archive` and `replacement` to `live`.
  ///
  /// Either both renames take effect or neither does.
  fn swap_tables(
    &self,
    live: &str,
    archive: &str,
    replacement: &str,
  ) -> Result<(), Self::Error> {
    self.execute(&format!(
      "RENAME TABLE {live} TO {archive}, {replacement} TO {live}"
    ))
  }

  fn drop_table(&self, table: &str) -> Result<(), Self::Error> {
    self.execute(&format!("DROP TABLE {table}"))
  }
}

impl<G: SchemaGateway + ?Sized> SchemaGateway for &G {
  type Error = G::Error;

  fn list_tables(&self) -> Result<Vec<String>, Self::Error> { (**self).list_tables() }

  fn execute(&self, statement: &str) -> Result<(), Self::Error> {
    (**self).execute(statement)
  }

  fn invalidate_schema_cache(&self, table: &str) {
    (**self).invalidate_schema_cache(table)
  }

  fn create_table_like(
    &self,
    new_table: &str,
    template: &str,
  ) -> Result<(), Self::Error> {
    (**self).create_table_like(new_table, template)
  }

  fn swap_tables(
    &self,
    live: &str,
    archive: &str,
    replacement: &str,
  ) -> Result<(), Self::Error> {
    (**self).swap_tables(live, archive, replacement)
  }

  fn drop_table(&self, table: &str) -> Result<(), Self::Error> {
    (**self).drop_table(table)
  }
}
