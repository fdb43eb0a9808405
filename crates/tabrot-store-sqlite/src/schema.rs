//! Cloning table and index DDL out of `sqlite_master`.
//!
//! SQLite has no `CREATE TABLE ... LIKE`, so the template's stored statements
//! are rewritten under new names. Index names are global in SQLite, so every
//! copied index gets a fresh name of the form `{stem}_r{k}`.

use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension as _};

use crate::{Error, Result};

/// Quote an identifier for interpolation into DDL.
pub fn quote(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

/// `CREATE TABLE` text for `table`, or `None` if no such table exists.
pub fn table_sql(conn: &Connection, table: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
      [table],
      |r| r.get(0),
    )
    .optional()
}

/// `(name, sql)` of every index on `table` created by `CREATE INDEX`.
///
/// Indexes backing `PRIMARY KEY`/`UNIQUE` constraints are excluded; the table
/// DDL recreates those by itself.
pub fn explicit_indexes(
  conn: &Connection,
  table: &str,
) -> rusqlite::Result<Vec<(String, String)>> {
  let mut stmt = conn.prepare(
    "SELECT il.name, m.sql
     FROM pragma_index_list(?1) il
     JOIN sqlite_master m ON m.type = 'index' AND m.name = il.name
     WHERE il.origin = 'c' AND m.sql IS NOT NULL
     ORDER BY il.name",
  )?;
  let rows = stmt
    .query_map([table], |r| Ok((r.get(0)?, r.get(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn index_names(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
  let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'index'")?;
  let names = stmt
    .query_map([], |r| r.get(0))?
    .collect::<rusqlite::Result<HashSet<_>>>()?;
  Ok(names)
}

/// Rewrite `CREATE TABLE <old> (...)` as `CREATE TABLE "<new>" (...)`.
pub fn clone_table_sql(sql: &str, new_table: &str) -> Result<String> {
  let malformed = |reason| Error::MalformedSchema { name: new_table.to_owned(), reason };

  if !starts_with_keywords(sql, &["CREATE", "TABLE"]) {
    return Err(malformed("not a plain CREATE TABLE statement"));
  }
  let body = unquoted(sql)
    .find(|&i| sql.as_bytes()[i] == b'(')
    .ok_or_else(|| malformed("no column list"))?;
  Ok(format!("CREATE TABLE {} {}", quote(new_table), &sql[body..]))
}

/// Rewrite a `CREATE [UNIQUE] INDEX` statement to index `new_table` under
/// `new_index`. Column list and any partial-index `WHERE` clause are kept.
pub fn clone_index_sql(sql: &str, new_index: &str, new_table: &str) -> Result<String> {
  let malformed = |reason| Error::MalformedSchema { name: new_index.to_owned(), reason };

  let unique = starts_with_keywords(sql, &["CREATE", "UNIQUE", "INDEX"]);
  if !unique && !starts_with_keywords(sql, &["CREATE", "INDEX"]) {
    return Err(malformed("not a CREATE INDEX statement"));
  }
  let on = find_keyword(sql, "ON").ok_or_else(|| malformed("no ON clause"))?;
  let columns = unquoted(sql)
    .find(|&i| i > on && sql.as_bytes()[i] == b'(')
    .ok_or_else(|| malformed("no column list"))?;

  Ok(format!(
    "CREATE {}INDEX {} ON {} {}",
    if unique { "UNIQUE " } else { "" },
    quote(new_index),
    quote(new_table),
    &sql[columns..]
  ))
}

/// Pick `{stem}_r{k}` with the smallest `k` not in `taken`, where `stem` is
/// `index` with any previous `_r{k}` suffix removed. The chosen name is added
/// to `taken`.
pub fn fresh_index_name(index: &str, taken: &mut HashSet<String>) -> String {
  let stem = match index.rsplit_once("_r") {
    Some((stem, k)) if !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()) => stem,
    _ => index,
  };

  let name = (1u64..)
    .map(|k| format!("{stem}_r{k}"))
    .find(|candidate| !taken.contains(candidate))
    .unwrap_or_else(|| format!("{stem}_r0"));
  taken.insert(name.clone());
  name
}

fn starts_with_keywords(sql: &str, keywords: &[&str]) -> bool {
  let mut words = sql.split_whitespace();
  keywords
    .iter()
    .all(|kw| words.next().is_some_and(|w| w.eq_ignore_ascii_case(kw)))
}

/// Byte offsets of `sql` outside quoted identifiers and string literals.
fn unquoted(sql: &str) -> impl Iterator<Item = usize> + '_ {
  let bytes = sql.as_bytes();
  let mut closer: Option<u8> = None;
  (0..bytes.len()).filter(move |&i| {
    let b = bytes[i];
    match closer {
      Some(c) => {
        if b == c {
          closer = None;
        }
        false
      }
      None => match b {
        b'"' | b'`' | b'\'' => {
          closer = Some(b);
          false
        }
        b'[' => {
          closer = Some(b']');
          false
        }
        _ => true,
      },
    }
  })
}

/// Byte offset of the first unquoted `keyword` not embedded in a longer
/// identifier, ignoring case.
fn find_keyword(sql: &str, keyword: &str) -> Option<usize> {
  let bytes = sql.as_bytes();
  let kw = keyword.as_bytes();
  let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'$';

  unquoted(sql).find(|&i| {
    bytes.len() - i >= kw.len()
      && bytes[i..i + kw.len()].eq_ignore_ascii_case(kw)
      && i.checked_sub(1).is_none_or(|p| !is_ident(bytes[p]))
      && bytes.get(i + kw.len()).is_none_or(|&b| !is_ident(b))
  })
}
