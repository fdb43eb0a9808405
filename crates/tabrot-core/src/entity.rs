//! Binding table names to queryable entity handles.
//!
//! An entity is a single handle type carrying its physical table name; one is
//! produced per table on demand by an [`EntityFactory`]. The [`EntityBinder`]
//! owns the only cache of those handles and must be told about every DDL that
//! touches a table, otherwise existence and column metadata go stale across
//! rotations.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use tracing::debug;

use crate::{Error, Result};

// ─── Factory ─────────────────────────────────────────────────────────────────

/// The ORM-side collaborator: turns table names into bound entities.
pub trait EntityFactory {
  /// A queryable binding to exactly one physical table.
  type Entity: Clone;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Build an entity bound to `table`, independent of any default binding.
  fn entity_for(&self, table: &str) -> Result<Self::Entity, Self::Error>;

  /// Whether the entity's table exists, as far as its metadata knows.
  fn table_exists(&self, entity: &Self::Entity) -> Result<bool, Self::Error>;

  /// Drop whatever metadata the entity has cached about its table.
  fn reset_metadata(&self, entity: &Self::Entity);
}

// ─── Binder ──────────────────────────────────────────────────────────────────

pub struct EntityBinder<F: EntityFactory> {
  factory: F,
  cache:   Mutex<HashMap<String, F::Entity>>,
}

impl<F: EntityFactory> EntityBinder<F> {
  pub fn new(factory: F) -> Self {
    Self { factory, cache: Mutex::new(HashMap::new()) }
  }

  pub fn factory(&self) -> &F { &self.factory }

  /// Resolve `table` to an entity, or `None` if the table does not exist.
  ///
  /// Absence is normal (e.g. more archives requested than exist) and is not
  /// an error. A cached handle that reports absence gets one metadata refresh
  /// before the answer is trusted.
  pub fn resolve(&self, table: &str) -> Result<Option<F::Entity>> {
    let entity = self.cached_or_bind(table)?;

    if self.exists(&entity)? {
      return Ok(Some(entity));
    }

    self.factory.reset_metadata(&entity);
    if self.exists(&entity)? {
      Ok(Some(entity))
    } else {
      debug!(table, "no table exists");
      Ok(None)
    }
  }

  /// Forget everything cached about `table`. Call after any create, rename or
  /// drop that affects it.
  pub fn invalidate(&self, table: &str) {
    let removed = self.lock().remove(table);
    if let Some(entity) = removed {
      self.factory.reset_metadata(&entity);
      debug!(table, "invalidated entity cache");
    }
  }

  fn cached_or_bind(&self, table: &str) -> Result<F::Entity> {
    if let Some(entity) = self.lock().get(table) {
      return Ok(entity.clone());
    }
    let entity = self.factory.entity_for(table).map_err(Error::schema)?;
    self.lock().insert(table.to_owned(), entity.clone());
    Ok(entity)
  }

  fn exists(&self, entity: &F::Entity) -> Result<bool> {
    self.factory.table_exists(entity).map_err(Error::schema)
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, F::Entity>> {
    self.cache.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
