//! Core types and trait definitions for table rotation.
//!
//! A *base table* accumulates rows. Rotation renames it to a timestamped
//! archive (`{base}_tra_{timestamp}`), installs a fresh empty table under the
//! base name, and prunes archives beyond a retention policy. Reads can fan out
//! across the live table and any number of archives.
//!
//! This crate is deliberately free of database dependencies. Backends
//! implement [`SchemaGateway`] and [`EntityFactory`]; everything else is
//! driven through [`ArchiveManager`].

pub mod clock;
pub mod config;
pub mod directory;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod manager;
pub mod naming;
pub mod retention;
pub mod rotator;
pub mod view;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::RotationConfig;
pub use directory::ArchiveTable;
pub use entity::{EntityBinder, EntityFactory};
pub use error::{Error, Result};
pub use gateway::SchemaGateway;
pub use manager::{ArchiveManager, Rotation};
pub use retention::{PruneFailure, PruneMode, PruneReport, RetentionPolicy};

#[cfg(test)]
mod tests;
