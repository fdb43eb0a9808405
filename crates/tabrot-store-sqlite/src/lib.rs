//! SQLite backend for table rotation.
//!
//! [`SqliteStore`] implements both [`tabrot_core::SchemaGateway`] and
//! [`tabrot_core::EntityFactory`]; its entities are [`SqliteTable`] handles.
//! All access is synchronous on a single shared connection.

mod encode;
mod schema;
mod store;
mod table;

pub mod error;

pub use encode::Row;
pub use error::{Error, Result};
pub use store::{SqliteArchiveManager, SqliteStore};
pub use table::{Column, SqliteTable, TableMeta};
