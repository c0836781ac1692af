//! # tabula-core
//!
//! Core library for tabula - a schema-driven data-access layer over an
//! embedded SQLite database.
//!
//! This library provides:
//! - A serialized connection manager for the single database file
//! - Declarative table schemas and a generic CRUD model built on them
//! - Transaction scopes with rollback on error
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Feature modules declare models (a table name plus a column schema), a
//! registry creates every declared table at startup, and all CRUD flows
//! through one serialized connection:
//!
//! declare `Model` → `ModelRegistry::bootstrap` → generic CRUD →
//! parameterized statement → `Database` → `Record` back to the caller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tabula_core::db::{Column, Database, Model, ModelRegistry, Record, TableSchema};
//! use tabula_core::Config;
//!
//! # fn main() -> tabula_core::Result<()> {
//! // Load configuration and open the database
//! let config = Config::load()?;
//! let db = Database::open(&config.database)?;
//!
//! // Declare a model
//! let users = Model::new(TableSchema::new(
//!     "users",
//!     vec![
//!         Column::integer("id").primary_key().autoincrement(),
//!         Column::text("name").not_null().unique(),
//!         Column::integer("score").default_value(0),
//!     ],
//! ));
//!
//! // Create tables, then use the generic CRUD surface
//! let mut registry = ModelRegistry::new();
//! registry.register(users.clone());
//! registry.bootstrap(&db)?;
//!
//! let key = users.create(&db, &Record::new().with("name", "alice"))?;
//! let row = users.get_by_id(&db, key)?;
//! # let _ = row;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{Database, Model, ModelRegistry, Record, Value};
pub use error::{Error, Result};

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
