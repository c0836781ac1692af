//! Data-access layer for tabula
//!
//! This module provides the storage layer using SQLite with:
//! - A serialized connection manager around the single database file
//! - Declarative table schemas and a generic CRUD model
//! - Transaction scopes that commit on success and roll back on error
//! - A registry that creates every declared table at startup

pub mod conn;
pub mod model;
pub mod registry;
pub mod schema;
pub mod value;

pub use conn::{Database, ExecResult, Executor, Transaction};
pub use model::{Filter, Model, Op, Order};
pub use registry::ModelRegistry;
pub use schema::{Column, ColumnType, TableSchema};
pub use value::{Record, Value};
