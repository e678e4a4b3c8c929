//! Database abstraction layer
//!
//! This module provides a trait-based abstraction over the engine, so the
//! registries and executor can run against PostgreSQL or a scripted driver
//! in tests.

pub mod postgres;
pub mod provider;
pub mod schema;
pub mod types;

// Re-export main types
pub use provider::{Driver, Session};
pub use schema::{Column, Function, Schema, SchemaTree, Table};
pub use types::{CellValue, ColumnDef, DataType, Row, StatementResult};
