//! Schema introspection for linkmodel.
//!
//! This crate asks the database about tables the models do not describe,
//! chiefly join tables:
//! - Column listing in declaration order
//! - Primary key detection

pub mod introspect;

pub use introspect::{ColumnInfo, Introspector};
