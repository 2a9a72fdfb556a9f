//! Core types and traits for linkmodel.
//!
//! This crate provides the foundational abstractions shared by the query,
//! schema and association crates:
//!
//! - `Model` trait for ORM-style struct mapping
//! - `Connection` trait and `Dialect` for talking to a database
//! - `Clock`/`Timezone` for timestamp columns
//! - `JoinTableReflection` and `SqlTemplate` for many-to-many configuration
//! - `Outcome` re-export from asupersync for cancel-correct operations
//! - `Cx` context for structured concurrency

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod clock;
pub mod connection;
pub mod error;
pub mod field;
pub mod model;
pub mod reflection;
pub mod row;
pub mod template;
pub mod value;

pub use clock::{Clock, FixedClock, SystemClock, Timezone};
pub use connection::{Connection, Dialect};
pub use error::{
    ConfigError, ConnectionError, Error, FieldValidationError, QueryError, ReadOnlyError, Result,
    TypeError, ValidationError, ValidationErrorKind,
};
pub use field::FieldInfo;
pub use model::{AutoIncrement, Model};
pub use reflection::{JoinTableOptions, JoinTableReflection, JoinTableReflectionBuilder};
pub use row::{ColumnInfo, FromValue, Row};
pub use template::{Placeholder, SqlTemplate, TemplateBindings};
pub use value::Value;
