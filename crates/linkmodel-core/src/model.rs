//! Model trait for ORM-style struct mapping.
//!
//! The `Model` trait defines the contract for structs that can be mapped to
//! database tables: where they live, how they convert to and from rows, and
//! which of their columns are timestamps maintained by the ORM.

use crate::Result;
use crate::clock::Timezone;
use crate::error::ValidationError;
use crate::field::FieldInfo;
use crate::row::Row;
use crate::value::Value;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// impl Model for Project {
///     const TABLE_NAME: &'static str = "projects";
///     const PRIMARY_KEY: &'static [&'static str] = &["id"];
///     const TIMESTAMP_COLUMNS: &'static [&'static str] = &["created_at", "updated_at"];
///
///     fn fields() -> &'static [FieldInfo] { &PROJECT_FIELDS }
///     fn to_row(&self) -> Vec<(&'static str, Value)> { ... }
///     fn from_row(row: &Row) -> Result<Self> { ... }
///     fn primary_key_value(&self) -> Vec<Value> { vec![self.id.into()] }
///     fn is_new(&self) -> bool { self.id.is_none() }
/// }
/// ```
pub trait Model: Sized + Send + Sync {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name(s).
    const PRIMARY_KEY: &'static [&'static str];

    /// Columns holding creation/update timestamps maintained by the ORM.
    const TIMESTAMP_COLUMNS: &'static [&'static str] = &[];

    /// Timezone used when the ORM stamps the current time.
    const DEFAULT_TIMEZONE: Timezone = Timezone::Utc;

    /// Get field metadata for all columns.
    fn fields() -> &'static [FieldInfo];

    /// Convert this model instance to a row of values.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct a model instance from a database row.
    #[allow(clippy::result_large_err)]
    fn from_row(row: &Row) -> Result<Self>;

    /// Get the value of the primary key field(s).
    fn primary_key_value(&self) -> Vec<Value>;

    /// Check if this is a new record (primary key is None/default).
    fn is_new(&self) -> bool;

    /// The first primary key column, `"id"` when none is declared.
    fn primary_key_column() -> &'static str {
        Self::PRIMARY_KEY.first().copied().unwrap_or("id")
    }

    /// Identifier of this record: the first primary key value, or NULL.
    fn id(&self) -> Value {
        self.primary_key_value()
            .into_iter()
            .next()
            .unwrap_or(Value::Null)
    }

    /// Whether this record stamps its timestamp columns.
    fn record_timestamps(&self) -> bool {
        !Self::TIMESTAMP_COLUMNS.is_empty()
    }

    /// Whether the record exposes a column with this name.
    fn has_attribute(&self, column: &str) -> bool {
        Self::fields().iter().any(|f| f.column_name == column)
    }

    /// The record's current value for a column, if it has one.
    fn attribute(&self, column: &str) -> Option<Value> {
        self.to_row()
            .into_iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Validate the record before it is saved.
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        Ok(())
    }
}

/// Marker trait for models that support automatic ID generation.
pub trait AutoIncrement: Model {
    /// Set the auto-generated ID after insert.
    fn set_id(&mut self, id: i64);
}
