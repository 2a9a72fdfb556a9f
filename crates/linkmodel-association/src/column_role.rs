//! How each join-table column gets its value on insert.
//!
//! Roles are resolved once, when the join table's columns are first loaded.
//! Producing a value is then a pure function of the role, the owner's id,
//! the record being linked and a clock.

use linkmodel_core::{Clock, Model, Value};

/// Where a join-table column takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// The owner's foreign key: takes the owner's id.
    OwnerForeignKey,
    /// The target's foreign key: takes the record's id.
    TargetForeignKey,
    /// A timestamp column of the target model: takes the current time.
    Timestamp,
    /// Any other column: copied from the record when it has that attribute.
    Passthrough,
}

impl ColumnRole {
    /// Resolve a column's role.
    ///
    /// The owner key wins over the target key, which wins over timestamps.
    pub fn resolve(
        column: &str,
        foreign_key: &str,
        association_foreign_key: &str,
        timestamp_columns: &[&str],
    ) -> Self {
        if column == foreign_key {
            ColumnRole::OwnerForeignKey
        } else if column == association_foreign_key {
            ColumnRole::TargetForeignKey
        } else if timestamp_columns.contains(&column) {
            ColumnRole::Timestamp
        } else {
            ColumnRole::Passthrough
        }
    }

    /// Value this column takes when `record` is linked to the owner.
    ///
    /// `None` means the column is left out of the INSERT. NULL values are
    /// folded into `None`. A timestamp column of a record that does not
    /// record timestamps is treated as a passthrough.
    pub fn value_for<T: Model>(
        self,
        column: &str,
        owner_id: &Value,
        record: &T,
        clock: &dyn Clock,
    ) -> Option<Value> {
        let value = match self {
            ColumnRole::OwnerForeignKey => Some(owner_id.clone()),
            ColumnRole::TargetForeignKey => Some(record.id()),
            ColumnRole::Timestamp if record.record_timestamps() => {
                Some(T::DEFAULT_TIMEZONE.now(clock))
            }
            ColumnRole::Timestamp | ColumnRole::Passthrough => {
                if record.has_attribute(column) {
                    record.attribute(column)
                } else {
                    None
                }
            }
        };
        value.filter(|v| !v.is_null())
    }
}

/// A join-table column with its resolved role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinColumn {
    /// Column name.
    pub name: String,
    /// Where its value comes from.
    pub role: ColumnRole,
}

impl JoinColumn {
    /// Resolve the role of `name` for target model `T`.
    pub fn resolve<T: Model>(
        name: impl Into<String>,
        foreign_key: &str,
        association_foreign_key: &str,
    ) -> Self {
        let name = name.into();
        let role = ColumnRole::resolve(
            &name,
            foreign_key,
            association_foreign_key,
            T::TIMESTAMP_COLUMNS,
        );
        Self { name, role }
    }
}
