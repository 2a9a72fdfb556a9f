//! Records returned by a scope, with their read-only flag.

use linkmodel_core::{Error, Model, ReadOnlyError, Result};
use std::ops::Deref;

/// Records loaded through a scope.
///
/// Reading is always allowed (the wrapper derefs to a slice). Mutable access
/// is refused when the scope was read-only, because the rows mixed join-table
/// columns into the target's attributes.
#[derive(Debug, Clone)]
pub struct Loaded<T: Model> {
    records: Vec<T>,
    readonly: bool,
}

impl<T: Model> Loaded<T> {
    /// Wrap records loaded by a scope.
    pub fn new(records: Vec<T>, readonly: bool) -> Self {
        Self { records, readonly }
    }

    /// Whether the records must not be written back.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Fail with [`Error::ReadOnly`] when the records are read-only.
    #[allow(clippy::result_large_err)]
    pub fn ensure_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(Error::ReadOnly(ReadOnlyError {
                table: T::TABLE_NAME,
                reason: "records were loaded through an ambiguous join-table select".to_string(),
            }));
        }
        Ok(())
    }

    /// Mutable access to one record.
    #[allow(clippy::result_large_err)]
    pub fn get_mut(&mut self, index: usize) -> Result<Option<&mut T>> {
        self.ensure_writable()?;
        Ok(self.records.get_mut(index))
    }

    /// Mutable iteration over all records.
    #[allow(clippy::result_large_err)]
    pub fn iter_mut(&mut self) -> Result<std::slice::IterMut<'_, T>> {
        self.ensure_writable()?;
        Ok(self.records.iter_mut())
    }

    /// Take ownership of writable records.
    #[allow(clippy::result_large_err)]
    pub fn into_writable(self) -> Result<Vec<T>> {
        self.ensure_writable()?;
        Ok(self.records)
    }
}

impl<T: Model> Deref for Loaded<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.records
    }
}
