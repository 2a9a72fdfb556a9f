//! Field and column definitions.

/// Metadata about a model field/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name (may differ from field name)
    pub column_name: &'static str,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is a primary key
    pub primary_key: bool,
    /// Whether this field auto-increments
    pub auto_increment: bool,
    /// Foreign key reference (table.column)
    pub foreign_key: Option<&'static str>,
}

impl FieldInfo {
    /// Create a new field info whose column name matches the field name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            column_name: name,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            foreign_key: None,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    /// Mark the field as nullable.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Mark the field as a primary key.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Mark the field as auto-incrementing.
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Set the foreign key reference (`table.column`).
    pub const fn foreign_key(mut self, reference: &'static str) -> Self {
        self.foreign_key = Some(reference);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        const ID: FieldInfo = FieldInfo::new("id").primary_key(true).auto_increment(true);
        assert!(ID.primary_key);
        assert!(ID.auto_increment);
        assert_eq!(ID.column_name, "id");

        let fk = FieldInfo::new("owner")
            .column("owner_id")
            .nullable(true)
            .foreign_key("developers.id");
        assert_eq!(fk.column_name, "owner_id");
        assert_eq!(fk.foreign_key, Some("developers.id"));
        assert!(fk.nullable);
    }
}
