//! Table references for building qualified expressions and joins.

use crate::expr::Expr;
use crate::join::Join;

/// A named table, used to qualify column references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
}

impl Table {
    /// Reference a table by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `table.column`
    pub fn col(&self, column: impl Into<String>) -> Expr {
        Expr::qualified(self.name.clone(), column)
    }

    /// `table.*`
    pub fn star(&self) -> Expr {
        Expr::table_star(self.name.clone())
    }

    /// INNER JOIN this table on `on`.
    pub fn create_join(&self, on: Expr) -> Join {
        Join::inner(self.name.clone(), on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Dialect;

    #[test]
    fn test_col_and_star_are_qualified() {
        let table = Table::new("developers_projects");
        let mut params = Vec::new();
        assert_eq!(
            table.col("developer_id").build(&mut params, 0),
            "\"developers_projects\".\"developer_id\""
        );
        assert_eq!(table.star().build(&mut params, 0), "\"developers_projects\".*");
        assert_eq!(table.name(), "developers_projects");
    }

    #[test]
    fn test_create_join() {
        let projects = Table::new("projects");
        let link = Table::new("developers_projects");
        let join = link.create_join(projects.col("id").eq(link.col("project_id")));
        let (sql, _) = join.to_sql_with_dialect(Dialect::Sqlite);
        assert!(sql.starts_with(" INNER JOIN \"developers_projects\" ON"));
    }
}
