//! Statement builders for INSERT and DELETE.
//!
//! [`InsertStatement`] and [`DeleteStatement`] target any table by name and
//! are used for join-table rows, which have no model of their own.
//! [`InsertBuilder`] inserts a model instance into its own table.

use crate::clause::Where;
use crate::expr::{Dialect, Expr};
use asupersync::{Cx, Outcome};
use linkmodel_core::{Connection, Model, Value};

/// INSERT into an arbitrary table.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table: String,
    values: Vec<(String, Value)>,
}

impl InsertStatement {
    /// Start an INSERT into `table`.
    pub fn into_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Add a column value.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    /// Column/value pairs in insertion order.
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    /// Build the INSERT SQL and parameters.
    ///
    /// With no columns the row is inserted with `DEFAULT VALUES`.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let table = dialect.quote_identifier(&self.table);
        if self.values.is_empty() {
            let sql = match dialect {
                Dialect::Mysql => format!("INSERT INTO {table} () VALUES ()"),
                Dialect::Postgres | Dialect::Sqlite => {
                    format!("INSERT INTO {table} DEFAULT VALUES")
                }
            };
            return (sql, Vec::new());
        }

        let columns: Vec<_> = self
            .values
            .iter()
            .map(|(name, _)| dialect.quote_identifier(name))
            .collect();
        let params: Vec<_> = self.values.iter().map(|(_, v)| v.clone()).collect();
        let placeholders: Vec<_> = (1..=params.len()).map(|i| dialect.placeholder(i)).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, params)
    }

    /// Execute the INSERT and return the driver's last inserted ID.
    pub async fn execute<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<i64, linkmodel_core::Error> {
        let (sql, params) = self.build_with_dialect(conn.dialect());
        conn.insert(cx, &sql, &params).await
    }
}

/// DELETE from an arbitrary table.
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    table: String,
    where_clause: Option<Where>,
}

impl DeleteStatement {
    /// Start a DELETE from `table`.
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clause: None,
        }
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Build the DELETE SQL and parameters.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!("DELETE FROM {}", dialect.quote_identifier(&self.table));
        let mut params = Vec::new();

        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build_with_dialect(dialect, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params = where_params;
        }

        (sql, params)
    }

    /// Execute the DELETE and return rows affected.
    pub async fn execute<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<u64, linkmodel_core::Error> {
        let (sql, params) = self.build_with_dialect(conn.dialect());
        conn.execute(cx, &sql, &params).await
    }
}

/// INSERT query builder for a model instance.
#[derive(Debug)]
pub struct InsertBuilder<'a, M: Model> {
    model: &'a M,
}

impl<'a, M: Model> InsertBuilder<'a, M> {
    /// Create a new INSERT builder for the given model instance.
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Build the INSERT SQL and parameters for a dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let fields = M::fields();

        // NULL auto-increment keys are left for the database to generate
        let statement = self
            .model
            .to_row()
            .into_iter()
            .filter(|(name, value)| {
                !(value.is_null()
                    && fields
                        .iter()
                        .any(|f| f.column_name == *name && f.auto_increment))
            })
            .fold(InsertStatement::into_table(M::TABLE_NAME), |stmt, (name, value)| {
                stmt.value(name, value)
            });

        statement.build_with_dialect(dialect)
    }

    /// Execute the INSERT and return the inserted ID.
    pub async fn execute<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<i64, linkmodel_core::Error> {
        let (sql, params) = self.build_with_dialect(conn.dialect());
        conn.insert(cx, &sql, &params).await
    }
}
