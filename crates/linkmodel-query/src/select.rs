//! SELECT query builder.

use crate::clause::{Limit, Offset, OrderBy, Where};
use crate::expr::{Dialect, Expr};
use crate::join::Join;
use asupersync::{Cx, Outcome};
use linkmodel_core::{Connection, Model, Value};
use std::marker::PhantomData;

/// A SELECT query over a model's table.
///
/// Besides the usual clauses a `Select` carries a `readonly` flag. Scopes
/// whose rows mix columns from several tables set it so callers know the
/// hydrated models must not be written back.
#[derive(Debug, Clone)]
pub struct Select<M: Model> {
    /// Select list (empty = `*`)
    columns: Vec<Expr>,
    /// WHERE clause conditions
    where_clause: Option<Where>,
    /// ORDER BY clauses
    order_by: Vec<OrderBy>,
    /// JOIN clauses
    joins: Vec<Join>,
    /// LIMIT clause
    limit: Option<Limit>,
    /// OFFSET clause
    offset: Option<Offset>,
    /// Results must not be persisted
    readonly: bool,
    /// Model type marker
    _marker: PhantomData<M>,
}

impl<M: Model> Select<M> {
    /// Create a new SELECT query for the model's table.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            joins: Vec::new(),
            limit: None,
            offset: None,
            readonly: false,
            _marker: PhantomData,
        }
    }

    /// Replace the select list.
    pub fn columns(mut self, cols: impl IntoIterator<Item = Expr>) -> Self {
        self.columns = cols.into_iter().collect();
        self
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add ORDER BY clause.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Add a JOIN clause.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(Limit(n));
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(Offset(n));
        self
    }

    /// Mark results as read-only (or clear the mark).
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Whether results of this query must not be persisted.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// The select list; empty means `*`.
    pub fn select_list(&self) -> &[Expr] {
        &self.columns
    }

    /// JOIN clauses in order.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Build the SQL query and parameters (default dialect).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the SQL query and parameters for a dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();

        // SELECT
        sql.push_str("SELECT ");
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<_> = self
                .columns
                .iter()
                .map(|c| c.build_with_dialect(dialect, &mut params, 0))
                .collect();
            sql.push_str(&cols.join(", "));
        }

        // FROM
        sql.push_str(" FROM ");
        sql.push_str(&dialect.quote_identifier(M::TABLE_NAME));

        // JOINs
        for join in &self.joins {
            sql.push_str(&join.build_with_dialect(dialect, &mut params, 0));
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build_with_dialect(dialect, params.len());
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_strs: Vec<_> = self
                .order_by
                .iter()
                .map(|o| o.build(dialect, &mut params, 0))
                .collect();
            sql.push_str(&order_strs.join(", "));
        }

        // LIMIT
        if let Some(Limit(n)) = self.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        // OFFSET
        if let Some(Offset(n)) = self.offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }

        (sql, params)
    }

    /// Execute the query and return all matching rows as models.
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(table = M::TABLE_NAME))]
    pub async fn all<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<Vec<M>, linkmodel_core::Error> {
        let (sql, params) = self.build_with_dialect(conn.dialect());
        tracing::trace!(sql = %sql, params = params.len(), "Executing select");
        let rows = conn.query(cx, &sql, &params).await;

        rows.and_then(|rows| {
            let mut models = Vec::with_capacity(rows.len());
            for row in &rows {
                match M::from_row(row) {
                    Ok(model) => models.push(model),
                    Err(e) => return Outcome::Err(e),
                }
            }
            tracing::debug!(count = models.len(), "Select returned rows");
            Outcome::Ok(models)
        })
    }
}

impl<M: Model> Default for Select<M> {
    fn default() -> Self {
        Self::new()
    }
}
