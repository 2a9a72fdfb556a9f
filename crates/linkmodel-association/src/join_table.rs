//! Many-to-many collections backed by a join table.
//!
//! A [`JoinTableAssociation`] links one owner record to many target records
//! through a join table holding a foreign key to each side. The join table
//! may carry extra columns (timestamps, copied attributes); those are filled
//! on insert according to each column's
//! [`ColumnRole`](crate::ColumnRole).
//!
//! # Example
//!
//! ```ignore
//! let reflection = JoinTableReflection::conventional::<Developer, Project>()
//!     .build::<Project>()?;
//! let mut projects = JoinTableAssociation::<_, Project, _>::new(&developer, &reflection, &conn)?;
//!
//! projects.push(&cx, Project::new("rails")).await?;
//! let count = projects.count_records(&cx).await?;
//! ```

use crate::column_role::JoinColumn;
use crate::loaded::Loaded;
use crate::saver::{InsertRecordSaver, RecordSaver};
use asupersync::{Cx, Outcome};
use linkmodel_core::{
    Clock, Connection, Error, FixedClock, JoinTableReflection, Model, Result, SqlTemplate,
    SystemClock, TemplateBindings, Value,
};
use linkmodel_query::{DeleteStatement, Expr, InsertStatement, Join, OrderBy, Select, Table};
use linkmodel_schema::Introspector;

/// Extra conditions for [`JoinTableAssociation::find_by_sql`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    select: Option<Vec<String>>,
    filters: Vec<Expr>,
    order: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the select list for this call.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filters.push(expr);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }
}

/// A has-and-belongs-to-many collection of `T` owned by an `O`.
///
/// Column information for the join table is loaded lazily and cached until
/// [`reset_column_information`](Self::reset_column_information). The target
/// collection is loaded on first use and cached until [`reset`](Self::reset).
pub struct JoinTableAssociation<'a, O, T, C, S = InsertRecordSaver>
where
    O: Model,
    T: Model,
    C: Connection,
{
    owner: &'a O,
    reflection: &'a JoinTableReflection,
    conn: &'a C,
    saver: S,
    clock: Box<dyn Clock>,
    join_table: Table,
    target_table: Table,
    columns: Option<Vec<JoinColumn>>,
    has_primary_key: Option<bool>,
    target: Vec<T>,
    loaded: bool,
}

impl<'a, O, T, C> JoinTableAssociation<'a, O, T, C, InsertRecordSaver>
where
    O: Model,
    T: Model,
    C: Connection,
{
    /// Bind `owner` to its collection described by `reflection`.
    ///
    /// New targets are saved with [`InsertRecordSaver`], which needs an
    /// auto-increment key; use [`new_with_saver`](Self::new_with_saver) for
    /// other targets.
    #[allow(clippy::result_large_err)]
    pub fn new(owner: &'a O, reflection: &'a JoinTableReflection, conn: &'a C) -> Result<Self> {
        Self::new_with_saver(owner, reflection, conn, InsertRecordSaver)
    }
}

impl<'a, O, T, C, S> JoinTableAssociation<'a, O, T, C, S>
where
    O: Model,
    T: Model,
    C: Connection,
{
    /// Bind `owner` to its collection, saving new targets with `saver`.
    ///
    /// Fails when the reflection was built for a different target table.
    #[allow(clippy::result_large_err)]
    pub fn new_with_saver(
        owner: &'a O,
        reflection: &'a JoinTableReflection,
        conn: &'a C,
        saver: S,
    ) -> Result<Self> {
        if reflection.target_table() != T::TABLE_NAME {
            return Err(Error::config(format!(
                "join table '{}' targets '{}', not '{}'",
                reflection.join_table(),
                reflection.target_table(),
                T::TABLE_NAME
            )));
        }
        Ok(Self {
            owner,
            reflection,
            conn,
            saver,
            clock: Box::new(SystemClock),
            join_table: Table::new(reflection.join_table()),
            target_table: Table::new(T::TABLE_NAME),
            columns: None,
            has_primary_key: None,
            target: Vec::new(),
            loaded: false,
        })
    }

    /// Use `saver` to persist new records before linking them.
    pub fn with_saver<S2>(
        self,
        saver: S2,
    ) -> JoinTableAssociation<'a, O, T, C, S2> {
        JoinTableAssociation {
            owner: self.owner,
            reflection: self.reflection,
            conn: self.conn,
            saver,
            clock: self.clock,
            join_table: self.join_table,
            target_table: self.target_table,
            columns: self.columns,
            has_primary_key: self.has_primary_key,
            target: self.target,
            loaded: self.loaded,
        }
    }

    /// Use `clock` for join-table timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn owner(&self) -> &O {
        self.owner
    }

    pub fn reflection(&self) -> &JoinTableReflection {
        self.reflection
    }

    pub fn join_table(&self) -> &Table {
        &self.join_table
    }

    // ==================== Column information ====================

    async fn ensure_columns(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.columns.is_some() {
            return Outcome::Ok(());
        }

        let names: Vec<String> = match self.reflection.join_columns() {
            Some(configured) => configured.to_vec(),
            None => {
                let introspector = Introspector::for_connection(self.conn);
                match introspector
                    .table_columns(cx, self.conn, self.reflection.join_table())
                    .await
                {
                    Outcome::Ok(cols) => cols.into_iter().map(|c| c.name).collect(),
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
        };

        let fk = self.reflection.foreign_key();
        let afk = self.reflection.association_foreign_key();
        let columns: Vec<JoinColumn> = names
            .into_iter()
            .map(|name| JoinColumn::resolve::<T>(name, fk, afk))
            .collect();

        tracing::debug!(
            join_table = self.reflection.join_table(),
            count = columns.len(),
            roles = ?columns.iter().map(|c| c.role).collect::<Vec<_>>(),
            "Loaded join table columns"
        );
        self.columns = Some(columns);
        Outcome::Ok(())
    }

    /// The join table's columns with their resolved roles.
    pub async fn columns(&mut self, cx: &Cx) -> Outcome<&[JoinColumn], Error> {
        match self.ensure_columns(cx).await {
            Outcome::Ok(()) => Outcome::Ok(self.columns.as_deref().unwrap_or(&[])),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Forget cached column and primary key information.
    pub fn reset_column_information(&mut self) {
        tracing::debug!(
            join_table = self.reflection.join_table(),
            "Reset join table column information"
        );
        self.columns = None;
        self.has_primary_key = None;
    }

    /// Whether the join table has a primary key.
    ///
    /// Cached after the first lookup.
    #[tracing::instrument(level = "debug", skip(self, cx), fields(join_table = %self.reflection.join_table()))]
    pub async fn has_primary_key(&mut self, cx: &Cx) -> Outcome<bool, Error> {
        if let Some(cached) = self.has_primary_key {
            return Outcome::Ok(cached);
        }

        let has_key = if self.conn.supports_primary_key() {
            let introspector = Introspector::for_connection(self.conn);
            match introspector
                .primary_key(cx, self.conn, self.reflection.join_table())
                .await
            {
                Outcome::Ok(key) => !key.is_empty(),
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        } else {
            false
        };

        tracing::debug!(has_key, "Join table primary key");
        self.has_primary_key = Some(has_key);
        Outcome::Ok(has_key)
    }

    /// Whether selecting with `select` mixes join-table columns into targets.
    ///
    /// True when the join table has more than the two key columns and no
    /// explicit select list was given.
    pub async fn ambiguous_select(
        &mut self,
        cx: &Cx,
        select: Option<&[String]>,
    ) -> Outcome<bool, Error> {
        match self.ensure_columns(cx).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        let column_count = self.columns.as_ref().map_or(0, Vec::len);
        Outcome::Ok(column_count > 2 && select.is_none())
    }

    // ==================== Scope construction ====================

    /// `INNER JOIN join_table ON target.pk = join_table.association_foreign_key`
    pub fn construct_joins(&self) -> Join {
        let on = self
            .target_table
            .col(self.reflection.target_primary_key())
            .eq(self.join_table.col(self.reflection.association_foreign_key()));
        self.join_table.create_join(on)
    }

    /// `join_table.foreign_key = owner id`
    pub fn construct_owner_conditions(&self) -> Expr {
        self.join_table
            .col(self.reflection.foreign_key())
            .eq(self.owner.id())
    }

    /// The configured select list, or every target and join-table column.
    pub fn select_value(&self) -> Vec<Expr> {
        match self.reflection.select() {
            Some(columns) => columns.iter().map(|c| Expr::raw(c.as_str())).collect(),
            None => vec![self.target_table.star(), self.join_table.star()],
        }
    }

    /// Query for the owner's targets.
    ///
    /// The scope is read-only when the select is ambiguous.
    #[tracing::instrument(level = "debug", skip(self, cx), fields(join_table = %self.reflection.join_table()))]
    pub async fn association_scope(&mut self, cx: &Cx) -> Outcome<Select<T>, Error> {
        let reflection = self.reflection;
        let ambiguous = match self.ambiguous_select(cx, reflection.select()).await {
            Outcome::Ok(ambiguous) => ambiguous,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if ambiguous {
            tracing::warn!(
                join_table = self.reflection.join_table(),
                target = T::TABLE_NAME,
                "Join table has extra columns and no select; records will be read-only"
            );
        }

        let scope = Select::<T>::new()
            .columns(self.select_value())
            .join(self.construct_joins())
            .filter(self.construct_owner_conditions())
            .readonly(ambiguous);
        Outcome::Ok(scope)
    }

    /// Find the owner's targets with extra conditions.
    ///
    /// Ambiguity is judged from the configured select, falling back to the
    /// call's own select list.
    #[tracing::instrument(level = "debug", skip(self, cx, options), fields(join_table = %self.reflection.join_table()))]
    pub async fn find_by_sql(&mut self, cx: &Cx, options: FindOptions) -> Outcome<Loaded<T>, Error> {
        let reflection = self.reflection;
        let select = reflection.select().or(options.select.as_deref());
        let ambiguous = match self.ambiguous_select(cx, select).await {
            Outcome::Ok(ambiguous) => ambiguous,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let mut scope = match self.association_scope(cx).await {
            Outcome::Ok(scope) => scope,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let FindOptions {
            select,
            filters,
            order,
            limit,
            offset,
        } = options;
        if let Some(columns) = select {
            scope = scope.columns(columns.into_iter().map(Expr::raw));
        }
        for filter in filters {
            scope = scope.filter(filter);
        }
        for order_by in order {
            scope = scope.order_by(order_by);
        }
        if let Some(n) = limit {
            scope = scope.limit(n);
        }
        if let Some(n) = offset {
            scope = scope.offset(n);
        }

        scope
            .readonly(ambiguous)
            .all(cx, self.conn)
            .await
            .map(|records| Loaded::new(records, ambiguous))
    }

    // ==================== Record helpers ====================

    /// Timestamp columns `record` stamps; empty when it does not record timestamps.
    pub fn record_timestamp_columns(&self, record: &T) -> &'static [&'static str] {
        if record.record_timestamps() {
            T::TIMESTAMP_COLUMNS
        } else {
            &[]
        }
    }

    /// Join-table associations never have an inverse.
    pub fn invertible_for(&self, _record: &T) -> bool {
        false
    }

    fn bindings(&self, record: &T) -> TemplateBindings<'_> {
        TemplateBindings {
            owner_id: self.owner.id(),
            record_id: record.id(),
            attributes: record.to_row(),
            join_table: self.reflection.join_table(),
            foreign_key: self.reflection.foreign_key(),
            association_foreign_key: self.reflection.association_foreign_key(),
        }
    }

    fn render(&self, template: &SqlTemplate, record: &T) -> (String, Vec<Value>) {
        template.render(self.conn.dialect(), &self.bindings(record))
    }

    // ==================== Writes ====================

    /// Write the join row linking an already saved `record` to the owner.
    #[tracing::instrument(level = "debug", skip(self, cx, record), fields(join_table = %self.reflection.join_table()))]
    pub async fn link_record(&mut self, cx: &Cx, record: &T) -> Outcome<(), Error> {
        if let Some(template) = self.reflection.insert_sql() {
            let (sql, params) = self.render(template, record);
            tracing::trace!(sql = %sql, "Custom join insert");
            return self.conn.insert(cx, &sql, &params).await.map(|_| ());
        }

        match self.ensure_columns(cx).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }

        // One reading for every timestamp column of the row.
        let now = if self.record_timestamp_columns(record).is_empty() {
            FixedClock(0)
        } else {
            FixedClock(self.clock.now_micros())
        };
        let owner_id = self.owner.id();
        let statement = self
            .columns
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .filter_map(|column| {
                column
                    .role
                    .value_for(&column.name, &owner_id, record, &now)
                    .map(|value| (column.name.as_str(), value))
            })
            .fold(
                InsertStatement::into_table(self.reflection.join_table()),
                |stmt, (name, value)| stmt.value(name, value),
            );

        tracing::trace!(columns = statement.values().len(), "Join insert");
        statement.execute(cx, self.conn).await.map(|_| ())
    }

    /// Unlink `records` from the owner. Returns the number of join rows removed.
    ///
    /// A custom delete template runs once per record.
    #[tracing::instrument(level = "debug", skip(self, cx, records), fields(join_table = %self.reflection.join_table(), count = records.len()))]
    pub async fn delete_records(&mut self, cx: &Cx, records: &[T]) -> Outcome<u64, Error> {
        if let Some(template) = self.reflection.delete_sql() {
            let mut affected = 0;
            for record in records {
                let (sql, params) = self.render(template, record);
                tracing::trace!(sql = %sql, "Custom join delete");
                match self.conn.execute(cx, &sql, &params).await {
                    Outcome::Ok(n) => affected += n,
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
            return Outcome::Ok(affected);
        }

        let ids: Vec<Value> = records
            .iter()
            .map(Model::id)
            .filter(|id| !id.is_null())
            .collect();
        let afk = self.join_table.col(self.reflection.association_foreign_key());
        DeleteStatement::from_table(self.reflection.join_table())
            .filter(self.construct_owner_conditions())
            .filter(afk.in_list(ids))
            .execute(cx, self.conn)
            .await
    }

    // ==================== Collection ====================

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Records loaded so far; empty before the first load.
    pub fn target(&self) -> &[T] {
        &self.target
    }

    /// Load the owner's targets unless already loaded.
    pub async fn load_target(&mut self, cx: &Cx) -> Outcome<&[T], Error> {
        if !self.loaded {
            let scope = match self.association_scope(cx).await {
                Outcome::Ok(scope) => scope,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            match scope.all(cx, self.conn).await {
                Outcome::Ok(records) => {
                    self.target = records;
                    self.loaded = true;
                }
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Ok(&self.target)
    }

    /// Drop the loaded targets.
    pub fn reset(&mut self) {
        self.target.clear();
        self.loaded = false;
    }

    pub async fn reload(&mut self, cx: &Cx) -> Outcome<&[T], Error> {
        self.reset();
        self.load_target(cx).await
    }

    /// Number of linked records, loading them first if needed.
    pub async fn count_records(&mut self, cx: &Cx) -> Outcome<usize, Error> {
        self.load_target(cx).await.map(<[T]>::len)
    }

    /// Unlink `records` and drop them from the loaded targets.
    pub async fn delete(&mut self, cx: &Cx, records: &[T]) -> Outcome<u64, Error> {
        let affected = match self.delete_records(cx, records).await {
            Outcome::Ok(n) => n,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let removed: Vec<Value> = records
            .iter()
            .map(Model::id)
            .filter(|id| !id.is_null())
            .collect();
        self.target.retain(|t| !removed.contains(&t.id()));
        Outcome::Ok(affected)
    }

    /// Unlink every target of the owner.
    pub async fn clear(&mut self, cx: &Cx) -> Outcome<u64, Error> {
        match self.load_target(cx).await {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        let records = std::mem::take(&mut self.target);
        let result = self.delete_records(cx, &records).await;
        if !matches!(result, Outcome::Ok(_)) {
            self.target = records;
        }
        result
    }
}

impl<O, T, C, S> JoinTableAssociation<'_, O, T, C, S>
where
    O: Model,
    T: Model,
    C: Connection,
    S: RecordSaver<T, C>,
{
    /// Link `record` to the owner.
    ///
    /// A new record is saved first; `Ok(false)` is returned, with nothing
    /// written to the join table, when that save is rejected.
    #[tracing::instrument(level = "debug", skip(self, cx, record), fields(join_table = %self.reflection.join_table()))]
    pub async fn insert_record(
        &mut self,
        cx: &Cx,
        record: &mut T,
        force: bool,
        validate: bool,
    ) -> Outcome<bool, Error> {
        if record.is_new() {
            match self
                .saver
                .save_record(cx, self.conn, record, force, validate)
                .await
            {
                Outcome::Ok(true) => {}
                Outcome::Ok(false) => {
                    tracing::debug!(target = T::TABLE_NAME, "Record not saved; skipping link");
                    return Outcome::Ok(false);
                }
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        self.link_record(cx, record).await.map(|()| true)
    }

    /// Link `record` and append it to the loaded targets.
    ///
    /// A new record that fails validation is an error.
    pub async fn push(&mut self, cx: &Cx, mut record: T) -> Outcome<bool, Error> {
        match self.insert_record(cx, &mut record, true, true).await {
            Outcome::Ok(true) => {}
            Outcome::Ok(false) => return Outcome::Ok(false),
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        if self.loaded {
            self.target.push(record);
        }
        Outcome::Ok(true)
    }

    /// Link each record in turn, stopping at the first one not linked.
    pub async fn concat(&mut self, cx: &Cx, records: Vec<T>) -> Outcome<bool, Error> {
        for record in records {
            match self.push(cx, record).await {
                Outcome::Ok(true) => {}
                other => return other,
            }
        }
        Outcome::Ok(true)
    }
}

impl<O, T, C, S> std::fmt::Debug for JoinTableAssociation<'_, O, T, C, S>
where
    O: Model,
    T: Model,
    C: Connection,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinTableAssociation")
            .field("owner", &O::TABLE_NAME)
            .field("target", &T::TABLE_NAME)
            .field("join_table", &self.reflection.join_table())
            .field("columns", &self.columns)
            .field("loaded", &self.loaded)
            .field("len", &self.target.len())
            .finish_non_exhaustive()
    }
}
