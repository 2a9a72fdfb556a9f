//! Table introspection.
//!
//! Lists a table's columns and primary key for SQLite, PostgreSQL, and MySQL.
//! Join tables are usually created by hand in migrations, so the association
//! layer asks the database what they look like instead of trusting a model.

use asupersync::{Cx, Outcome};
use linkmodel_core::{Connection, Dialect, Error, Row, Value};

/// Information about a table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// SQL type as reported by the database
    pub sql_type: String,
    /// Whether the column is nullable
    pub nullable: bool,
    /// Default value expression
    pub default: Option<String>,
    /// 1-based position within the primary key, 0 when not part of it
    pub primary_key_position: u32,
}

impl ColumnInfo {
    /// Whether this column is part of the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key_position > 0
    }
}

/// Database introspector.
#[derive(Debug, Clone, Copy)]
pub struct Introspector {
    /// Database type for dialect-specific queries
    dialect: Dialect,
}

impl Introspector {
    /// Create a new introspector for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Create an introspector speaking the connection's dialect.
    pub fn for_connection<C: Connection>(conn: &C) -> Self {
        Self::new(conn.dialect())
    }

    /// The dialect queries are generated for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// List a table's columns in declaration order.
    ///
    /// A table that does not exist yields an empty list.
    #[tracing::instrument(level = "debug", skip(self, cx, conn))]
    pub async fn table_columns<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ColumnInfo>, Error> {
        let mut columns = match self.dialect {
            Dialect::Sqlite => self.sqlite_columns(cx, conn, table_name).await,
            Dialect::Postgres | Dialect::Mysql => {
                self.information_schema_columns(cx, conn, table_name).await
            }
        };

        // information_schema.columns does not carry key membership
        if !matches!(self.dialect, Dialect::Sqlite) {
            if let Outcome::Ok(cols) = &mut columns {
                let pk = match self.constraint_primary_key(cx, conn, table_name).await {
                    Outcome::Ok(pk) => pk,
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                };
                for col in cols.iter_mut() {
                    if let Some(pos) = pk.iter().position(|k| *k == col.name) {
                        col.primary_key_position = u32::try_from(pos + 1).unwrap_or(u32::MAX);
                    }
                }
            }
        }

        if let Outcome::Ok(cols) = &columns {
            tracing::debug!(table = table_name, count = cols.len(), "Introspected columns");
        }
        columns
    }

    /// Primary key column names in key order; empty when the table has none.
    #[tracing::instrument(level = "debug", skip(self, cx, conn))]
    pub async fn primary_key<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<String>, Error> {
        match self.dialect {
            Dialect::Sqlite => {
                let columns = match self.sqlite_columns(cx, conn, table_name).await {
                    Outcome::Ok(cols) => cols,
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                };
                let mut keyed: Vec<_> = columns.into_iter().filter(|c| c.is_primary_key()).collect();
                keyed.sort_by_key(|c| c.primary_key_position);
                Outcome::Ok(keyed.into_iter().map(|c| c.name).collect())
            }
            Dialect::Postgres | Dialect::Mysql => {
                self.constraint_primary_key(cx, conn, table_name).await
            }
        }
    }

    async fn sqlite_columns<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ColumnInfo>, Error> {
        let sql = format!(
            "PRAGMA table_info({})",
            self.dialect.quote_identifier(table_name)
        );
        let rows = match conn.query(cx, &sql, &[]).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = match row.get_named::<String>("name") {
                Ok(name) => name,
                Err(e) => return Outcome::Err(e),
            };
            let sql_type = row.get_named::<String>("type").ok().unwrap_or_default();
            let notnull = row.get_named::<i64>("notnull").ok().unwrap_or(0);
            let pk = row.get_named::<i64>("pk").ok().unwrap_or(0);

            columns.push(ColumnInfo {
                name,
                sql_type,
                nullable: notnull == 0,
                default: optional_text(row, "dflt_value"),
                primary_key_position: u32::try_from(pk).unwrap_or(0),
            });
        }

        Outcome::Ok(columns)
    }

    async fn information_schema_columns<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ColumnInfo>, Error> {
        let sql = match self.dialect {
            Dialect::Mysql => {
                "SELECT column_name AS column_name, data_type AS data_type, \
                 is_nullable AS is_nullable, column_default AS column_default \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? \
                 ORDER BY ordinal_position"
            }
            Dialect::Postgres | Dialect::Sqlite => {
                "SELECT column_name, data_type, is_nullable, column_default \
                 FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 \
                 ORDER BY ordinal_position"
            }
        };

        let rows = match conn
            .query(cx, sql, &[Value::Text(table_name.to_string())])
            .await
        {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = match row.get_named::<String>("column_name") {
                Ok(name) => name,
                Err(e) => return Outcome::Err(e),
            };
            let sql_type = row.get_named::<String>("data_type").ok().unwrap_or_default();
            let nullable = row
                .get_named::<String>("is_nullable")
                .ok()
                .is_some_and(|s| s == "YES");

            columns.push(ColumnInfo {
                name,
                sql_type,
                nullable,
                default: optional_text(row, "column_default"),
                primary_key_position: 0,
            });
        }

        Outcome::Ok(columns)
    }

    async fn constraint_primary_key<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<String>, Error> {
        let sql = match self.dialect {
            Dialect::Mysql => {
                "SELECT column_name AS column_name \
                 FROM information_schema.key_column_usage \
                 WHERE table_schema = DATABASE() AND table_name = ? \
                 AND constraint_name = 'PRIMARY' \
                 ORDER BY ordinal_position"
            }
            Dialect::Postgres | Dialect::Sqlite => {
                "SELECT kcu.column_name \
                 FROM information_schema.table_constraints AS tc \
                 JOIN information_schema.key_column_usage AS kcu \
                 ON tc.constraint_name = kcu.constraint_name \
                 AND tc.table_schema = kcu.table_schema \
                 WHERE tc.constraint_type = 'PRIMARY KEY' \
                 AND tc.table_schema = current_schema() AND tc.table_name = $1 \
                 ORDER BY kcu.ordinal_position"
            }
        };

        let rows = match conn
            .query(cx, sql, &[Value::Text(table_name.to_string())])
            .await
        {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        // A key column that cannot be named is an error, not a smaller key
        match rows
            .iter()
            .map(|row| row.get_named::<String>("column_name"))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(names) => Outcome::Ok(names),
            Err(e) => Outcome::Err(e),
        }
    }
}

fn optional_text(row: &Row, column: &str) -> Option<String> {
    row.get_named::<Option<String>>(column).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use std::sync::{Arc, Mutex};

    /// Answers every query with canned rows chosen by SQL prefix.
    #[derive(Clone)]
    struct CannedConnection {
        dialect: Dialect,
        responses: Vec<(&'static str, Vec<Row>)>,
        seen: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
    }

    impl CannedConnection {
        fn new(dialect: Dialect, responses: Vec<(&'static str, Vec<Row>)>) -> Self {
            Self {
                dialect,
                responses,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn seen(&self) -> Vec<(String, Vec<Value>)> {
            self.seen.lock().expect("lock poisoned").clone()
        }
    }

    impl Connection for CannedConnection {
        fn dialect(&self) -> Dialect {
            self.dialect
        }

        fn query(
            &self,
            _cx: &Cx,
            sql: &str,
            params: &[Value],
        ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
            self.seen
                .lock()
                .expect("lock poisoned")
                .push((sql.to_string(), params.to_vec()));
            let rows = self
                .responses
                .iter()
                .find(|(prefix, _)| sql.contains(prefix))
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default();
            async move { Outcome::Ok(rows) }
        }

        fn query_one(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
            async { Outcome::Ok(None) }
        }

        fn execute(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<u64, Error>> + Send {
            async { Outcome::Ok(0) }
        }

        fn insert(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<i64, Error>> + Send {
            async { Outcome::Ok(0) }
        }
    }

    fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
        }
    }

    fn pragma_row(name: &str, sql_type: &str, notnull: i64, pk: i64) -> Row {
        Row::new(
            vec![
                "cid".into(),
                "name".into(),
                "type".into(),
                "notnull".into(),
                "dflt_value".into(),
                "pk".into(),
            ],
            vec![
                Value::BigInt(0),
                Value::Text(name.into()),
                Value::Text(sql_type.into()),
                Value::BigInt(notnull),
                Value::Null,
                Value::BigInt(pk),
            ],
        )
    }

    #[test]
    fn test_sqlite_columns_and_primary_key_from_pragma() {
        let conn = CannedConnection::new(
            Dialect::Sqlite,
            vec![(
                "PRAGMA table_info",
                vec![
                    pragma_row("project_id", "INTEGER", 1, 2),
                    pragma_row("developer_id", "INTEGER", 1, 1),
                    pragma_row("joined_on", "DATE", 0, 0),
                ],
            )],
        );
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let introspector = Introspector::for_connection(&conn);

        rt.block_on(async {
            let columns =
                unwrap_outcome(introspector.table_columns(&cx, &conn, "developers_projects").await);
            assert_eq!(columns.len(), 3);
            assert!(columns[0].is_primary_key());
            assert!(columns[2].nullable);
            assert_eq!(columns[2].default, None);
            assert!(!columns[2].is_primary_key());

            let pk =
                unwrap_outcome(introspector.primary_key(&cx, &conn, "developers_projects").await);
            assert_eq!(pk, vec!["developer_id".to_string(), "project_id".to_string()]);
        });

        let seen = conn.seen();
        assert_eq!(seen[0].0, "PRAGMA table_info(\"developers_projects\")");
        assert!(seen[0].1.is_empty());
    }

    #[test]
    fn test_postgres_merges_constraint_primary_key() {
        let column = |name: &str| {
            Row::new(
                vec![
                    "column_name".into(),
                    "data_type".into(),
                    "is_nullable".into(),
                    "column_default".into(),
                ],
                vec![
                    Value::Text(name.into()),
                    Value::Text("bigint".into()),
                    Value::Text("NO".into()),
                    Value::Null,
                ],
            )
        };
        let key = |name: &str| Row::new(vec!["column_name".into()], vec![Value::Text(name.into())]);
        let conn = CannedConnection::new(
            Dialect::Postgres,
            vec![
                ("FROM information_schema.columns", vec![column("id"), column("developer_id")]),
                ("table_constraints", vec![key("id")]),
            ],
        );
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let introspector = Introspector::new(Dialect::Postgres);
            let columns = unwrap_outcome(introspector.table_columns(&cx, &conn, "memberships").await);
            assert_eq!(columns[0].primary_key_position, 1);
            assert_eq!(columns[1].primary_key_position, 0);
            assert!(!columns[1].nullable);
        });

        let seen = conn.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, vec![Value::Text("memberships".into())]);
    }

    #[test]
    fn test_missing_table_has_no_columns_or_key() {
        let conn = CannedConnection::new(Dialect::Mysql, Vec::new());
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let introspector = Introspector::for_connection(&conn);
            assert!(unwrap_outcome(introspector.table_columns(&cx, &conn, "nope").await).is_empty());
            assert!(unwrap_outcome(introspector.primary_key(&cx, &conn, "nope").await).is_empty());
        });

        assert!(conn.seen()[0].0.contains("table_name = ?"));
    }

    #[test]
    fn test_undecodable_column_name_is_an_error() {
        let bad = Row::new(
            vec![
                "cid".into(),
                "name".into(),
                "type".into(),
                "notnull".into(),
                "dflt_value".into(),
                "pk".into(),
            ],
            vec![
                Value::BigInt(1),
                Value::BigInt(7),
                Value::Text("INTEGER".into()),
                Value::BigInt(1),
                Value::Null,
                Value::BigInt(0),
            ],
        );
        let conn = CannedConnection::new(
            Dialect::Sqlite,
            vec![(
                "PRAGMA table_info",
                vec![pragma_row("developer_id", "INTEGER", 1, 1), bad],
            )],
        );
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let introspector = Introspector::for_connection(&conn);

        rt.block_on(async {
            let columns = introspector.table_columns(&cx, &conn, "developers_projects").await;
            assert!(matches!(columns, Outcome::Err(Error::Type(_))));
            let pk = introspector.primary_key(&cx, &conn, "developers_projects").await;
            assert!(matches!(pk, Outcome::Err(Error::Type(_))));
        });
    }

    #[test]
    fn test_null_key_column_name_is_an_error() {
        let conn = CannedConnection::new(
            Dialect::Postgres,
            vec![(
                "table_constraints",
                vec![
                    Row::new(vec!["column_name".into()], vec![Value::Text("id".into())]),
                    Row::new(vec!["column_name".into()], vec![Value::Null]),
                ],
            )],
        );
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let introspector = Introspector::new(Dialect::Postgres);
            let pk = introspector.primary_key(&cx, &conn, "memberships").await;
            assert!(matches!(pk, Outcome::Err(Error::Type(_))));
        });
    }
}
