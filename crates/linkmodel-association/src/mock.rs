//! Recording connection used by the unit tests.

use asupersync::{Cx, Outcome};
use linkmodel_core::{Connection, Dialect, Error, QueryError, Row, Value};
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub(crate) struct MockState {
    /// `(name, pk position)` reported by `PRAGMA table_info`.
    pub join_columns: Vec<(&'static str, i64)>,
    /// Rows returned for every other query.
    pub target_rows: Vec<Row>,
    pub next_insert_id: i64,
    pub fail_writes: bool,
    pub no_primary_keys: bool,
    pub queries: Vec<(String, Vec<Value>)>,
    pub executed: Vec<(String, Vec<Value>)>,
    pub inserted: Vec<(String, Vec<Value>)>,
}

#[derive(Debug, Clone)]
pub(crate) struct MockConnection {
    pub state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new(join_columns: Vec<(&'static str, i64)>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                join_columns,
                next_insert_id: 100,
                ..MockState::default()
            })),
        }
    }

    pub fn with_target_rows(self, rows: Vec<Row>) -> Self {
        self.state.lock().expect("lock poisoned").target_rows = rows;
        self
    }

    pub fn failing_writes(self) -> Self {
        self.state.lock().expect("lock poisoned").fail_writes = true;
        self
    }

    pub fn without_primary_keys(self) -> Self {
        self.state.lock().expect("lock poisoned").no_primary_keys = true;
        self
    }

    pub fn queries(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().expect("lock poisoned").queries.clone()
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().expect("lock poisoned").executed.clone()
    }

    pub fn inserted(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().expect("lock poisoned").inserted.clone()
    }

    pub fn introspections(&self) -> usize {
        self.queries()
            .iter()
            .filter(|(sql, _)| sql.starts_with("PRAGMA"))
            .count()
    }
}

fn constraint_error(sql: &str) -> Error {
    Error::Query(QueryError {
        sql: Some(sql.to_string()),
        sqlstate: Some("23505".to_string()),
        message: "UNIQUE constraint failed".to_string(),
        source: None,
    })
}

impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let state = Arc::clone(&self.state);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            guard.queries.push((sql.clone(), params));
            let rows = if sql.starts_with("PRAGMA table_info") {
                guard
                    .join_columns
                    .iter()
                    .enumerate()
                    .map(|(cid, (name, pk))| {
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
                                Value::BigInt(i64::try_from(cid).unwrap_or(0)),
                                Value::Text((*name).to_string()),
                                Value::Text("INTEGER".into()),
                                Value::BigInt(0),
                                Value::Null,
                                Value::BigInt(*pk),
                            ],
                        )
                    })
                    .collect()
            } else {
                guard.target_rows.clone()
            };
            Outcome::Ok(rows)
        }
    }

    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let rows = self.query(cx, sql, params);
        async move { rows.await.map(|rows| rows.into_iter().next()) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let state = Arc::clone(&self.state);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            if guard.fail_writes {
                return Outcome::Err(constraint_error(&sql));
            }
            let affected = u64::try_from(params.len().saturating_sub(1)).unwrap_or(0);
            guard.executed.push((sql, params));
            Outcome::Ok(affected)
        }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let state = Arc::clone(&self.state);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            if guard.fail_writes {
                return Outcome::Err(constraint_error(&sql));
            }
            guard.inserted.push((sql, params));
            let id = guard.next_insert_id;
            guard.next_insert_id += 1;
            Outcome::Ok(id)
        }
    }

    fn supports_primary_key(&self) -> bool {
        !self.state.lock().expect("lock poisoned").no_primary_keys
    }
}

pub(crate) fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
    }
}
