use asupersync::runtime::RuntimeBuilder;
use std::future::Future;
use std::sync::{Arc, Mutex};

use linkmodel::prelude::*;
use linkmodel::{Dialect, FixedClock, ValidationError};

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Developer {
    id: i64,
}

const DEVELOPER_FIELDS: [FieldInfo; 1] = [FieldInfo::new("id").primary_key(true)];

impl Model for Developer {
    const TABLE_NAME: &'static str = "developers";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];

    fn fields() -> &'static [FieldInfo] {
        &DEVELOPER_FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![("id", Value::BigInt(self.id))]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
        })
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![Value::BigInt(self.id)]
    }

    fn is_new(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Project {
    id: Option<i64>,
    name: String,
}

impl Project {
    fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
        }
    }
}

const PROJECT_FIELDS: [FieldInfo; 2] = [
    FieldInfo::new("id").primary_key(true).auto_increment(true),
    FieldInfo::new("name"),
];

impl Model for Project {
    const TABLE_NAME: &'static str = "projects";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const TIMESTAMP_COLUMNS: &'static [&'static str] = &["created_at"];

    fn fields() -> &'static [FieldInfo] {
        &PROJECT_FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("name", Value::Text(self.name.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
        })
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![self.id.into()]
    }

    fn is_new(&self) -> bool {
        self.id.is_none()
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if self.name.is_empty() {
            errors.add_required("name");
        }
        errors.into_result()
    }
}

impl AutoIncrement for Project {
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

/// In-memory stand-in for a Postgres database holding `projects` and
/// `developers_projects`. It interprets the statements the association emits.
#[derive(Debug, Default)]
struct Store {
    join_columns: Vec<&'static str>,
    projects: Vec<(i64, String)>,
    links: Vec<Vec<(String, Value)>>,
    statements: Vec<String>,
}

impl Store {
    fn link_value<'a>(link: &'a [(String, Value)], column: &str) -> Option<&'a Value> {
        link.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    fn linked_ids(&self, owner: i64) -> Vec<i64> {
        self.links
            .iter()
            .filter(|l| Self::link_value(l, "developer_id") == Some(&Value::BigInt(owner)))
            .filter_map(|l| Self::link_value(l, "project_id").and_then(Value::as_i64))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct FakePostgres {
    store: Arc<Mutex<Store>>,
}

impl FakePostgres {
    fn new(join_columns: Vec<&'static str>) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store {
                join_columns,
                ..Store::default()
            })),
        }
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().expect("store lock")
    }
}

fn insert_columns(sql: &str) -> Vec<String> {
    let start = sql.find('(').map_or(0, |i| i + 1);
    let end = sql.find(')').unwrap_or(sql.len());
    sql[start..end]
        .split(", ")
        .map(|c| c.trim_matches('"').to_string())
        .collect()
}

impl Connection for FakePostgres {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let store = Arc::clone(&self.store);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut store = store.lock().expect("store lock");
            store.statements.push(sql.clone());
            let rows = if sql.contains("information_schema.columns") {
                store
                    .join_columns
                    .iter()
                    .map(|name| {
                        Row::new(
                            vec![
                                "column_name".into(),
                                "data_type".into(),
                                "is_nullable".into(),
                                "column_default".into(),
                            ],
                            vec![
                                Value::Text((*name).to_string()),
                                Value::Text("bigint".into()),
                                Value::Text("NO".into()),
                                Value::Null,
                            ],
                        )
                    })
                    .collect()
            } else if sql.contains("key_column_usage") {
                Vec::new()
            } else if sql.contains("INNER JOIN \"developers_projects\"") {
                let owner = params.first().and_then(Value::as_i64).unwrap_or(0);
                let linked = store.linked_ids(owner);
                store
                    .projects
                    .iter()
                    .filter(|(id, _)| linked.contains(id))
                    .map(|(id, name)| {
                        Row::new(
                            vec!["id".into(), "name".into(), "developer_id".into()],
                            vec![
                                Value::BigInt(*id),
                                Value::Text(name.clone()),
                                Value::BigInt(owner),
                            ],
                        )
                    })
                    .collect()
            } else {
                Vec::new()
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
        let store = Arc::clone(&self.store);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut store = store.lock().expect("store lock");
            store.statements.push(sql.clone());
            if !sql.starts_with("DELETE FROM \"developers_projects\"") || sql.contains("1 = 0") {
                return Outcome::Ok(0);
            }
            let owner = params.first().cloned().unwrap_or(Value::Null);
            let ids = params.get(1..).unwrap_or(&[]).to_vec();
            let before = store.links.len();
            store.links.retain(|link| {
                let owned = Store::link_value(link, "developer_id") == Some(&owner);
                let listed = Store::link_value(link, "project_id").is_some_and(|id| ids.contains(id));
                !(owned && listed)
            });
            Outcome::Ok((before - store.links.len()) as u64)
        }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let store = Arc::clone(&self.store);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut store = store.lock().expect("store lock");
            store.statements.push(sql.clone());
            if sql.starts_with("INSERT INTO \"projects\"") {
                let id = store.projects.len() as i64 + 1;
                let name = params
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                store.projects.push((id, name));
                return Outcome::Ok(id);
            }
            if sql.starts_with("INSERT INTO \"developers_projects\"") {
                let link = insert_columns(&sql).into_iter().zip(params).collect();
                store.links.push(link);
            }
            Outcome::Ok(0)
        }
    }
}

const JOIN_COLUMNS: [&str; 4] = ["developer_id", "project_id", "created_at", "access_level"];

const OPTIONS: &str = r#"{
    "join_table": "developers_projects",
    "foreign_key": "developer_id",
    "association_foreign_key": "project_id"
}"#;

fn reflection(json: &str) -> JoinTableReflection {
    JoinTableOptions::from_json(json)
        .and_then(JoinTableOptions::into_reflection::<Project>)
        .expect("valid join table options")
}

#[test]
fn test_postgres_links_counts_and_marks_ambiguous_loads_readonly() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let conn = FakePostgres::new(JOIN_COLUMNS.to_vec());
    let reflection = reflection(OPTIONS);
    let developer = Developer { id: 1 };

    rt.block_on(async {
        let mut projects = JoinTableAssociation::<_, Project, _>::new(&developer, &reflection, &conn)
            .expect("reflection targets projects")
            .with_clock(FixedClock(1_700_000_000_000_000));
        assert!(unwrap_outcome(projects.push(&cx, Project::new("rails")).await));
        assert!(unwrap_outcome(projects.push(&cx, Project::new("tokio")).await));
        assert!(!unwrap_outcome(projects.has_primary_key(&cx).await));

        // A fresh association loads from the database.
        let mut fresh = JoinTableAssociation::<_, Project, _>::new(&developer, &reflection, &conn)
            .expect("reflection targets projects");
        assert_eq!(unwrap_outcome(fresh.count_records(&cx).await), 2);

        let mut found = unwrap_outcome(
            fresh
                .find_by_sql(&cx, FindOptions::new().order_by(Expr::col("name").asc()))
                .await,
        );
        assert!(found.is_readonly());
        assert_eq!(found.len(), 2);
        assert!(matches!(found.get_mut(0), Err(Error::ReadOnly(_))));
    });

    let store = conn.store();
    assert_eq!(store.projects.len(), 2);
    assert_eq!(store.links.len(), 2);
    for link in &store.links {
        let columns: Vec<&str> = link.iter().map(|(c, _)| c.as_str()).collect();
        // access_level has no source and is left to the database default.
        assert_eq!(columns, vec!["developer_id", "project_id", "created_at"]);
        assert_eq!(link[2].1, Value::TimestampTz(1_700_000_000_000_000));
    }
    assert!(
        store
            .statements
            .iter()
            .any(|s| s.contains("WHERE \"developers_projects\".\"developer_id\" = $1"))
    );
}

#[test]
fn test_postgres_custom_delete_runs_per_record_and_scopes_by_owner() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let conn = FakePostgres::new(JOIN_COLUMNS[..2].to_vec());
    let reflection = reflection(
        r#"{
            "join_table": "developers_projects",
            "foreign_key": "developer_id",
            "association_foreign_key": "project_id",
            "delete_sql": "DELETE FROM {join_table} WHERE {foreign_key} = {owner_id} AND {association_foreign_key} = {record_id}"
        }"#,
    );
    let alice = Developer { id: 1 };
    let bob = Developer { id: 2 };

    rt.block_on(async {
        let mut alices = JoinTableAssociation::<_, Project, _>::new(&alice, &reflection, &conn)
            .expect("reflection targets projects");
        let mut bobs = JoinTableAssociation::<_, Project, _>::new(&bob, &reflection, &conn)
            .expect("reflection targets projects");

        let linked = unwrap_outcome(
            alices
                .concat(&cx, vec![Project::new("rails"), Project::new("tokio")])
                .await,
        );
        assert!(linked);
        let shared = Project {
            id: Some(1),
            name: "rails".into(),
        };
        assert!(unwrap_outcome(bobs.push(&cx, shared.clone()).await));

        assert_eq!(unwrap_outcome(alices.count_records(&cx).await), 2);
        let removed = unwrap_outcome(alices.delete(&cx, &[shared]).await);
        assert_eq!(removed, 1);
        assert_eq!(alices.target().len(), 1);

        // Bob's link to the same project is untouched.
        assert_eq!(unwrap_outcome(bobs.count_records(&cx).await), 1);

        assert_eq!(unwrap_outcome(alices.clear(&cx).await), 1);
        assert_eq!(unwrap_outcome(alices.reload(&cx).await).len(), 0);
    });

    let store = conn.store();
    let custom_deletes = store
        .statements
        .iter()
        .filter(|s| s.starts_with("DELETE FROM \"developers_projects\" WHERE \"developer_id\" = $1"))
        .count();
    assert_eq!(custom_deletes, 2);
}

#[test]
fn test_configured_select_keeps_records_writable() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let conn = FakePostgres::new(JOIN_COLUMNS.to_vec());
    let reflection = reflection(
        r#"{
            "join_table": "developers_projects",
            "foreign_key": "developer_id",
            "association_foreign_key": "project_id",
            "select": ["projects.*"]
        }"#,
    );
    let developer = Developer { id: 1 };

    rt.block_on(async {
        let mut projects = JoinTableAssociation::<_, Project, _>::new(&developer, &reflection, &conn)
            .expect("reflection targets projects");
        unwrap_outcome(projects.push(&cx, Project::new("rails")).await);

        let scope = unwrap_outcome(projects.association_scope(&cx).await);
        assert!(!scope.is_readonly());

        let found = unwrap_outcome(projects.find_by_sql(&cx, FindOptions::new()).await);
        let mut records = found.into_writable().expect("writable records");
        records[0].name = "rails 8".into();
        assert_eq!(records[0].id, Some(1));
    });
}

#[test]
fn test_invalid_templates_are_rejected_when_configured() {
    let unknown = JoinTableOptions::from_json(
        r#"{
            "join_table": "developers_projects",
            "foreign_key": "developer_id",
            "association_foreign_key": "project_id",
            "insert_sql": "INSERT INTO {join_table} VALUES ({owner_id}, {record.budget})"
        }"#,
    )
    .and_then(JoinTableOptions::into_reflection::<Project>);
    assert!(matches!(unknown, Err(Error::Config(_))));

    let extra_field = JoinTableOptions::from_json(
        r#"{
            "join_table": "developers_projects",
            "foreign_key": "developer_id",
            "association_foreign_key": "project_id",
            "uniq": true
        }"#,
    );
    assert!(extra_field.is_err());
}
