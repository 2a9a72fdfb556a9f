//! linkmodel - many-to-many join-table associations for Rust.
//!
//! linkmodel links records of two models through a join table, the way a
//! has-and-belongs-to-many association does:
//!
//! - Type-safe model mapping through the `Model` trait
//! - Join-table reflection, configured in code or loaded from JSON
//! - Validated SQL templates for custom link/unlink statements
//! - Read-only scopes when join columns would leak into targets
//! - Cancel-correct async database access built on asupersync
//!
//! # Quick Start
//!
//! ```ignore
//! use linkmodel::prelude::*;
//!
//! async fn link(cx: &Cx, conn: &impl Connection, developer: &Developer) -> Outcome<usize, Error> {
//!     let reflection = JoinTableReflection::conventional::<Developer, Project>()
//!         .build::<Project>()
//!         .expect("valid reflection");
//!     let mut projects = JoinTableAssociation::<_, Project, _>::new(developer, &reflection, conn)
//!         .expect("reflection targets projects");
//!
//!     projects.push(cx, Project::new("rails")).await?;
//!     projects.count_records(cx).await
//! }
//! ```

pub use linkmodel_association as association;
pub use linkmodel_query as query;
pub use linkmodel_schema as schema;

pub use linkmodel_core::{
    AutoIncrement, Clock, Connection, Cx, Dialect, Error, FieldInfo, FixedClock, JoinTableOptions,
    JoinTableReflection, JoinTableReflectionBuilder, Model, Outcome, Result, Row, SqlTemplate,
    SystemClock, Timezone, ValidationError, Value,
};
pub use linkmodel_query::{
    DeleteStatement, Expr, InsertBuilder, InsertStatement, Join, JoinType, OrderBy, Select, Table,
};
pub use linkmodel_schema::Introspector;
pub use linkmodel_association::{
    ColumnRole, FindOptions, InsertRecordSaver, JoinColumn, JoinTableAssociation, Loaded,
    PlainRecordSaver, RecordSaver,
};

/// Common imports.
pub mod prelude {
    pub use crate::{
        AutoIncrement, Connection, Cx, Error, Expr, FieldInfo, FindOptions, JoinTableAssociation,
        JoinTableOptions, JoinTableReflection, Model, OrderBy, Outcome, Result, Row, Select, Table,
        ValidationError, Value,
    };
}
