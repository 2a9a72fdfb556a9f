//! Join-table associations for linkmodel.
//!
//! `linkmodel-association` is the **collection layer**. It binds an owner
//! record to many target records through a join table and keeps the rows of
//! that table in step with the collection.
//!
//! # Role In The Architecture
//!
//! - **Column roles**: each join-table column is classified once as owner key,
//!   target key, timestamp or passthrough; insert values follow from the role.
//! - **Scopes**: target queries join through the join table and turn read-only
//!   when extra join columns would leak into the targets.
//! - **Saving**: new targets are persisted through a [`RecordSaver`] before
//!   they are linked. Reads, unlinking and linking saved records need no
//!   saver at all.
//!
//! All database work goes through `linkmodel_core::Connection` with `Cx` and
//! `Outcome`, one round trip per await.
//!
//! # Example
//!
//! ```ignore
//! let reflection = JoinTableReflection::conventional::<Developer, Project>()
//!     .build::<Project>()?;
//! let mut projects = JoinTableAssociation::<_, Project, _>::new(&developer, &reflection, &conn)?;
//!
//! // INSERT INTO projects ...; INSERT INTO developers_projects ...
//! projects.push(&cx, Project::new("rails")).await?;
//!
//! // Records mixing join columns come back read-only.
//! let found = projects.find_by_sql(&cx, FindOptions::new().limit(10)).await?;
//! ```

pub mod column_role;
pub mod join_table;
pub mod loaded;
pub mod saver;

#[cfg(test)]
mod mock;

pub use column_role::{ColumnRole, JoinColumn};
pub use join_table::{FindOptions, JoinTableAssociation};
pub use loaded::Loaded;
pub use saver::{InsertRecordSaver, PlainRecordSaver, RecordSaver};
