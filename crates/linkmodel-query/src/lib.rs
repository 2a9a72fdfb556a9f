//! SQL construction layer for linkmodel.
//!
//! `linkmodel-query` turns `Model` metadata and expressions into SQL text plus
//! bound parameters:
//!
//! - **Expression DSL**: `Expr` builds WHERE and ON conditions safely.
//! - **Tables and joins**: `Table` qualifies columns and creates `Join`s.
//! - **Scopes**: `Select` is a lazily executed, optionally read-only query.
//! - **Statements**: `InsertStatement` / `DeleteStatement` for any table,
//!   `InsertBuilder` for model rows.
//!
//! Statements execute through the `Connection` trait from `linkmodel-core`,
//! using the connection's dialect for placeholders and quoting.

pub mod builder;
pub mod clause;
pub mod expr;
pub mod join;
pub mod select;
pub mod table;

pub use builder::{DeleteStatement, InsertBuilder, InsertStatement};
pub use clause::{Limit, NullsOrder, Offset, OrderBy, OrderDirection, Where};
pub use expr::{BinaryOp, Dialect, Expr};
pub use join::{Join, JoinType};
pub use select::Select;
pub use table::Table;
