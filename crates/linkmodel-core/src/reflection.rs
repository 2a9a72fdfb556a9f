//! Join-table reflection metadata.
//!
//! A [`JoinTableReflection`] is the static description of a many-to-many
//! association: which table links the two models, which of its columns point
//! at each side, and any custom SQL that replaces the generated statements.
//! It is built once (from code or from deserialized [`JoinTableOptions`]) and
//! validated against the target model at that point.

use crate::error::{Error, Result};
use crate::model::Model;
use crate::template::SqlTemplate;
use serde::{Deserialize, Serialize};

/// Serializable association options, e.g. loaded from a JSON config file.
///
/// ```json
/// {
///   "join_table": "developers_projects",
///   "foreign_key": "developer_id",
///   "association_foreign_key": "project_id",
///   "delete_sql": "DELETE FROM {join_table} WHERE {foreign_key} = {owner_id} AND {association_foreign_key} = {record_id}"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinTableOptions {
    /// Join table name.
    pub join_table: String,
    /// Column in the join table pointing at the owner.
    pub foreign_key: String,
    /// Column in the join table pointing at the target.
    pub association_foreign_key: String,
    /// Custom INSERT template replacing the generated statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_sql: Option<String>,
    /// Custom DELETE template, executed once per removed record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_sql: Option<String>,
    /// Explicit select list used when loading the collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    /// Join table columns, when known up front; skips introspection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_columns: Option<Vec<String>>,
}

impl JoinTableOptions {
    /// Parse options from JSON.
    #[allow(clippy::result_large_err)]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate the options against target model `T`.
    #[allow(clippy::result_large_err)]
    pub fn into_reflection<T: Model>(self) -> Result<JoinTableReflection> {
        JoinTableReflection::from_options::<T>(self)
    }
}

/// Validated metadata for a join-table association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTableReflection {
    join_table: String,
    foreign_key: String,
    association_foreign_key: String,
    insert_sql: Option<SqlTemplate>,
    delete_sql: Option<SqlTemplate>,
    select: Option<Vec<String>>,
    join_columns: Option<Vec<String>>,
    target_table: &'static str,
    target_primary_key: &'static str,
}

impl JoinTableReflection {
    /// Start building a reflection with explicit table and key names.
    pub fn builder(
        join_table: impl Into<String>,
        foreign_key: impl Into<String>,
        association_foreign_key: impl Into<String>,
    ) -> JoinTableReflectionBuilder {
        JoinTableReflectionBuilder {
            options: JoinTableOptions {
                join_table: join_table.into(),
                foreign_key: foreign_key.into(),
                association_foreign_key: association_foreign_key.into(),
                ..JoinTableOptions::default()
            },
        }
    }

    /// Start building a reflection with conventional names for owner `O`
    /// and target `T`.
    ///
    /// The join table is both table names in lexical order joined by `_`
    /// (`developers` + `projects` = `developers_projects`); the keys are the
    /// singular table names suffixed with `_id`.
    pub fn conventional<O: Model, T: Model>() -> JoinTableReflectionBuilder {
        let (first, second) = if O::TABLE_NAME <= T::TABLE_NAME {
            (O::TABLE_NAME, T::TABLE_NAME)
        } else {
            (T::TABLE_NAME, O::TABLE_NAME)
        };
        Self::builder(
            format!("{first}_{second}"),
            format!("{}_id", singularize(O::TABLE_NAME)),
            format!("{}_id", singularize(T::TABLE_NAME)),
        )
    }

    /// Validate deserialized options against target model `T`.
    #[allow(clippy::result_large_err)]
    pub fn from_options<T: Model>(options: JoinTableOptions) -> Result<Self> {
        JoinTableReflectionBuilder { options }.build::<T>()
    }

    /// Join table name.
    pub fn join_table(&self) -> &str {
        &self.join_table
    }

    /// Owner foreign key column in the join table.
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    /// Target foreign key column in the join table.
    pub fn association_foreign_key(&self) -> &str {
        &self.association_foreign_key
    }

    /// Custom INSERT template, if configured.
    pub fn insert_sql(&self) -> Option<&SqlTemplate> {
        self.insert_sql.as_ref()
    }

    /// Custom DELETE template, if configured.
    pub fn delete_sql(&self) -> Option<&SqlTemplate> {
        self.delete_sql.as_ref()
    }

    /// Explicit select list, if configured.
    pub fn select(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    /// Join table columns supplied by configuration, if any.
    pub fn join_columns(&self) -> Option<&[String]> {
        self.join_columns.as_deref()
    }

    /// Table of the target model.
    pub fn target_table(&self) -> &'static str {
        self.target_table
    }

    /// Primary key column of the target model.
    pub fn target_primary_key(&self) -> &'static str {
        self.target_primary_key
    }
}

/// Builder for [`JoinTableReflection`].
#[derive(Debug, Clone)]
pub struct JoinTableReflectionBuilder {
    options: JoinTableOptions,
}

impl JoinTableReflectionBuilder {
    /// Use a custom INSERT template.
    pub fn insert_sql(mut self, template: impl Into<String>) -> Self {
        self.options.insert_sql = Some(template.into());
        self
    }

    /// Use a custom DELETE template.
    pub fn delete_sql(mut self, template: impl Into<String>) -> Self {
        self.options.delete_sql = Some(template.into());
        self
    }

    /// Load the collection with an explicit select list.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Declare the join table's columns instead of introspecting them.
    pub fn join_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.join_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Validate and build the reflection for target model `T`.
    #[allow(clippy::result_large_err)]
    pub fn build<T: Model>(self) -> Result<JoinTableReflection> {
        let JoinTableOptions {
            join_table,
            foreign_key,
            association_foreign_key,
            insert_sql,
            delete_sql,
            select,
            join_columns,
        } = self.options;

        for (what, name) in [
            ("join_table", &join_table),
            ("foreign_key", &foreign_key),
            ("association_foreign_key", &association_foreign_key),
        ] {
            if name.trim().is_empty() {
                return Err(Error::config(format!("{what} must not be empty")));
            }
        }
        if foreign_key == association_foreign_key {
            return Err(Error::config(format!(
                "foreign_key and association_foreign_key are both '{foreign_key}'"
            )));
        }
        if let Some(columns) = &join_columns {
            for key in [&foreign_key, &association_foreign_key] {
                if !columns.iter().any(|c| c == key) {
                    return Err(Error::config(format!(
                        "join_columns for '{join_table}' is missing key column '{key}'"
                    )));
                }
            }
        }
        if select.as_ref().is_some_and(Vec::is_empty) {
            return Err(Error::config("select must list at least one column"));
        }

        let record_columns: Vec<&str> = T::fields().iter().map(|f| f.column_name).collect();
        let insert_sql = insert_sql
            .map(|s| SqlTemplate::parse(&s, &record_columns))
            .transpose()?;
        let delete_sql = delete_sql
            .map(|s| SqlTemplate::parse(&s, &record_columns))
            .transpose()?;

        tracing::debug!(
            join_table = %join_table,
            target = T::TABLE_NAME,
            custom_insert = insert_sql.is_some(),
            custom_delete = delete_sql.is_some(),
            "Configured join table association"
        );

        Ok(JoinTableReflection {
            join_table,
            foreign_key,
            association_foreign_key,
            insert_sql,
            delete_sql,
            select,
            join_columns,
            target_table: T::TABLE_NAME,
            target_primary_key: T::primary_key_column(),
        })
    }
}

fn singularize(table: &str) -> String {
    if let Some(stem) = table.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = table.strip_suffix("ses") {
        format!("{stem}s")
    } else if let Some(stem) = table.strip_suffix('s') {
        stem.to_string()
    } else {
        table.to_string()
    }
}
