//! Parameterized SQL templates for custom join-table statements.
//!
//! A template is plain SQL with brace placeholders:
//!
//! | placeholder | renders as |
//! |---|---|
//! | `{owner_id}` | bound parameter: the owner's identifier |
//! | `{record_id}` | bound parameter: the record's identifier |
//! | `{record.<column>}` | bound parameter: the record's value for `<column>` |
//! | `{join_table}` | quoted identifier |
//! | `{foreign_key}` | quoted identifier |
//! | `{association_foreign_key}` | quoted identifier |
//!
//! `{{` and `}}` produce literal braces. Templates are parsed once, when the
//! association is configured, and every placeholder is checked against the
//! target model's columns so typos surface as configuration errors instead of
//! broken SQL at runtime.

use crate::connection::Dialect;
use crate::error::{Error, Result};
use crate::value::Value;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A named slot in a [`SqlTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// The owner's identifier.
    OwnerId,
    /// The record's identifier.
    RecordId,
    /// A column value read from the record.
    RecordAttribute(String),
    /// The join table name.
    JoinTable,
    /// The owner foreign key column in the join table.
    ForeignKey,
    /// The target foreign key column in the join table.
    AssociationForeignKey,
}

impl Placeholder {
    fn parse(name: &str, record_columns: &[&str]) -> Result<Self> {
        match name {
            "owner_id" => Ok(Placeholder::OwnerId),
            "record_id" => Ok(Placeholder::RecordId),
            "join_table" => Ok(Placeholder::JoinTable),
            "foreign_key" => Ok(Placeholder::ForeignKey),
            "association_foreign_key" => Ok(Placeholder::AssociationForeignKey),
            other => {
                let Some(caps) = attribute_pattern().captures(other) else {
                    return Err(Error::config(format!(
                        "unknown SQL template placeholder {{{other}}}"
                    )));
                };
                let column = &caps[1];
                if !record_columns.contains(&column) {
                    return Err(Error::config(format!(
                        "SQL template placeholder {{{other}}} names a column the record does not have"
                    )));
                }
                Ok(Placeholder::RecordAttribute(column.to_string()))
            }
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::OwnerId => write!(f, "{{owner_id}}"),
            Placeholder::RecordId => write!(f, "{{record_id}}"),
            Placeholder::RecordAttribute(col) => write!(f, "{{record.{col}}}"),
            Placeholder::JoinTable => write!(f, "{{join_table}}"),
            Placeholder::ForeignKey => write!(f, "{{foreign_key}}"),
            Placeholder::AssociationForeignKey => write!(f, "{{association_foreign_key}}"),
        }
    }
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^record\.([A-Za-z_][A-Za-z0-9_]*)$").unwrap_or_else(|e| {
            std::panic::panic_any(format!("invalid record attribute pattern: {e}"))
        })
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Sql(String),
    Slot(Placeholder),
}

/// Everything a template can bind when it is rendered.
#[derive(Debug, Clone)]
pub struct TemplateBindings<'a> {
    /// Owner identifier.
    pub owner_id: Value,
    /// Record identifier.
    pub record_id: Value,
    /// Record column values, as produced by `Model::to_row`.
    pub attributes: Vec<(&'static str, Value)>,
    /// Join table name.
    pub join_table: &'a str,
    /// Owner foreign key column.
    pub foreign_key: &'a str,
    /// Target foreign key column.
    pub association_foreign_key: &'a str,
}

/// A validated SQL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl SqlTemplate {
    /// Parse `source`, accepting `{record.<column>}` only for `record_columns`.
    #[allow(clippy::result_large_err)]
    pub fn parse(source: &str, record_columns: &[&str]) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(Error::config(format!(
                            "unterminated placeholder at byte {pos} in SQL template"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Sql(std::mem::take(&mut literal)));
                    }
                    let slot = Placeholder::parse(name.trim(), record_columns)?;
                    segments.push(Segment::Slot(slot));
                }
                '}' => {
                    return Err(Error::config(format!(
                        "unmatched '}}' at byte {pos} in SQL template"
                    )));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Sql(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template text as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholders used by this template, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(p) => Some(p),
            Segment::Sql(_) => None,
        })
    }

    /// Render SQL text and bound parameters for one record.
    pub fn render(&self, dialect: Dialect, bindings: &TemplateBindings<'_>) -> (String, Vec<Value>) {
        let mut sql = String::with_capacity(self.source.len());
        let mut params = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Sql(text) => sql.push_str(text),
                Segment::Slot(Placeholder::JoinTable) => {
                    sql.push_str(&dialect.quote_identifier(bindings.join_table));
                }
                Segment::Slot(Placeholder::ForeignKey) => {
                    sql.push_str(&dialect.quote_identifier(bindings.foreign_key));
                }
                Segment::Slot(Placeholder::AssociationForeignKey) => {
                    sql.push_str(&dialect.quote_identifier(bindings.association_foreign_key));
                }
                Segment::Slot(slot) => {
                    let value = match slot {
                        Placeholder::OwnerId => bindings.owner_id.clone(),
                        Placeholder::RecordId => bindings.record_id.clone(),
                        Placeholder::RecordAttribute(column) => bindings
                            .attributes
                            .iter()
                            .find(|(name, _)| *name == column.as_str())
                            .map_or(Value::Null, |(_, v)| v.clone()),
                        _ => Value::Null,
                    };
                    params.push(value);
                    sql.push_str(&dialect.placeholder(params.len()));
                }
            }
        }

        (sql, params)
    }
}

impl fmt::Display for SqlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
