//! Persisting new records before they are linked.

use asupersync::{Cx, Outcome};
use linkmodel_core::{AutoIncrement, Connection, Error, Model};
use linkmodel_query::InsertBuilder;
use std::future::Future;

/// Saves a new target record so it has an id to link to.
///
/// Returns `Ok(true)` when the record was saved and `Ok(false)` when it was
/// rejected without an error (e.g. failed validation without `force`).
pub trait RecordSaver<T: Model, C: Connection>: Send + Sync {
    /// Save `record`.
    ///
    /// With `force`, a rejected record is an error instead of `Ok(false)`.
    /// `validate` controls whether the record's validations run first.
    fn save_record(
        &self,
        cx: &Cx,
        conn: &C,
        record: &mut T,
        force: bool,
        validate: bool,
    ) -> impl Future<Output = Outcome<bool, Error>> + Send;
}

/// Validate `record` and INSERT it into its table.
///
/// Returns the driver's last insert id, or `None` when validation rejected
/// the record without `force`.
async fn validate_and_insert<T: Model, C: Connection>(
    cx: &Cx,
    conn: &C,
    record: &T,
    force: bool,
    validate: bool,
) -> Outcome<Option<i64>, Error> {
    if force || validate {
        if let Err(errors) = record.validate() {
            tracing::debug!(
                table = T::TABLE_NAME,
                errors = errors.errors.len(),
                force,
                "Record failed validation"
            );
            return if force {
                Outcome::Err(Error::Validation(errors))
            } else {
                Outcome::Ok(None)
            };
        }
    }

    let id = match InsertBuilder::new(record).execute(cx, conn).await {
        Outcome::Ok(id) => id,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };
    tracing::debug!(table = T::TABLE_NAME, id, "Saved record");
    Outcome::Ok(Some(id))
}

/// Validates, INSERTs into the model's table and stores the generated id.
///
/// A forced save always validates, matching a bang-style save.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertRecordSaver;

impl<T, C> RecordSaver<T, C> for InsertRecordSaver
where
    T: AutoIncrement,
    C: Connection,
{
    fn save_record(
        &self,
        cx: &Cx,
        conn: &C,
        record: &mut T,
        force: bool,
        validate: bool,
    ) -> impl Future<Output = Outcome<bool, Error>> + Send {
        async move {
            let was_new = record.is_new();
            match validate_and_insert(cx, conn, &*record, force, validate).await {
                Outcome::Ok(Some(id)) => {
                    if was_new && id > 0 {
                        record.set_id(id);
                    }
                    Outcome::Ok(true)
                }
                Outcome::Ok(None) => Outcome::Ok(false),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }
}

/// Validates and INSERTs any model, leaving its key as the caller set it.
///
/// For targets keyed by natural values (codes, slugs) rather than a
/// generated id.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRecordSaver;

impl<T, C> RecordSaver<T, C> for PlainRecordSaver
where
    T: Model,
    C: Connection,
{
    fn save_record(
        &self,
        cx: &Cx,
        conn: &C,
        record: &mut T,
        force: bool,
        validate: bool,
    ) -> impl Future<Output = Outcome<bool, Error>> + Send {
        async move {
            validate_and_insert(cx, conn, &*record, force, validate)
                .await
                .map(|saved| saved.is_some())
        }
    }
}
