//! Database query functions organized by domain.
//!
//! Every function takes a `&Connection`; a `&Transaction` derefs to one, so
//! the same functions serve both plain reads and [`crate::transact`] bodies.

pub mod audit;
pub mod certificates;
pub mod courses;
pub mod enrollments;
pub mod payment_events;
pub mod progress;

use std::str::FromStr;

use cursus_types::ParseStatusError;
use rusqlite::types::Type;
use rusqlite::Row;

/// Read a status column and parse it into its enum.
pub(crate) fn status_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ParseStatusError>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(|v| v as u64))
}

pub(crate) fn opt_i64(value: Option<u64>) -> Option<i64> {
    value.map(|v| v as i64)
}
