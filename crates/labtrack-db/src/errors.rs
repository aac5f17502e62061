//! Mapping of PostgreSQL constraint failures onto labtrack errors.

use labtrack_core::Error;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE for `restrict_violation` (raised by `ON DELETE RESTRICT`).
const RESTRICT_VIOLATION: &str = "23001";
/// SQLSTATE for `check_violation`.
const CHECK_VIOLATION: &str = "23514";
/// SQLSTATE for `string_data_right_truncation` (value wider than its column).
const STRING_TOO_LONG: &str = "22001";

/// Convert a sqlx error, turning constraint violations into
/// [`Error::Conflict`] / [`Error::Validation`].
///
/// Conflict messages keep the constraint name so callers can tell which
/// constraint fired (`sample_slug_key` marks a slug race).
pub(crate) fn map_db_error(e: sqlx::Error) -> Error {
    let (code, message, constraint) = match e.as_database_error() {
        Some(db) => (
            db.code().map(|c| c.into_owned()),
            db.message().to_string(),
            db.constraint().map(str::to_string),
        ),
        None => return Error::Database(e),
    };

    let detail = match constraint {
        Some(name) if !message.contains(&name) => format!("{} ({})", message, name),
        _ => message,
    };

    match code.as_deref() {
        Some(UNIQUE_VIOLATION) | Some(FOREIGN_KEY_VIOLATION) | Some(RESTRICT_VIOLATION) => {
            Error::Conflict(detail)
        }
        Some(CHECK_VIOLATION) | Some(STRING_TOO_LONG) => Error::Validation(detail),
        _ => Error::Database(e),
    }
}
