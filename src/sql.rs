//! Running queries through a caller-supplied connection.
//!
//! This crate has no SQL engine; a [`SqlConnection`] executes the query and returns rows.
//! With the `sqlite` feature, `rusqlite::Connection` implements it.

use crate::error::{TableIoError, TableIoResult};
use crate::types::DataSet;

/// A database connection able to run a query and return its result as a table.
pub trait SqlConnection {
    /// Execute `query` and collect every row.
    fn query_table(&self, query: &str) -> TableIoResult<DataSet>;
}

impl<C: SqlConnection + ?Sized> SqlConnection for &C {
    fn query_table(&self, query: &str) -> TableIoResult<DataSet> {
        (**self).query_table(query)
    }
}

/// Run `query` on `connection` and return the result table.
pub fn read_sql(connection: &dyn SqlConnection, query: &str) -> TableIoResult<DataSet> {
    connection.query_table(query)
}

/// Read a whole table by name.
///
/// `table` must pass [`validate_identifier`]; otherwise nothing is executed.
pub fn read_sql_table(connection: &dyn SqlConnection, table: &str) -> TableIoResult<DataSet> {
    let table = validate_identifier(table)?;
    connection.query_table(&select_all(table))
}

/// Accept only non-empty identifiers made of ASCII letters, digits and `_`.
pub fn validate_identifier(identifier: &str) -> TableIoResult<&str> {
    let ok = !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(identifier)
    } else {
        Err(TableIoError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// `SELECT * FROM "<table>"` for an already validated table name.
pub(crate) fn select_all(table: &str) -> String {
    format!("SELECT * FROM \"{table}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_allowlist() {
        assert!(validate_identifier("users_2024").is_ok());
        for bad in ["", "DROP TABLE users; --", "a-b", "naïve", "t\"x"] {
            assert!(
                matches!(validate_identifier(bad), Err(TableIoError::InvalidIdentifier { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
