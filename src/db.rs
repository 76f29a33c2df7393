//! Creates the tables for the application's domain models and provides
//! helpers for the timestamp representation used throughout the database.
//!
//! All instants are stored as unix epoch milliseconds (UTC) in INTEGER
//! columns. Milliseconds are the canonical comparable form for transaction
//! timestamps, so storing them directly makes the uniqueness constraint on
//! `(user_id, date)` compare exactly the values the sync engine compares.

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{expense::create_expense_table, user::create_user_table};

/// Convert a date-time to the unix epoch millisecond form stored in the
/// database.
pub(crate) fn timestamp_millis(date_time: OffsetDateTime) -> i64 {
    (date_time.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Convert unix epoch milliseconds back into a UTC date-time.
pub(crate) fn datetime_from_millis(millis: i64) -> Result<OffsetDateTime, time::error::ComponentRange> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
}

/// Create the tables for the domain models if they do not already exist.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    create_user_table(connection)?;
    create_expense_table(connection)?;

    Ok(())
}

#[cfg(test)]
mod db_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn initialize_creates_tables() {
        let connection =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");

        initialize(&connection).expect("Could not initialize database");

        let table_count: i64 = connection
            .query_row(
                "SELECT COUNT(name) FROM sqlite_master WHERE type = 'table' \
                AND name IN ('user', 'expense')",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 2);
    }

    #[test]
    fn timestamp_roundtrips_through_millis() {
        use time::macros::datetime;

        use super::{datetime_from_millis, timestamp_millis};

        let date_time = datetime!(2024-03-15 10:30:00.250 UTC);

        let millis = timestamp_millis(date_time);
        let roundtripped = datetime_from_millis(millis).unwrap();

        assert_eq!(roundtripped, date_time);
    }

    #[test]
    fn initialize_is_idempotent() {
        let connection =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");

        initialize(&connection).expect("Could not initialize database");
        initialize(&connection).expect("Second initialize should not fail");
    }
}
