//! Defines the core data model and database queries for expenses.

use std::str::FromStr;

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    db::{datetime_from_millis, timestamp_millis},
};

/// An alias for expense IDs.
pub type ExpenseId = i64;

/// A single recorded financial transaction owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// The ID of the expense.
    pub id: ExpenseId,
    /// The ID of the user that owns the expense.
    pub user_id: UserID,
    /// A free-text category label, conventionally "debit", "credit" or
    /// "unknown".
    pub category: String,
    /// The signed monetary amount of the transaction.
    pub amount: Decimal,
    /// A text description of the transaction, e.g. the source SMS body.
    pub description: Option<String>,
    /// When the transaction happened.
    ///
    /// Unique per user: at most one expense may exist for a given user and
    /// instant.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// The label of the sender, e.g. "VM-HDFCBK-S".
    pub sender: Option<String>,
    /// The person or merchant on the other side of the transaction.
    #[serde(rename = "senderReceiver")]
    pub counterparty: Option<String>,
    /// An external transaction reference, e.g. a UPI transaction ID.
    #[serde(rename = "upiTransactionId")]
    pub external_id: Option<String>,
    /// The full source message the transaction was derived from.
    pub raw_message: Option<String>,
    /// When the expense record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the expense record was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The data needed to insert a new expense row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    /// The ID of the user that will own the expense.
    pub user_id: UserID,
    /// A free-text category label.
    pub category: String,
    /// The signed monetary amount of the transaction.
    pub amount: Decimal,
    /// A text description of the transaction.
    pub description: Option<String>,
    /// When the transaction happened.
    pub date: OffsetDateTime,
    /// The label of the sender.
    pub sender: Option<String>,
    /// The person or merchant on the other side of the transaction.
    pub counterparty: Option<String>,
    /// An external transaction reference.
    pub external_id: Option<String>,
    /// The full source message the transaction was derived from.
    pub raw_message: Option<String>,
}

/// The subset of expense fields that may be changed after creation.
///
/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseChanges {
    /// A new category label.
    pub category: Option<String>,
    /// A new amount.
    pub amount: Option<Decimal>,
    /// A new description.
    pub description: Option<String>,
    /// A new transaction date.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

/// Create the expense table.
///
/// The table has a uniqueness constraint on `(user_id, date)`: for a given
/// user, at most one expense may exist per distinct transaction instant.
/// This constraint is the authoritative dedup guard for the sync engine.
///
/// # Errors
/// This function will return an error if the SQL query failed.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                category TEXT NOT NULL,
                amount TEXT NOT NULL,
                description TEXT,
                date INTEGER NOT NULL,
                sender TEXT,
                counterparty TEXT,
                external_id TEXT,
                raw_message TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(user_id, date)
                )",
        (),
    )?;

    Ok(())
}

pub(crate) const EXPENSE_COLUMNS: &str = "id, user_id, category, amount, description, date, \
    sender, counterparty, external_id, raw_message, created_at, updated_at";

/// Insert a new expense into the database.
///
/// # Errors
/// This function will return an error if:
/// - the owning user already has an expense at the same instant
///   ([Error::DuplicateTransactionTime]).
/// - there was an unexpected SQL error.
pub fn create_expense(new_expense: NewExpense, connection: &Connection) -> Result<Expense, Error> {
    let now_millis = timestamp_millis(OffsetDateTime::now_utc());

    connection.execute(
        "INSERT INTO expense (user_id, category, amount, description, date, sender, \
        counterparty, external_id, raw_message, created_at, updated_at) \
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        (
            new_expense.user_id.as_i64(),
            &new_expense.category,
            new_expense.amount.to_string(),
            &new_expense.description,
            timestamp_millis(new_expense.date),
            &new_expense.sender,
            &new_expense.counterparty,
            &new_expense.external_id,
            &new_expense.raw_message,
            now_millis,
            now_millis,
        ),
    )?;

    let id = connection.last_insert_rowid();

    get_expense(id, new_expense.user_id, connection)
}

/// Get the expense with ID `id` belonging to `user_id`.
///
/// The lookup filters by both the expense ID and the owning user in a single
/// query, so an expense that exists but belongs to another user is
/// indistinguishable from one that does not exist.
///
/// # Errors
/// This function will return an error if:
/// - no expense matches both `id` and `user_id` ([Error::NotFound]).
/// - there was an error trying to access the store.
pub fn get_expense(id: ExpenseId, user_id: UserID, connection: &Connection) -> Result<Expense, Error> {
    connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &id), (":user_id", &user_id.as_i64())],
            map_expense_row,
        )
        .map_err(|error| error.into())
}

/// Get all expenses belonging to `user_id`, most recent transaction date
/// first.
///
/// # Errors
/// This function will return an error if there was an error trying to access
/// the store.
pub fn get_expenses(user_id: UserID, connection: &Connection) -> Result<Vec<Expense>, Error> {
    connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense WHERE user_id = :user_id ORDER BY date DESC"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_expense_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| error.into())
}

/// Apply `changes` to the expense with ID `id` belonging to `user_id` and
/// return the updated expense.
///
/// # Errors
/// This function will return an error if:
/// - no expense matches both `id` and `user_id` ([Error::NotFound]).
/// - the new date collides with another expense for the same user
///   ([Error::DuplicateTransactionTime]).
/// - there was an unexpected SQL error.
pub fn update_expense(
    id: ExpenseId,
    user_id: UserID,
    changes: ExpenseChanges,
    connection: &Connection,
) -> Result<Expense, Error> {
    let now_millis = timestamp_millis(OffsetDateTime::now_utc());

    let rows_updated = connection.execute(
        "UPDATE expense SET \
        category = COALESCE(?1, category), \
        amount = COALESCE(?2, amount), \
        description = COALESCE(?3, description), \
        date = COALESCE(?4, date), \
        updated_at = ?5 \
        WHERE id = ?6 AND user_id = ?7",
        (
            &changes.category,
            changes.amount.map(|amount| amount.to_string()),
            &changes.description,
            changes.date.map(timestamp_millis),
            now_millis,
            id,
            user_id.as_i64(),
        ),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    get_expense(id, user_id, connection)
}

/// Delete the expense with ID `id` belonging to `user_id`.
///
/// # Errors
/// This function will return an error if:
/// - no expense matches both `id` and `user_id` ([Error::NotFound]).
/// - there was an unexpected SQL error.
pub fn delete_expense(
    id: ExpenseId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_deleted = connection.execute(
        "DELETE FROM expense WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

pub(crate) fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let raw_amount: String = row.get(3)?;
    let amount = Decimal::from_str(&raw_amount).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Expense {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        category: row.get(2)?,
        amount,
        description: row.get(4)?,
        date: datetime_from_row(row, 5)?,
        sender: row.get(6)?,
        counterparty: row.get(7)?,
        external_id: row.get(8)?,
        raw_message: row.get(9)?,
        created_at: datetime_from_row(row, 10)?,
        updated_at: datetime_from_row(row, 11)?,
    })
}

fn datetime_from_row(row: &Row, index: usize) -> Result<OffsetDateTime, rusqlite::Error> {
    let millis: i64 = row.get(index)?;

    datetime_from_millis(millis).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Integer,
            Box::new(error),
        )
    })
}

#[cfg(test)]
pub(crate) mod test_utils {
    use rusqlite::Connection;
    use time::OffsetDateTime;

    use crate::{PasswordHash, UserID, db::initialize, user::create_user};

    use super::{Expense, NewExpense, create_expense};

    pub(crate) fn get_test_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        initialize(&conn).expect("Could not initialize database");

        conn
    }

    pub(crate) fn create_test_user(email: &str, connection: &Connection) -> UserID {
        create_user(
            "Test",
            &email.parse().unwrap(),
            PasswordHash::new_unchecked("hunter2"),
            connection,
        )
        .expect("Could not create test user")
        .id
    }

    pub(crate) fn new_expense(user_id: UserID, category: &str, amount: &str, date: OffsetDateTime) -> NewExpense {
        NewExpense {
            user_id,
            category: category.to_owned(),
            amount: amount.parse().unwrap(),
            description: Some("test expense".to_owned()),
            date,
            sender: None,
            counterparty: None,
            external_id: None,
            raw_message: None,
        }
    }

    pub(crate) fn insert_expense(
        user_id: UserID,
        category: &str,
        amount: &str,
        date: OffsetDateTime,
        connection: &Connection,
    ) -> Expense {
        create_expense(new_expense(user_id, category, amount, date), connection)
            .expect("Could not create test expense")
    }
}
