//! The sync engine: bulk reconciliation of client-submitted transactions
//! against stored expenses.
//!
//! Clients (typically a phone app parsing bank SMS messages) submit a batch
//! of raw transactions. The engine normalizes each timestamp to a canonical
//! instant, fetches the user's existing expenses at exactly those instants,
//! and inserts only the transactions that are not already stored.
//!
//! The pre-filter is a best-effort optimization: the authoritative dedup
//! guard is the `UNIQUE(user_id, date)` constraint on the expense table. A
//! concurrent sync for the same user that wins the race between the read and
//! the bulk insert makes the insert fail with
//! [Error::DuplicateTransactionTime], which is surfaced to the caller as a
//! conflict so it can retry against fresh data.

use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, params_from_iter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    Error, UserID,
    db::{datetime_from_millis, timestamp_millis},
    expense::core::{Expense, NewExpense, create_expense},
};

/// An unvalidated transaction record as submitted by a client, prior to
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    /// When the transaction happened, as epoch milliseconds or an RFC 3339
    /// string. May be missing or unparseable, in which case the transaction
    /// is rejected with a reported reason.
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    /// The signed monetary amount of the transaction.
    pub amount: Decimal,
    /// A type label such as "debit" or "credit".
    #[serde(default)]
    pub transaction_type: Option<String>,
    /// The full source message the transaction was derived from.
    #[serde(default)]
    pub raw_message: Option<String>,
    /// The label of the sender, e.g. "VM-HDFCBK-S".
    #[serde(default)]
    pub sender: Option<String>,
    /// The person or merchant on the other side of the transaction.
    #[serde(default)]
    pub sender_receiver: Option<String>,
    /// An external transaction reference, e.g. a UPI transaction ID.
    #[serde(default)]
    pub upi_transaction_id: Option<String>,
}

/// A transaction timestamp as submitted by a client.
///
/// Clients send either a unix timestamp in milliseconds or an RFC 3339
/// date-time string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Unix epoch milliseconds.
    Millis(i64),
    /// An RFC 3339 date-time string, e.g. "2024-03-15T10:30:00Z".
    Text(String),
}

/// A transaction that was rejected during normalization, echoed back with
/// the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTransaction {
    /// The rejected transaction as it was submitted.
    pub transaction: RawTransaction,
    /// Why the transaction was rejected.
    pub reason: String,
}

/// The result of reconciling a batch of raw transactions against the stored
/// expenses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    /// How many transactions were inserted.
    pub inserted_count: usize,
    /// How many transactions were already stored.
    pub already_entered_count: usize,
    /// How many transactions were rejected during normalization.
    pub skipped_count: usize,
    /// The inserted expense records.
    pub saved: Vec<Expense>,
    /// The already-stored transactions, echoed back as submitted.
    pub already_entered: Vec<RawTransaction>,
    /// The rejected transactions and the reasons they were rejected.
    pub skipped: Vec<SkippedTransaction>,
}

/// Reconcile `transactions` against the expenses stored for `user_id` and
/// persist the ones that are new.
///
/// Transactions whose timestamp is missing or unparseable are rejected and
/// reported in [SyncOutcome::skipped] rather than silently dropped. Within a
/// batch, transactions sharing the same instant are inserted at most once;
/// the rest are reported as already entered.
///
/// All new records are inserted in a single SQL transaction, so a sync
/// either persists all of its new records or none of them. An empty set of
/// new records skips the insert entirely.
///
/// # Errors
/// This function will return an error if:
/// - a concurrent sync stored an expense at one of the batch's instants
///   between the existing-set read and the insert
///   ([Error::DuplicateTransactionTime]). No records are persisted in this
///   case, the caller should retry.
/// - there was an unexpected SQL error.
pub fn sync_transactions(
    user_id: UserID,
    transactions: &[RawTransaction],
    connection: &Connection,
) -> Result<SyncOutcome, Error> {
    let mut skipped = Vec::new();
    let mut normalized = Vec::new();

    for transaction in transactions {
        match normalize_timestamp(transaction.timestamp.as_ref()) {
            Ok(instant) => normalized.push((transaction, instant)),
            Err(reason) => skipped.push(SkippedTransaction {
                transaction: transaction.clone(),
                reason,
            }),
        }
    }

    let existing = existing_instants(
        user_id,
        normalized.iter().map(|(_, instant)| *instant),
        connection,
    )?;

    let mut seen = existing;
    let mut already_entered = Vec::new();
    let mut to_insert = Vec::new();

    for (transaction, instant) in normalized {
        if seen.insert(instant) {
            to_insert.push((transaction, instant));
        } else {
            already_entered.push(transaction.clone());
        }
    }

    let mut saved = Vec::with_capacity(to_insert.len());

    if !to_insert.is_empty() {
        let sql_transaction = connection.unchecked_transaction()?;

        for (transaction, instant) in &to_insert {
            saved.push(create_expense(
                build_expense(user_id, transaction, *instant)?,
                &sql_transaction,
            )?);
        }

        sql_transaction.commit()?;
    }

    Ok(SyncOutcome {
        inserted_count: saved.len(),
        already_entered_count: already_entered.len(),
        skipped_count: skipped.len(),
        saved,
        already_entered,
        skipped,
    })
}

/// Normalize a submitted timestamp to epoch milliseconds UTC.
///
/// Millisecond values are checked for representability here so that an
/// out-of-range value is reported as skipped rather than failing the batch
/// during the insert.
fn normalize_timestamp(timestamp: Option<&RawTimestamp>) -> Result<i64, String> {
    match timestamp {
        None => Err("missing timestamp".to_owned()),
        Some(RawTimestamp::Millis(millis)) => datetime_from_millis(*millis)
            .map(|_| *millis)
            .map_err(|_| format!("timestamp {millis} is out of range")),
        Some(RawTimestamp::Text(text)) => OffsetDateTime::parse(text, &Rfc3339)
            .map(timestamp_millis)
            .map_err(|error| format!("could not parse timestamp \"{text}\": {error}")),
    }
}

/// Fetch the subset of `instants` at which `user_id` already has an expense.
///
/// This is a set-membership query over the exact instants in the batch, not
/// a range scan.
fn existing_instants(
    user_id: UserID,
    instants: impl Iterator<Item = i64>,
    connection: &Connection,
) -> Result<HashSet<i64>, Error> {
    let instants: HashSet<i64> = instants.collect();

    if instants.is_empty() {
        return Ok(HashSet::new());
    }

    let placeholders = vec!["?"; instants.len()].join(", ");
    let mut statement = connection.prepare(&format!(
        "SELECT date FROM expense WHERE user_id = ? AND date IN ({placeholders})"
    ))?;

    let params: Vec<i64> = std::iter::once(user_id.as_i64())
        .chain(instants.into_iter())
        .collect();

    let existing = statement
        .query_map(params_from_iter(params), |row| row.get::<_, i64>(0))?
        .collect::<Result<HashSet<_>, _>>()?;

    Ok(existing)
}

/// Build the expense record for a new transaction, applying the documented
/// defaults for absent fields.
fn build_expense(
    user_id: UserID,
    transaction: &RawTransaction,
    instant: i64,
) -> Result<NewExpense, Error> {
    let date = datetime_from_millis(instant).map_err(|error| Error::Validation {
        field: "timestamp",
        reason: error.to_string(),
    })?;

    Ok(NewExpense {
        user_id,
        category: transaction
            .transaction_type
            .clone()
            .unwrap_or_else(|| "unknown".to_owned()),
        amount: transaction.amount,
        description: transaction
            .raw_message
            .clone()
            .or_else(|| transaction.sender.clone()),
        date,
        sender: transaction.sender.clone(),
        counterparty: Some(
            transaction
                .sender_receiver
                .clone()
                .unwrap_or_else(|| "Unknown".to_owned()),
        ),
        external_id: transaction.upi_transaction_id.clone(),
        raw_message: transaction.raw_message.clone(),
    })
}

/// The request body for [sync_expenses_endpoint].
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    /// The batch of raw transactions to reconcile.
    pub transactions: Vec<RawTransaction>,
}

/// The response body for [sync_expenses_endpoint].
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    /// Whether the sync completed.
    pub success: bool,
    /// A human-readable summary of the sync.
    pub message: String,
    /// The detailed outcome.
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// A route handler for syncing a batch of raw transactions.
///
/// Responds with 201 and a [SyncResponse] on success, or 400 if the
/// `transactions` field is missing or not an array.
pub async fn sync_expenses_endpoint(
    State(state): State<crate::AppState>,
    Extension(user_id): Extension<UserID>,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(request) = payload.map_err(|rejection| Error::Validation {
        field: "transactions",
        reason: format!("transactions array is required ({})", rejection.body_text()),
    })?;

    let connection = state.lock_connection()?;
    let outcome = sync_transactions(user_id, &request.transactions, &connection)?;

    tracing::info!(
        "synced {} transactions for user {user_id}: {} new, {} already entered, {} skipped",
        request.transactions.len(),
        outcome.inserted_count,
        outcome.already_entered_count,
        outcome.skipped_count,
    );

    let response = SyncResponse {
        success: true,
        message: format!(
            "{} new transactions saved. {} already existed.",
            outcome.inserted_count, outcome.already_entered_count
        ),
        outcome,
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}
