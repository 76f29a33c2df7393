//! Defines the JSON route handlers for creating, reading, updating and
//! deleting individual expenses.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    AppState, Error, UserID,
    expense::core::{
        ExpenseChanges, ExpenseId, NewExpense, create_expense, delete_expense, get_expense,
        get_expenses, update_expense,
    },
};

/// The request body for creating an expense manually.
#[derive(Debug, Deserialize)]
pub struct CreateExpenseBody {
    /// A free-text category label, conventionally "debit", "credit" or
    /// "unknown".
    pub category: String,
    /// The signed monetary amount of the transaction.
    pub amount: Decimal,
    /// A text description of the transaction.
    #[serde(default)]
    pub description: Option<String>,
}

/// A route handler for creating a single expense.
///
/// The transaction date defaults to the current time; synced transactions
/// carry their own timestamps, manual entries are dated when they are
/// recorded.
pub async fn create_expense_endpoint(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserID>,
    payload: Result<Json<CreateExpenseBody>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(body) = payload.map_err(|rejection| Error::Validation {
        field: "expense",
        reason: rejection.body_text(),
    })?;

    if body.category.is_empty() {
        return Err(Error::Validation {
            field: "category",
            reason: "must not be empty".to_owned(),
        });
    }

    let connection = state.lock_connection()?;
    let expense = create_expense(
        NewExpense {
            user_id,
            category: body.category,
            amount: body.amount,
            description: body.description,
            date: OffsetDateTime::now_utc(),
            sender: None,
            counterparty: None,
            external_id: None,
            raw_message: None,
        },
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(expense)).into_response())
}

/// A route handler for listing the caller's expenses, most recent
/// transaction date first.
pub async fn get_expenses_endpoint(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    let expenses = get_expenses(user_id, &connection)?;

    Ok(Json(expenses).into_response())
}

/// A route handler for fetching a single expense by ID.
pub async fn get_expense_endpoint(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserID>,
    Path(expense_id): Path<ExpenseId>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    let expense = get_expense(expense_id, user_id, &connection)?;

    Ok(Json(expense).into_response())
}

/// A route handler for updating an expense.
///
/// The body may contain any subset of the updatable fields; omitted fields
/// keep their stored values.
pub async fn update_expense_endpoint(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserID>,
    Path(expense_id): Path<ExpenseId>,
    payload: Result<Json<ExpenseChanges>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(changes) = payload.map_err(|rejection| Error::Validation {
        field: "expense",
        reason: rejection.body_text(),
    })?;

    let connection = state.lock_connection()?;
    let expense = update_expense(expense_id, user_id, changes, &connection)?;

    Ok(Json(expense).into_response())
}

/// A route handler for deleting an expense.
pub async fn delete_expense_endpoint(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserID>,
    Path(expense_id): Path<ExpenseId>,
) -> Result<Response, Error> {
    let connection = state.lock_connection()?;
    delete_expense(expense_id, user_id, &connection)?;

    Ok(Json(json!({ "message": "Expense deleted successfully" })).into_response())
}
