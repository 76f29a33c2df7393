//! Outgo is a small personal-finance tracking REST API.
//!
//! Users sign up, log in, and record expenses, either one at a time or in
//! bulk by syncing SMS-derived transaction data. A monthly report groups
//! debit expenses by calendar month with decimal-exact totals.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod auth;
mod db;
pub mod endpoints;
mod expense;
mod log_in;
mod logging;
mod password;
mod register_user;
mod routing;
mod user;

pub use app_state::AppState;
pub use logging::logging_middleware;
pub use password::PasswordHash;
pub use routing::build_router;
pub use user::{User, UserID};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request body was missing a required field or a field failed
    /// validation.
    ///
    /// The field name and the reason are shown to the client.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// The name of the field that failed validation.
        field: &'static str,
        /// Why the field was rejected.
        reason: String,
    },

    /// The user provided an email and password combination that does not
    /// match a registered user.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The requested resource was not found.
    ///
    /// This error is also returned when the resource exists but belongs to
    /// another user, so that clients cannot probe for the existence of other
    /// users' data.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The email address used to register already belongs to a user.
    #[error("email already registered")]
    DuplicateEmail,

    /// An expense already exists for this user at one of the submitted
    /// transaction timestamps.
    ///
    /// During a sync this usually means a concurrent sync for the same user
    /// won the race between the existing-set read and the bulk insert. The
    /// caller should retry so the pre-filter runs against fresh data.
    #[error("an expense already exists at one of the submitted timestamps")]
    DuplicateTransactionTime,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An unexpected error occurred while signing an identity token.
    #[error("token signing failed: {0}")]
    TokenSigningError(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("expense.user_id") =>
            {
                Error::DuplicateTransactionTime
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status_code, message) = match &self {
            Error::Validation { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::InvalidCredentials => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::NotFound => (StatusCode::NOT_FOUND, "not found".to_owned()),
            Error::DuplicateEmail => (StatusCode::CONFLICT, self.to_string()),
            Error::DuplicateTransactionTime => (
                StatusCode::CONFLICT,
                "an expense already exists at one of the submitted timestamps, \
                retry the sync to get a fresh view of the stored expenses"
                    .to_owned(),
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}
