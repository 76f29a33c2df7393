//! Defines the log-in route handler that verifies credentials and issues an
//! identity token.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use email_address::EmailAddress;
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, Error, auth::issue_token, user::get_user_by_email};

/// The credentials entered during log-in.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// Email entered during log-in.
    pub email: EmailAddress,
    /// Password entered during log-in.
    pub password: String,
}

/// Handler for log-in requests.
///
/// Responds with 200 and `{token, user}` when the credentials match a
/// registered user, otherwise 400. The same error is returned for an
/// unregistered email and a wrong password so that clients cannot probe for
/// registered email addresses.
pub async fn post_log_in(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(credentials) = payload.map_err(|rejection| Error::Validation {
        field: "credentials",
        reason: rejection.body_text(),
    })?;

    let user = {
        let connection = state.lock_connection()?;

        get_user_by_email(&credentials.email, &connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidCredentials,
            other => other,
        })?
    };

    let password_is_correct = user
        .password_hash
        .verify(&credentials.password)
        .map_err(|error| {
            tracing::error!("Error verifying password: {}", error);
            Error::HashingError(error.to_string())
        })?;

    if !password_is_correct {
        return Err(Error::InvalidCredentials);
    }

    let token = issue_token(&user, &state.encoding_key, state.token_duration)?;

    Ok(Json(json!({
        "token": token,
        "user": {
            "id": user.id,
            "email": user.email,
            "name": user.name,
        },
    }))
    .into_response())
}
