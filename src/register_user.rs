//! Defines the route handler for registering a new user.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use email_address::EmailAddress;
use serde::Deserialize;

use crate::{AppState, Error, PasswordHash, user::create_user};

/// The request body for registering a new user.
///
/// The client submits an already-hashed password; the server never sees the
/// plaintext at sign-up.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    /// The new user's display name.
    pub name: String,
    /// The new user's email address.
    pub email: EmailAddress,
    /// The new user's password hash.
    pub password_hash: String,
}

/// Handler for user registration requests.
///
/// Responds with 201 and the created user on success, 400 for a malformed
/// body and 409 when the email is already registered.
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUser>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(register) = payload.map_err(|rejection| Error::Validation {
        field: "user",
        reason: rejection.body_text(),
    })?;

    if register.name.trim().is_empty() {
        return Err(Error::Validation {
            field: "name",
            reason: "must not be empty".to_owned(),
        });
    }

    if register.password_hash.is_empty() {
        return Err(Error::Validation {
            field: "passwordHash",
            reason: "must not be empty".to_owned(),
        });
    }

    let connection = state.lock_connection()?;
    let user = create_user(
        &register.name,
        &register.email,
        PasswordHash::new_unchecked(&register.password_hash),
        &connection,
    )?;

    tracing::info!("registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(user)).into_response())
}
