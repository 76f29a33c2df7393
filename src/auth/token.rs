//! Defines the identity token issued at log-in and carried as a bearer token.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, User, UserID};

/// The duration for which an identity token is valid.
pub const DEFAULT_TOKEN_DURATION: Duration = Duration::hours(1);

/// The claims carried by an identity token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// The ID of the authenticated user.
    sub: i64,
    /// The email address of the authenticated user.
    email: String,
    /// When the token expires, as a unix timestamp in seconds.
    exp: i64,
}

/// Sign an identity token for `user` that expires after `duration`.
///
/// # Errors
/// Returns [Error::TokenSigningError] if the token could not be signed.
pub fn issue_token(
    user: &User,
    encoding_key: &EncodingKey,
    duration: Duration,
) -> Result<String, Error> {
    let claims = Claims {
        sub: user.id.as_i64(),
        email: user.email.to_string(),
        exp: (OffsetDateTime::now_utc() + duration).unix_timestamp(),
    };

    jsonwebtoken::encode(&Header::default(), &claims, encoding_key)
        .map_err(|error| Error::TokenSigningError(error.to_string()))
}

/// Verify the signature and expiry of an identity token and extract the user
/// ID it was issued for.
///
/// # Errors
/// Returns [Error::InvalidCredentials] if the token is malformed, has an
/// invalid signature or has expired. The underlying reason is deliberately
/// not surfaced to avoid giving clients an oracle.
pub fn verify_token(token: &str, decoding_key: &DecodingKey) -> Result<UserID, Error> {
    jsonwebtoken::decode::<Claims>(token, decoding_key, &Validation::default())
        .map(|data| UserID::new(data.claims.sub))
        .map_err(|_| Error::InvalidCredentials)
}
