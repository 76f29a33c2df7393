//! Bearer-token authentication: issuing identity tokens at log-in and
//! verifying them on protected routes.

mod middleware;
mod token;

pub use middleware::auth_guard;
pub use token::{DEFAULT_TOKEN_DURATION, issue_token, verify_token};
