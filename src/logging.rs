//! Middleware for logging requests and responses.

use axum::{
    extract::Request,
    http::{HeaderMap, header::CONTENT_TYPE},
    middleware::Next,
    response::Response,
};

/// The maximum number of body bytes written to the info-level log.
///
/// Longer bodies are truncated and logged in full at the `debug` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// The JSON fields whose values are replaced before a request body is logged.
const SECRET_FIELDS: [&str; 2] = ["password", "passwordHash"];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level. Password
/// fields in JSON request bodies are redacted before logging.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (headers, body_text) = extract_header_and_body_text_from_request(request).await;

    if is_json_content_type(&headers.headers) {
        log_request(&headers, &redact_secrets(&body_text));
    } else {
        log_request(&headers, &body_text);
    }

    let request = Request::from_parts(headers, body_text.into());
    let response = next.run(request).await;

    let (headers, body_text) = extract_header_and_body_text_from_response(response).await;
    log_response(&headers, &body_text);

    Response::from_parts(headers, body_text.into())
}

/// Check whether the Content-Type header names JSON.
///
/// Only the media type is compared, so parameters such as
/// `; charset=utf-8` do not prevent redaction.
fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
}

/// Cut `body` at the log length limit without splitting a multi-byte
/// character.
fn truncate_for_log(body: &str) -> &str {
    let mut end = LOG_BODY_LENGTH_LIMIT.min(body.len());

    while !body.is_char_boundary(end) {
        end -= 1;
    }

    &body[..end]
}

/// Replace the values of password fields in a JSON object with asterisks.
///
/// Bodies that do not parse as JSON are returned unchanged.
fn redact_secrets(body_text: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(body_text) else {
        return body_text.to_owned();
    };

    if let Some(object) = value.as_object_mut() {
        for field_name in SECRET_FIELDS {
            if let Some(entry) = object.get_mut(field_name) {
                *entry = serde_json::Value::String("********".to_owned());
            }
        }
    }

    value.to_string()
}

async fn extract_header_and_body_text_from_request(
    request: Request,
) -> (axum::http::request::Parts, String) {
    let (headers, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    (headers, String::from_utf8_lossy(&body_bytes).to_string())
}

async fn extract_header_and_body_text_from_response(
    response: Response,
) -> (axum::http::response::Parts, String) {
    let (headers, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    (headers, String::from_utf8_lossy(&body_bytes).to_string())
}

fn log_request(headers: &axum::http::request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {headers:#?}\nbody: {:}...",
            truncate_for_log(body)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!("Received request: {headers:#?}\nbody: {body:?}");
    }
}

fn log_response(headers: &axum::http::response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {headers:#?}\nbody: {:}...",
            truncate_for_log(body)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {headers:#?}\nbody: {body:?}");
    }
}

#[cfg(test)]
mod logging_tests {
    use axum::http::{HeaderMap, header::CONTENT_TYPE};

    use super::{LOG_BODY_LENGTH_LIMIT, is_json_content_type, redact_secrets, truncate_for_log};

    #[test]
    fn redacts_password_fields() {
        let body = r#"{"email":"test@example.com","password":"hunter2"}"#;

        let redacted = redact_secrets(body);

        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains("test@example.com"));
        assert!(redacted.contains("********"));
    }

    #[test]
    fn redacts_password_hash_fields() {
        let body = r#"{"name":"Test","passwordHash":"$2b$12$secret"}"#;

        let redacted = redact_secrets(body);

        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("Test"));
    }

    #[test]
    fn leaves_non_json_bodies_unchanged() {
        let body = "not json";

        assert_eq!(redact_secrets(body), body);
    }

    #[test]
    fn leaves_bodies_without_secrets_unchanged() {
        let body = r#"{"category":"debit","amount":49.5}"#;

        let redacted = redact_secrets(body);

        assert!(redacted.contains("debit"));
        assert!(!redacted.contains("********"));
    }

    #[test]
    fn truncation_stops_at_multibyte_char_boundaries() {
        // The limit falls inside the three-byte rupee sign.
        let body = format!("{}₹500 debited from a/c", "a".repeat(63));

        assert_eq!(truncate_for_log(&body), "a".repeat(63));
    }

    #[test]
    fn truncation_uses_the_full_limit_for_ascii() {
        let body = "a".repeat(100);

        assert_eq!(truncate_for_log(&body).len(), LOG_BODY_LENGTH_LIMIT);
    }

    #[test]
    fn short_bodies_are_not_truncated() {
        assert_eq!(truncate_for_log("short"), "short");
    }

    #[test]
    fn json_content_type_with_parameters_is_recognized() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            "application/json; charset=utf-8".parse().unwrap(),
        );

        assert!(is_json_content_type(&headers));
    }

    #[test]
    fn bare_json_content_type_is_recognized() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());

        assert!(is_json_content_type(&headers));
    }

    #[test]
    fn non_json_content_type_is_not_recognized() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/plain".parse().unwrap());

        assert!(!is_json_content_type(&headers));
        assert!(!is_json_content_type(&HeaderMap::new()));
    }
}
