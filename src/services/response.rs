//! HTTP response building helpers
//!
//! Provides a consistent API for building JSON responses across all handlers.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::TrailError;

/// Result type alias for handlers
pub type HandlerResult = Result<Response<Full<Bytes>>, TrailError>;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// Build an empty response with 204 No Content status
pub fn no_content() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

/// Build a 404 Not Found response with message
pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::NOT_FOUND, message)
}

/// Build a 405 Method Not Allowed response
pub fn method_not_allowed() -> Response<Full<Bytes>> {
    error_body(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

fn error_body(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        &serde_json::json!({ "statusCode": status.as_u16(), "message": message }),
    )
}

/// Convert a TrailError to an appropriate HTTP response
pub fn error_response(error: TrailError) -> Response<Full<Bytes>> {
    let (status, message) = match &error {
        TrailError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        TrailError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        TrailError::Validation(errors) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &serde_json::json!({
                    "statusCode": 400,
                    "message": "Validation failed",
                    "errors": errors,
                }),
            );
        }
        TrailError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        TrailError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        TrailError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        TrailError::Json(e) => (StatusCode::BAD_REQUEST, format!("Malformed JSON body: {}", e)),
        _ => {
            error!(error = %error, "Request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        }
    };

    error_body(status, &message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;

    #[test]
    fn test_ok_response() {
        let resp = ok(&serde_json::json!({"test": true}));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(error_response(TrailError::NotFound("x".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(error_response(TrailError::InvalidInput("x".into())).status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_response(TrailError::Conflict("x".into())).status(), StatusCode::CONFLICT);
        assert_eq!(error_response(TrailError::Unauthorized("x".into())).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_response(TrailError::Forbidden("x".into())).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            error_response(TrailError::Internal("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_error_is_bad_request() {
        let resp = error_response(TrailError::Validation(vec![FieldError::new("email", "invalid")]));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_no_content_has_empty_body() {
        let resp = no_content();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(resp.headers().get(header::CONTENT_TYPE).is_none());
    }
}
