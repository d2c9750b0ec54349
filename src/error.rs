//! Error types with Axum response mapping.
//!
//! Decode/verify failures are hard stops in the resolution chain; remote-call
//! failures are normalized into [`ApiError`], an explicit struct with the
//! known platform fields plus the raw error payload.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum FaceplateError {
    /// The signed-request string did not contain a `signature.payload` pair.
    #[error("malformed signed request")]
    MalformedSignedRequest,

    /// The payload was not valid base64url or did not decode to JSON.
    #[error("invalid signed request payload")]
    InvalidPayload,

    #[error("unknown algorithm, expected HMAC-SHA256")]
    UnsupportedAlgorithm,

    #[error("bad signature")]
    BadSignature,

    #[error("no oauth token and no code to get one")]
    MissingAuthorizationCode,

    /// The authorization-code or client-credentials exchange was rejected.
    /// Carries the platform's error body and the `user_id` being exchanged.
    #[error("token exchange failed")]
    TokenExchangeFailed {
        body: Value,
        user_id: Option<String>,
    },

    #[error(transparent)]
    RemoteApi(#[from] ApiError),

    #[error("transport error: {0}")]
    Transport(String),

    /// A handler asked for a [`Session`](crate::Session) extractor but the
    /// middleware was never installed.
    #[error("faceplate middleware not configured")]
    MiddlewareNotConfigured,
}

/// A normalized Graph/FQL API error.
///
/// `kind`, `message`, `code` and `error_subcode` are lifted from the
/// platform's `{error: ...}` object where present; `raw` always holds the
/// original error value untouched.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: String,
    pub message: String,
    pub code: Option<i64>,
    pub error_subcode: Option<i64>,
    pub raw: Value,
}

impl ApiError {
    /// Build from the `error` field of a Graph API response.
    pub fn from_graph(error: Value) -> Self {
        Self {
            kind: field_str(&error, "type").unwrap_or_else(|| "FacebookApiError".into()),
            message: field_str(&error, "message").unwrap_or_else(|| "unknown error".into()),
            code: error.get("code").and_then(Value::as_i64),
            error_subcode: error.get("error_subcode").and_then(Value::as_i64),
            raw: error,
        }
    }

    /// Build from a legacy REST (FQL) error response, which is flat:
    /// `{error_code, error_msg, ...}`. The whole response is kept in `raw`.
    pub fn from_fql(response: Value) -> Self {
        Self {
            kind: "FqlError".into(),
            message: field_str(&response, "error_msg").unwrap_or_else(|| "unknown error".into()),
            code: response.get("error_code").and_then(Value::as_i64),
            error_subcode: None,
            raw: response,
        }
    }

    /// Build from a response body that was not JSON at all.
    pub fn from_text(status: StatusCode, body: String) -> Self {
        Self {
            kind: "HttpError".into(),
            message: format!("unexpected response (HTTP {})", status.as_u16()),
            code: Some(i64::from(status.as_u16())),
            error_subcode: None,
            raw: Value::String(body),
        }
    }
}

fn field_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

impl IntoResponse for FaceplateError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            FaceplateError::MalformedSignedRequest
            | FaceplateError::InvalidPayload
            | FaceplateError::UnsupportedAlgorithm
            | FaceplateError::MissingAuthorizationCode => (
                StatusCode::BAD_REQUEST,
                json!({"error": self.to_string()}),
            ),
            FaceplateError::BadSignature => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "bad signature"}),
            ),
            FaceplateError::TokenExchangeFailed { body, user_id } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "token exchange failed",
                    "detail": body,
                    "user_id": user_id,
                }),
            ),
            FaceplateError::RemoteApi(err) => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": err.message,
                    "type": err.kind,
                    "code": err.code,
                }),
            ),
            FaceplateError::Transport(msg) => (
                StatusCode::BAD_GATEWAY,
                json!({"error": msg}),
            ),
            FaceplateError::MiddlewareNotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": self.to_string()}),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_graph() {
        let err = ApiError::from_graph(json!({
            "type": "OAuthException",
            "message": "Invalid OAuth access token.",
            "code": 190,
            "error_subcode": 463
        }));
        assert_eq!(err.kind, "OAuthException");
        assert_eq!(err.message, "Invalid OAuth access token.");
        assert_eq!(err.code, Some(190));
        assert_eq!(err.error_subcode, Some(463));
        assert_eq!(err.raw["code"], 190);
    }

    #[test]
    fn test_api_error_from_graph_missing_fields() {
        let err = ApiError::from_graph(json!({"message": "x"}));
        assert_eq!(err.kind, "FacebookApiError");
        assert_eq!(err.message, "x");
        assert!(err.code.is_none());
    }

    #[test]
    fn test_api_error_from_fql_keeps_raw_response() {
        let response = json!({"error_code": 601, "error_msg": "Parser error"});
        let err = ApiError::from_fql(response.clone());
        assert_eq!(err.kind, "FqlError");
        assert_eq!(err.code, Some(601));
        assert_eq!(err.message, "Parser error");
        assert_eq!(err.raw, response);
    }

    #[test]
    fn test_display() {
        let err = ApiError::from_graph(json!({"type": "OAuthException", "message": "nope"}));
        assert_eq!(err.to_string(), "OAuthException: nope");
        let wrapped = FaceplateError::RemoteApi(err);
        assert_eq!(wrapped.to_string(), "OAuthException: nope");
    }

    #[test]
    fn test_bad_signature_maps_to_unauthorized() {
        let resp = FaceplateError::BadSignature.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_remote_api_maps_to_bad_gateway() {
        let err = ApiError::from_graph(json!({"message": "x", "code": 1}));
        let resp = FaceplateError::RemoteApi(err).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
