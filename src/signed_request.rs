//! Signed-request decoding and token resolution.
//!
//! A signed request is `signature.base64url(json)`. Resolution decodes and
//! verifies the payload, then decides whether a token exchange is needed:
//! payloads without a `user_id` are anonymous, payloads that already carry a
//! token are used as-is, and payloads with only an authorization `code` are
//! exchanged against the OAuth token endpoint.
//!
//! The algorithm and signature checks are hard stops: a payload with an
//! unknown algorithm is never compared against a signature, and a payload
//! with a bad signature never reaches the network.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{decode_url_safe_base64, try_parse_json, try_parse_query_string};
use crate::config::FaceplateConfig;
use crate::error::FaceplateError;
use crate::signature::verify;

const EXPECTED_ALGORITHM: &str = "HMAC-SHA256";

/// Decoded signed-request payload.
///
/// Platform-defined fields beyond the ones resolution cares about are carried
/// through opaquely in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignedRequestPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl SignedRequestPayload {
    /// The usable bearer token, if the payload carries one.
    pub fn token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .or(self.oauth_token.as_deref())
    }
}

/// Decode, verify and resolve a signed request to a payload, performing the
/// authorization-code exchange when the payload carries a `code` but no token.
pub async fn resolve(
    http: &reqwest::Client,
    config: &FaceplateConfig,
    signed_request: &str,
) -> Result<SignedRequestPayload, FaceplateError> {
    let (sig, encoded_body) = signed_request
        .split_once('.')
        .ok_or(FaceplateError::MalformedSignedRequest)?;
    if sig.is_empty() || encoded_body.is_empty() {
        return Err(FaceplateError::MalformedSignedRequest);
    }

    let json = decode_url_safe_base64(encoded_body)?;
    let json = String::from_utf8(json).map_err(|_| FaceplateError::InvalidPayload)?;
    let payload: SignedRequestPayload =
        serde_json::from_str(&json).map_err(|_| FaceplateError::InvalidPayload)?;

    // Algorithm check comes first and stops hard: never compare signatures
    // for an algorithm we don't implement.
    match payload.algorithm.as_deref() {
        Some(alg) if alg.eq_ignore_ascii_case(EXPECTED_ALGORITHM) => {}
        _ => return Err(FaceplateError::UnsupportedAlgorithm),
    }

    // The signature covers the still-encoded body.
    if !verify(sig, encoded_body, &config.secret) {
        return Err(FaceplateError::BadSignature);
    }

    // Not logged in or not authorized: succeed with the payload as-is.
    let Some(user_id) = payload.user_id.clone() else {
        tracing::debug!("signed request verified without user_id (anonymous)");
        return Ok(payload);
    };

    // Already carries a usable token.
    if payload.token().is_some() {
        return Ok(payload);
    }

    let Some(code) = payload.code.clone() else {
        return Err(FaceplateError::MissingAuthorizationCode);
    };

    exchange_code(http, config, payload, &user_id, &code).await
}

/// Exchange an OAuth authorization code for an access token and merge the
/// result into the payload.
async fn exchange_code(
    http: &reqwest::Client,
    config: &FaceplateConfig,
    mut payload: SignedRequestPayload,
    user_id: &str,
    code: &str,
) -> Result<SignedRequestPayload, FaceplateError> {
    let resp = http
        .get(config.token_url())
        .query(&[
            ("client_id", config.app_id.as_str()),
            ("client_secret", config.secret.as_str()),
            ("redirect_uri", ""),
            ("code", code),
        ])
        .send()
        .await
        .map_err(|e| FaceplateError::Transport(e.to_string()))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| FaceplateError::Transport(e.to_string()))?;

    if !status.is_success() {
        let body = try_parse_json(&text).unwrap_or(Value::String(text));
        tracing::warn!(user_id, %status, "authorization code exchange rejected");
        return Err(FaceplateError::TokenExchangeFailed {
            body,
            user_id: Some(user_id.to_string()),
        });
    }

    // Success bodies are query-string encoded: `access_token=...&expires=...`
    let mut fields = try_parse_query_string(&text).unwrap_or_default();
    let Some(token) = fields.remove("access_token") else {
        return Err(FaceplateError::TokenExchangeFailed {
            body: Value::String(text),
            user_id: Some(user_id.to_string()),
        });
    };

    payload.access_token = Some(token);
    for (key, value) in fields {
        payload.extra.insert(key, Value::String(value));
    }
    Ok(payload)
}
