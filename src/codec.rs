//! Best-effort decoding helpers.
//!
//! JSON and query-string parsing return `None` on failure rather than an
//! error: callers treat unparseable remote bodies as data, not as a reason to
//! abort. Base64 decoding is the exception — a payload that does not decode
//! is fatal upstream ([`FaceplateError::InvalidPayload`]).

use std::collections::HashMap;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value;

use crate::error::FaceplateError;

/// URL-safe base64, tolerant of both padded and unpadded input. The platform
/// emits unpadded bodies but nothing guarantees a proxy has not re-padded.
const URL_SAFE_INDIFFERENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64url string.
pub fn decode_url_safe_base64(input: &str) -> Result<Vec<u8>, FaceplateError> {
    URL_SAFE_INDIFFERENT
        .decode(input)
        .map_err(|_| FaceplateError::InvalidPayload)
}

/// Best-effort JSON parse. `None` means "not JSON"; a legitimate JSON `null`
/// parses to `Some(Value::Null)` and is not confusable with failure.
pub fn try_parse_json(input: &str) -> Option<Value> {
    serde_json::from_str(input).ok()
}

/// Best-effort `key=value&...` parse, for the query-string-encoded bodies the
/// OAuth token endpoints return.
pub fn try_parse_query_string(input: &str) -> Option<HashMap<String, String>> {
    serde_urlencoded::from_str(input).ok()
}
