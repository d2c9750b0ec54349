//! HMAC-SHA256 signing and verification for signed requests.
//!
//! The platform signs the *encoded* payload and transmits the digest
//! base64url-encoded with padding stripped. Verification recomputes the
//! digest and compares the encoded forms in constant time.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected signature for an encoded payload.
///
/// Equivalent to base64-encoding the digest and applying the platform's
/// substitutions (`+`→`-`, `/`→`_`, trailing `=` stripped). All padding is
/// stripped; for a 32-byte digest this matches the platform's output exactly.
pub fn sign(secret: &str, encoded_body: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is always valid");
    mac.update(encoded_body.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Check a supplied signature against the encoded payload.
pub fn verify(signature: &str, encoded_body: &str, secret: &str) -> bool {
    let expected = sign(secret, encoded_body);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
