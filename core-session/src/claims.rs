//! Claims Reader
//!
//! Decodes the payload segment of a three-part bearer credential into a
//! [`ClaimSet`]. The signature is never checked: the result is a freshness
//! hint for the client, not proof of anything. The server remains the
//! authority on whether a credential is accepted.

use crate::error::DecodeError;
use crate::types::ClaimSet;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::{Map, Value};

/// base64url with optional padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode the claims carried by `token`.
///
/// # Errors
///
/// - [`DecodeError::Malformed`] unless the token has exactly three
///   non-empty dot-separated segments
/// - [`DecodeError::Base64`] if the payload segment is not base64url
/// - [`DecodeError::Payload`] if the payload is not a JSON object
/// - [`DecodeError::MissingExpiry`] if `exp` is absent or not numeric
///
/// # Examples
///
/// ```
/// use core_session::claims::decode;
/// use core_session::DecodeError;
///
/// // {"sub":"42","exp":1700000000}
/// let token = "e30.eyJzdWIiOiI0MiIsImV4cCI6MTcwMDAwMDAwMH0.sig";
/// let claims = decode(token).unwrap();
/// assert_eq!(claims.subject.as_deref(), Some("42"));
/// assert_eq!(claims.expires_at, 1_700_000_000);
///
/// assert!(decode("not.a.jwt").is_err());
/// assert!(matches!(decode("only-one-part"), Err(DecodeError::Malformed(_))));
/// ```
pub fn decode(token: &str) -> Result<ClaimSet, DecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(DecodeError::Malformed("empty segment".to_string()));
    }

    // Tolerate tokens encoded with the standard alphabet.
    let payload = segments[1].replace('+', "-").replace('/', "_");
    let bytes = PAYLOAD_ENGINE
        .decode(payload.as_bytes())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Payload(e.to_string()))?;
    let Value::Object(mut claims) = value else {
        return Err(DecodeError::Payload("payload is not an object".to_string()));
    };

    let expires_at = claims
        .remove("exp")
        .as_ref()
        .and_then(numeric_seconds)
        .ok_or(DecodeError::MissingExpiry)?;

    let subject = claims
        .remove("sub")
        .as_ref()
        .and_then(identifier)
        .or_else(|| claims.get("id").and_then(identifier));
    let role = match claims.remove("role") {
        Some(Value::String(role)) => Some(role),
        Some(other) => {
            claims.insert("role".to_string(), other);
            None
        }
        None => None,
    };
    let issued_at = claims.remove("iat").as_ref().and_then(numeric_seconds);

    Ok(ClaimSet {
        subject,
        role,
        issued_at,
        expires_at,
        extra: claims,
    })
}

/// Decode, discarding the reason. Undecodable credentials are treated as
/// expired, so most callers only care whether claims exist.
pub fn try_decode(token: &str) -> Option<ClaimSet> {
    decode(token).ok()
}

// Whole seconds; fractional timestamps are truncated.
fn numeric_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        _ => None,
    }
}

fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Build an unsigned token around `claims`. Intended for tests and local
/// tooling; the signature segment is a fixed placeholder.
pub fn encode_unsigned(claims: &Map<String, Value>) -> String {
    let header = PAYLOAD_ENGINE.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = PAYLOAD_ENGINE.encode(Value::Object(claims.clone()).to_string());
    format!("{}.{}.unsigned", header, payload)
}
