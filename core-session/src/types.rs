use chrono::{DateTime, TimeZone, Utc};
use core_runtime::logging::credential_fingerprint;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque bearer credential.
///
/// The token string is never printed: `Debug` and `Display` only show a
/// short fingerprint of the signature segment.
///
/// # Examples
///
/// ```
/// use core_session::Credential;
///
/// let credential = Credential::new("header.payload.signature");
/// assert_eq!(credential.as_str(), "header.payload.signature");
/// assert!(!format!("{:?}", credential).contains("payload"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for attaching to an outgoing request.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Fingerprint safe to put in logs.
    pub fn fingerprint(&self) -> String {
        credential_fingerprint(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.fingerprint()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[credential {}]", self.fingerprint())
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Non-secret user attributes persisted alongside the credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
        }
    }
}

// User ids arrive as either JSON strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

/// A credential together with the profile it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub credential: Credential,
    pub profile: Profile,
}

impl SessionRecord {
    pub fn new(credential: Credential, profile: Profile) -> Self {
        Self {
            credential,
            profile,
        }
    }
}

/// Claims decoded from a credential without verifying its signature.
///
/// Computed on demand for a single decision and never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimSet {
    pub subject: Option<String>,
    pub role: Option<String>,
    /// Issue time, seconds since the Unix epoch
    pub issued_at: Option<i64>,
    /// Expiry, seconds since the Unix epoch
    pub expires_at: i64,
    /// Every other claim in the payload
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClaimSet {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }

    pub fn issued_at_utc(&self) -> Option<DateTime<Utc>> {
        self.issued_at
            .and_then(|issued_at| Utc.timestamp_opt(issued_at, 0).single())
    }
}

/// Freshness of a credential at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// Usable, outside the renewal window
    Valid,
    /// Usable, but inside the renewal window
    NeedsRenewal,
    /// Past expiry, undecodable, or invalidated by the server
    Expired,
}

impl Freshness {
    pub fn is_usable(&self) -> bool {
        !matches!(self, Freshness::Expired)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Valid => write!(f, "valid"),
            Freshness::NeedsRenewal => write!(f, "needs_renewal"),
            Freshness::Expired => write!(f, "expired"),
        }
    }
}

/// Observable session state.
///
/// `Expired` is transient: the next freshness check either renews the
/// credential or collapses the session into `Unauthenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unauthenticated,
    Valid,
    NeedsRenewal,
    Expired,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Valid | SessionState::NeedsRenewal)
    }
}

impl From<Freshness> for SessionState {
    fn from(freshness: Freshness) -> Self {
        match freshness {
            Freshness::Valid => SessionState::Valid,
            Freshness::NeedsRenewal => SessionState::NeedsRenewal,
            Freshness::Expired => SessionState::Expired,
        }
    }
}
