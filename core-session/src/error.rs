use bridge_traits::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by session operations.
///
/// Renewal failures never appear here: [`ensure_fresh`] reports them as
/// `false` plus a cleared store.
///
/// [`ensure_fresh`]: crate::renewal::RenewalCoordinator::ensure_fresh
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Request was rejected as unauthenticated after renewing the credential")]
    AuthFailureAtRequestTime,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Failed to serialize {context}: {source}")]
    SerializationFailed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Request failed: {0}")]
    Http(#[from] BridgeError),
}

/// Why a credential could not be decoded into a claim set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed credential: {0}")]
    Malformed(String),

    #[error("Credential payload is not valid base64url: {0}")]
    Base64(String),

    #[error("Credential payload is not a JSON object: {0}")]
    Payload(String),

    #[error("Credential carries no expiry claim")]
    MissingExpiry,
}

/// Why a renewal attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenewalError {
    /// Transient transport failure, including timeouts and 5xx answers.
    #[error("Renewal network error: {0}")]
    Network(String),

    /// The server explicitly refused to renew the credential.
    #[error("Renewal rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The server answered with a credential that cannot be used.
    #[error("Renewed credential is unusable: {0}")]
    Unusable(String),
}

impl RenewalError {
    pub(crate) fn timed_out(after: Duration) -> Self {
        RenewalError::Network(format!("timed out after {}s", after.as_secs()))
    }

    /// `true` when the server refused the renewal.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RenewalError::Rejected { .. })
    }
}

/// Invalid session timing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Renewal window ({window:?}) must be shorter than the credential lifetime ({lifetime:?})")]
    WindowNotShorterThanLifetime { window: Duration, lifetime: Duration },

    #[error("Renewal window must be greater than zero")]
    ZeroWindow,

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
