//! # Session Configuration
//!
//! Builder-based configuration for the session lifecycle core.
//!
//! ## Overview
//!
//! [`SessionConfig`] carries the two timing settings that drive freshness
//! decisions plus the injected platform bridges:
//!
//! - `lifetime` - how long an issued credential is valid (default 7 days)
//! - `renewal_window` - how long before expiry renewal begins (default 1 day)
//! - `SecureStore` - required; persists the credential between launches
//! - `HttpClient` - required; carries renewal calls and wrapped requests
//!
//! When the `desktop-shims` feature is enabled, `KeyringSecureStore` and
//! `ReqwestHttpClient` from `bridge-desktop` are injected if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SessionConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = SessionConfig::builder()
//!     .lifetime(Duration::from_secs(7 * 86_400))
//!     .renewal_window_str("12h")?
//!     .secure_store(Arc::new(MySecureStore))
//!     .http_client(Arc::new(MyHttpClient))
//!     .build()?;
//! ```
//!
//! ## Environment
//!
//! [`SessionConfigBuilder::from_env`] reads `SESSION_LIFETIME` and
//! `SESSION_RENEWAL_WINDOW` using the compact duration syntax accepted by
//! [`parse_duration`] (`"7d"`, `"12h"`, `"30m"`, `"45s"`).

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, SecureStore};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable overriding the credential lifetime.
pub const ENV_LIFETIME: &str = "SESSION_LIFETIME";
/// Environment variable overriding the renewal window.
pub const ENV_RENEWAL_WINDOW: &str = "SESSION_RENEWAL_WINDOW";

pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_RENEWAL_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the session lifecycle core.
///
/// Use [`SessionConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct SessionConfig {
    /// Validity of a freshly issued credential.
    pub lifetime: Duration,

    /// Interval before expiry during which the credential is renewed.
    /// Always strictly shorter than `lifetime`.
    pub renewal_window: Duration,

    /// Secure credential storage
    pub secure_store: Arc<dyn SecureStore>,

    /// HTTP client for renewal calls and wrapped requests
    pub http_client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("lifetime", &self.lifetime)
            .field("renewal_window", &self.renewal_window)
            .field("secure_store", &"SecureStore { ... }")
            .field("http_client", &"HttpClient { ... }")
            .finish()
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Validates timing settings.
    ///
    /// Both durations must be non-zero and `renewal_window < lifetime`.
    pub fn validate(&self) -> Result<()> {
        validate_timing(self.lifetime, self.renewal_window)
    }
}

fn validate_timing(lifetime: Duration, renewal_window: Duration) -> Result<()> {
    if lifetime.is_zero() {
        return Err(Error::Config(
            "Credential lifetime must be greater than zero".to_string(),
        ));
    }
    if renewal_window.is_zero() {
        return Err(Error::Config(
            "Renewal window must be greater than zero".to_string(),
        ));
    }
    if renewal_window >= lifetime {
        return Err(Error::Config(format!(
            "Renewal window ({}s) must be shorter than the credential lifetime ({}s)",
            renewal_window.as_secs(),
            lifetime.as_secs()
        )));
    }
    Ok(())
}

/// Parses a compact duration string.
///
/// Accepts a positive integer followed by one unit suffix: `d`, `h`, `m`
/// or `s`. A bare integer is read as seconds.
///
/// ```
/// use core_runtime::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("12h").unwrap(), Duration::from_secs(12 * 3600));
/// assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
/// assert!(parse_duration("soon").is_err());
/// ```
pub fn parse_duration(value: &str) -> Result<Duration> {
    let invalid = |reason: &str| Error::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty value"));
    }

    let (digits, multiplier) = match trimmed.char_indices().last() {
        Some((idx, 'd')) => (&trimmed[..idx], 86_400),
        Some((idx, 'h')) => (&trimmed[..idx], 3_600),
        Some((idx, 'm')) => (&trimmed[..idx], 60),
        Some((idx, 's')) => (&trimmed[..idx], 1),
        Some((_, c)) if c.is_ascii_digit() => (trimmed, 1),
        _ => return Err(invalid("unknown unit, expected one of d, h, m, s")),
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| invalid("expected a whole number before the unit"))?;
    let seconds = amount
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("duration overflows"))?;

    Ok(Duration::from_secs(seconds))
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for credential persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore. \
                 Mobile: inject platform-native secure storage (Keychain/Keystore). \
                 Web: inject WebCrypto-based secure storage."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for credential renewal. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Otherwise inject the host's HTTP stack."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

/// Builder for [`SessionConfig`].
#[derive(Default)]
pub struct SessionConfigBuilder {
    lifetime: Option<Duration>,
    renewal_window: Option<Duration>,
    secure_store: Option<Arc<dyn SecureStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl SessionConfigBuilder {
    /// Seeds the timing settings from `SESSION_LIFETIME` and
    /// `SESSION_RENEWAL_WINDOW`. Unset variables keep the defaults; a set
    /// but unparsable variable is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::default();
        if let Some(value) = lookup(ENV_LIFETIME) {
            builder.lifetime = Some(parse_duration(&value)?);
        }
        if let Some(value) = lookup(ENV_RENEWAL_WINDOW) {
            builder.renewal_window = Some(parse_duration(&value)?);
        }
        Ok(builder)
    }

    /// Sets the credential lifetime.
    ///
    /// Default: 7 days
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Sets the credential lifetime from a compact string such as `"7d"`.
    pub fn lifetime_str(self, value: &str) -> Result<Self> {
        Ok(self.lifetime(parse_duration(value)?))
    }

    /// Sets the renewal window.
    ///
    /// Default: 1 day
    pub fn renewal_window(mut self, window: Duration) -> Self {
        self.renewal_window = Some(window);
        self
    }

    /// Sets the renewal window from a compact string such as `"12h"`.
    pub fn renewal_window_str(self, value: &str) -> Result<Self> {
        Ok(self.renewal_window(parse_duration(value)?))
    }

    /// Sets the secure store implementation (required unless the
    /// `desktop-shims` feature provides one).
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Sets the HTTP client implementation (required unless the
    /// `desktop-shims` feature provides one).
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the final [`SessionConfig`].
    ///
    /// Fails with [`Error::CapabilityMissing`] when a bridge is missing and
    /// no default is available, or [`Error::Config`] when the timing
    /// settings are inconsistent.
    pub fn build(self) -> Result<SessionConfig> {
        let lifetime = self.lifetime.unwrap_or(DEFAULT_LIFETIME);
        let renewal_window = self.renewal_window.unwrap_or(DEFAULT_RENEWAL_WINDOW);
        validate_timing(lifetime, renewal_window)?;

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        Ok(SessionConfig {
            lifetime,
            renewal_window,
            secure_store,
            http_client,
        })
    }
}
