//! Expiry Policy
//!
//! Pure classification of a claim set against the current time.

use crate::claims;
use crate::error::ConfigError;
use crate::types::{ClaimSet, Freshness};
use chrono::{DateTime, Utc};
use core_runtime::config::SessionConfig;
use std::time::Duration;

/// Decides whether a credential is valid, due for renewal, or expired.
///
/// ```text
///                       expires_at - window          expires_at
///  ─────────── Valid ──────────┼──── NeedsRenewal ────────┼──── Expired ───>
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    lifetime: Duration,
    renewal_window: Duration,
}

impl ExpiryPolicy {
    /// Creates a policy, rejecting a renewal window that is zero or not
    /// strictly shorter than the credential lifetime.
    pub fn new(lifetime: Duration, renewal_window: Duration) -> Result<Self, ConfigError> {
        if renewal_window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        if renewal_window >= lifetime {
            return Err(ConfigError::WindowNotShorterThanLifetime {
                window: renewal_window,
                lifetime,
            });
        }
        Ok(Self {
            lifetime,
            renewal_window,
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        Self::new(config.lifetime, config.renewal_window)
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn renewal_window(&self) -> Duration {
        self.renewal_window
    }

    /// Classifies `claims` at `now`. Missing claims are always `Expired`.
    pub fn classify(&self, claims: Option<&ClaimSet>, now: DateTime<Utc>) -> Freshness {
        let Some(claims) = claims else {
            return Freshness::Expired;
        };

        let now = now.timestamp();
        let window = i64::try_from(self.renewal_window.as_secs()).unwrap_or(i64::MAX);

        if now >= claims.expires_at {
            Freshness::Expired
        } else if now >= claims.expires_at.saturating_sub(window) {
            Freshness::NeedsRenewal
        } else {
            Freshness::Valid
        }
    }

    /// Decodes `token` and classifies the result.
    pub fn classify_token(&self, token: &str, now: DateTime<Utc>) -> Freshness {
        self.classify(claims::try_decode(token).as_ref(), now)
    }

    /// Time left until the credential enters the renewal window, or `None`
    /// once it is already inside it.
    pub fn time_until_renewal(&self, claims: &ClaimSet, now: DateTime<Utc>) -> Option<Duration> {
        let window = i64::try_from(self.renewal_window.as_secs()).unwrap_or(i64::MAX);
        let renew_at = claims.expires_at.saturating_sub(window);
        let remaining = renew_at.checked_sub(now.timestamp())?;
        u64::try_from(remaining)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            lifetime: core_runtime::config::DEFAULT_LIFETIME,
            renewal_window: core_runtime::config::DEFAULT_RENEWAL_WINDOW,
        }
    }
}
