//! # Session Lifecycle Module
//!
//! Keeps a bearer credential usable for as long as the server allows.
//!
//! ## Overview
//!
//! This module decides whether the held credential is usable, renews it
//! before it expires, makes sure concurrent callers share a single renewal,
//! and forces re-authentication when renewal is impossible.
//!
//! ## Features
//!
//! - Secure persistence of one credential + profile pair
//! - Unverified claim decoding for expiry hints
//! - Three-state freshness policy (valid, needs renewal, expired)
//! - Single-flight renewal with compare-and-swap store updates
//! - Cancellable background renewal scheduler
//! - Request interceptor with bearer injection and retry-once on 401
//! - Deduplicated global sign-out signal on the core event bus

pub mod claims;
pub mod credential_store;
pub mod error;
pub mod interceptor;
pub mod manager;
pub mod policy;
pub mod renewal;
pub mod scheduler;
pub mod signal;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use credential_store::CredentialStore;
pub use error::{ConfigError, DecodeError, RenewalError, Result, SessionError};
pub use interceptor::{AuthOutcome, RequestAttempt, RequestInterceptor};
pub use manager::SessionManager;
pub use policy::ExpiryPolicy;
pub use renewal::{RenewalCoordinator, RenewalOutcome};
pub use scheduler::{LifecycleScheduler, SchedulerHandle, DEFAULT_CHECK_INTERVAL};
pub use signal::SignOutSignal;
pub use transport::{HttpRenewalTransport, RenewalTransport, DEFAULT_RENEWAL_TIMEOUT};
pub use types::{ClaimSet, Credential, Freshness, Profile, SessionRecord, SessionState};
