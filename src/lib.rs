//! Workspace facade crate.
//!
//! Re-exports the session core so host applications can depend on
//! `session-workspace` alone. The `desktop-shims` feature (default) lets
//! `SessionConfig::builder()` fall back to the OS keychain and a reqwest
//! client when no bridges are injected.

pub use core_runtime as runtime;
pub use core_session as session;

pub use core_runtime::config::SessionConfig;
pub use core_runtime::events::{CoreEvent, EventBus, SessionEvent, SignOutReason};
pub use core_session::{Credential, Profile, SessionError, SessionManager, SessionState};
