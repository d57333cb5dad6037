//! # Event Bus System
//!
//! Broadcasts session state changes to any interested collaborator using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps the domain enums [`SessionEvent`]
//!   and [`RequestEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! Route guards and navigation subscribe here to learn about the global
//! sign-out signal ([`SessionEvent::SignOutRequired`]).
//!
//! ```text
//! ┌──────────────────┐   emit   ┌──────────┐  subscribe  ┌─────────────┐
//! │ RenewalCoordinator├────────>│          ├────────────>│ Route guard │
//! └──────────────────┘          │ EventBus │             └─────────────┘
//! ┌──────────────────┐   emit   │          │  subscribe  ┌─────────────┐
//! │ RequestInterceptor├────────>│          ├────────────>│ Navigation  │
//! └──────────────────┘          └──────────┘             └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SessionEvent, SignOutReason};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(16);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Session(SessionEvent::SignOutRequired {
//!         reason: SignOutReason::RenewalFailed,
//!     }))
//!     .ok();
//!
//! let event = receiver.recv().await.unwrap();
//! assert!(event.is_sign_out());
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; non-fatal.
//! - **`RecvError::Closed`**: all senders dropped; treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed. Publishers in this workspace
//! ignore that case: an unobserved event is not an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Credential lifecycle events
    Session(SessionEvent),
    /// Events raised while sending wrapped API requests
    Request(RequestEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Request(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::SignOutRequired { .. }) => EventSeverity::Error,
            CoreEvent::Session(SessionEvent::RenewalFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Request(RequestEvent::Rejected { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::LoggedIn { .. })
            | CoreEvent::Session(SessionEvent::LoggedOut)
            | CoreEvent::Session(SessionEvent::Renewed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Whether this event is the global sign-out signal.
    pub fn is_sign_out(&self) -> bool {
        matches!(self, CoreEvent::Session(SessionEvent::SignOutRequired { .. }))
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Session Events
// ============================================================================

/// Why the core decided the session can no longer be kept alive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SignOutReason {
    /// Renewal was attempted and failed (network error or server rejection).
    RenewalFailed,
    /// A protected call was attempted with no usable credential at all.
    NoCredential,
}

impl fmt::Display for SignOutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignOutReason::RenewalFailed => write!(f, "renewal failed"),
            SignOutReason::NoCredential => write!(f, "no usable credential"),
        }
    }
}

/// Events describing the credential lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A collaborator stored a freshly issued credential.
    LoggedIn {
        /// Subject claim of the new credential, if present.
        subject: Option<String>,
        /// Expiry of the new credential (Unix epoch seconds).
        expires_at: i64,
    },
    /// The store was emptied on request.
    LoggedOut,
    /// A renewal network call was issued.
    RenewalStarted {
        /// Monotonic attempt number within this session manager.
        attempt: u64,
    },
    /// A renewal call succeeded and the store now holds the new credential.
    Renewed {
        attempt: u64,
        /// Expiry of the renewed credential (Unix epoch seconds).
        expires_at: i64,
    },
    /// A renewal call failed; the store has been cleared.
    RenewalFailed {
        attempt: u64,
        message: String,
        /// `true` when the server explicitly refused the renewal.
        rejected: bool,
    },
    /// The session cannot be kept alive; redirect to sign-in.
    SignOutRequired { reason: SignOutReason },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::LoggedIn { .. } => "Credential stored",
            SessionEvent::LoggedOut => "Credential cleared",
            SessionEvent::RenewalStarted { .. } => "Renewing credential",
            SessionEvent::Renewed { .. } => "Credential renewed",
            SessionEvent::RenewalFailed { .. } => "Credential renewal failed",
            SessionEvent::SignOutRequired { .. } => "Sign-in required",
        }
    }
}

// ============================================================================
// Request Events
// ============================================================================

/// Events raised by the request interceptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RequestEvent {
    /// The server answered 401; the request is retried once.
    Retrying { target: String },
    /// The server answered 401 again after the retry.
    Rejected { target: String },
}

impl RequestEvent {
    fn description(&self) -> &str {
        match self {
            RequestEvent::Retrying { .. } => "Retrying request after authentication failure",
            RequestEvent::Rejected { .. } => "Request rejected as unauthenticated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus yields another handle to the same channel. Each
/// [`subscribe`](EventBus::subscribe) call creates an independent receiver
/// that sees every event emitted after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if nobody is subscribed.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(16);
/// let sign_outs = EventStream::new(event_bus.subscribe()).filter(CoreEvent::is_sign_out);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
