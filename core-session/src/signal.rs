use core_runtime::events::{CoreEvent, EventBus, SessionEvent, SignOutReason};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Global "force sign-out" signal.
///
/// Fires [`SessionEvent::SignOutRequired`] at most once per failure
/// episode, however many components (coordinator, scheduler, interceptor)
/// observe the same failure. A successful login starts a new episode.
#[derive(Clone, Debug)]
pub struct SignOutSignal {
    event_bus: EventBus,
    fired: Arc<AtomicBool>,
}

impl SignOutSignal {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            event_bus,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Emit the sign-out event unless it already fired in this episode.
    ///
    /// Returns `true` if this call emitted the event.
    pub fn fire(&self, reason: SignOutReason) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            debug!(%reason, "Sign-out already signalled");
            return false;
        }

        warn!(%reason, "Session cannot be kept alive, sign-in required");
        let _ = self
            .event_bus
            .emit(CoreEvent::Session(SessionEvent::SignOutRequired { reason }));
        true
    }

    /// Start a new episode.
    pub fn rearm(&self) {
        self.fired.store(false, Ordering::Release);
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
