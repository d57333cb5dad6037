//! # Renewal Coordinator
//!
//! Single-flight credential renewal.
//!
//! Every component about to use the credential calls
//! [`RenewalCoordinator::ensure_fresh`]. A valid credential answers `true`
//! without touching the network. Otherwise all concurrent callers share one
//! renewal attempt and observe the same outcome:
//!
//! ```text
//! caller A ──┐
//! caller B ──┼──> in-flight slot ──> spawned attempt ──> transport.renew()
//! caller C ──┘        (shared)              │
//!                                           ├─ Ok  -> CAS replace, `true`
//!                                           └─ Err -> clear, sign-out, `false`
//! ```
//!
//! The attempt runs as its own task. A caller that stops waiting (a
//! stopped scheduler, a dropped request) does not cancel it, and the store
//! is still updated for everyone else.
//!
//! Store writes are compare-and-swap against the credential that was
//! renewed, so a login or logout landing mid-renewal is never overwritten.

use crate::credential_store::CredentialStore;
use crate::error::RenewalError;
use crate::policy::ExpiryPolicy;
use crate::signal::SignOutSignal;
use crate::transport::{RenewalTransport, DEFAULT_RENEWAL_TIMEOUT};
use crate::types::{Credential, Freshness, SessionRecord};
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent, SignOutReason};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

type SharedOutcome = Shared<BoxFuture<'static, RenewalOutcome>>;

/// How a freshness request settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// The store holds a usable credential.
    Fresh,
    /// The store was empty; nothing to renew.
    NoCredential,
    /// Renewal failed; the store was cleared and sign-out fired.
    Failed,
    /// A login or logout replaced the session mid-renewal and the store no
    /// longer holds a usable credential. Not a renewal failure.
    Superseded,
}

impl RenewalOutcome {
    pub fn is_fresh(self) -> bool {
        self == RenewalOutcome::Fresh
    }
}

struct InFlight {
    attempt: u64,
    outcome: SharedOutcome,
}

struct Inner {
    store: CredentialStore,
    policy: ExpiryPolicy,
    transport: Arc<dyn RenewalTransport>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    sign_out: SignOutSignal,
    renewal_timeout: Duration,
    in_flight: Mutex<Option<InFlight>>,
    invalidated: Mutex<Option<Credential>>,
    attempts: AtomicU64,
}

/// Coordinates credential renewal so at most one renewal call is in flight.
///
/// Cheap to clone; clones share the in-flight slot.
#[derive(Clone)]
pub struct RenewalCoordinator {
    inner: Arc<Inner>,
}

impl RenewalCoordinator {
    /// Creates a coordinator with the default per-attempt timeout.
    pub fn new(
        store: CredentialStore,
        policy: ExpiryPolicy,
        transport: Arc<dyn RenewalTransport>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        sign_out: SignOutSignal,
    ) -> Self {
        Self::with_timeout(
            store,
            policy,
            transport,
            clock,
            event_bus,
            sign_out,
            DEFAULT_RENEWAL_TIMEOUT,
        )
    }

    /// Creates a coordinator whose renewal attempts give up after
    /// `renewal_timeout`.
    pub fn with_timeout(
        store: CredentialStore,
        policy: ExpiryPolicy,
        transport: Arc<dyn RenewalTransport>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        sign_out: SignOutSignal,
        renewal_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                policy,
                transport,
                clock,
                event_bus,
                sign_out,
                renewal_timeout,
                in_flight: Mutex::new(None),
                invalidated: Mutex::new(None),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    pub fn renewal_timeout(&self) -> Duration {
        self.inner.renewal_timeout
    }

    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn policy(&self) -> &ExpiryPolicy {
        &self.inner.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn sign_out_signal(&self) -> &SignOutSignal {
        &self.inner.sign_out
    }

    /// Number of renewal attempts started so far.
    pub fn attempts_started(&self) -> u64 {
        self.inner.attempts.load(Ordering::Acquire)
    }

    /// Whether a renewal attempt is currently in flight.
    pub async fn is_renewing(&self) -> bool {
        self.inner.in_flight.lock().await.is_some()
    }

    /// Makes sure the stored credential is usable, renewing it if needed.
    ///
    /// Returns `false` when the store is empty, renewal failed, or the
    /// session was cleared while renewing. Renewal failures are never
    /// returned as errors: the store has been cleared and the sign-out
    /// signal has fired.
    pub async fn ensure_fresh(&self) -> bool {
        self.renew_if_needed().await.is_fresh()
    }

    /// Like [`ensure_fresh`](Self::ensure_fresh), but tells a renewal
    /// failure apart from a session that changed underneath it.
    #[instrument(skip(self))]
    pub async fn renew_if_needed(&self) -> RenewalOutcome {
        let Some(credential) = self.inner.load_credential().await else {
            debug!("No stored credential");
            return RenewalOutcome::NoCredential;
        };

        if self.inner.freshness(&credential).await == Freshness::Valid {
            return RenewalOutcome::Fresh;
        }

        self.join_or_start().await
    }

    /// Freshness of the stored credential, or `None` if the store is empty.
    pub async fn current_freshness(&self) -> Option<Freshness> {
        let credential = self.inner.load_credential().await?;
        Some(self.inner.freshness(&credential).await)
    }

    /// Marks `credential` as rejected by the server. The next freshness
    /// check treats it as expired and routes it through renewal.
    ///
    /// Only the stored credential can be marked; a rejection that arrives
    /// after the credential was replaced is ignored. Returns whether the
    /// mark was set.
    pub async fn invalidate(&self, credential: &Credential) -> bool {
        let mut mark = self.inner.invalidated.lock().await;
        match self.inner.load_credential().await {
            Some(current) if current == *credential => {
                debug!(credential = %credential.fingerprint(), "Credential invalidated");
                *mark = Some(current);
                true
            }
            _ => {
                debug!(
                    credential = %credential.fingerprint(),
                    "Ignoring rejection of a credential that is no longer stored"
                );
                false
            }
        }
    }

    /// Forget any invalidation mark.
    pub async fn clear_invalidation(&self) {
        self.inner.invalidated.lock().await.take();
    }

    async fn join_or_start(&self) -> RenewalOutcome {
        let outcome = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!(attempt = in_flight.attempt, "Joining in-flight renewal");
                    in_flight.outcome.clone()
                }
                None => {
                    // A renewal may have settled since the caller's first read.
                    let Some(credential) = self.inner.load_credential().await else {
                        return RenewalOutcome::NoCredential;
                    };
                    if self.inner.freshness(&credential).await == Freshness::Valid {
                        return RenewalOutcome::Fresh;
                    }

                    let attempt = self.inner.attempts.fetch_add(1, Ordering::AcqRel) + 1;
                    let outcome = self.spawn_attempt(attempt, credential);
                    *slot = Some(InFlight {
                        attempt,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };

        outcome.await
    }

    fn spawn_attempt(&self, attempt: u64, credential: Credential) -> SharedOutcome {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let renewed = inner.run_attempt(attempt, credential).await;

            let mut slot = inner.in_flight.lock().await;
            if slot.as_ref().is_some_and(|in_flight| in_flight.attempt == attempt) {
                slot.take();
            }
            renewed
        });

        task.map(move |joined| match joined {
            Ok(renewed) => renewed,
            Err(e) => {
                error!(attempt, error = %e, "Renewal task aborted");
                RenewalOutcome::Failed
            }
        })
        .boxed()
        .shared()
    }
}

impl Inner {
    async fn load_credential(&self) -> Option<Credential> {
        match self.store.credential().await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential");
                None
            }
        }
    }

    async fn freshness(&self, credential: &Credential) -> Freshness {
        if self.invalidated.lock().await.as_ref() == Some(credential) {
            return Freshness::Expired;
        }
        self.policy
            .classify_token(credential.as_str(), self.clock.now())
    }

    #[instrument(skip(self, credential))]
    async fn run_attempt(&self, attempt: u64, credential: Credential) -> RenewalOutcome {
        info!("Renewing credential");
        let _ = self
            .event_bus
            .emit(CoreEvent::Session(SessionEvent::RenewalStarted { attempt }));

        let result = match timeout(self.renewal_timeout, self.transport.renew(&credential)).await {
            Ok(result) => result,
            Err(_) => Err(RenewalError::timed_out(self.renewal_timeout)),
        };

        let renewed = result.and_then(|record| self.check_renewed(record));
        match renewed {
            Ok(record) => self.commit(attempt, &credential, record).await,
            Err(err) => self.fail(attempt, &credential, err).await,
        }
    }

    fn check_renewed(&self, record: SessionRecord) -> Result<SessionRecord, RenewalError> {
        match self
            .policy
            .classify_token(record.credential.as_str(), self.clock.now())
        {
            Freshness::Valid => Ok(record),
            Freshness::NeedsRenewal => Err(RenewalError::Unusable(
                "renewed credential is already inside the renewal window".to_string(),
            )),
            Freshness::Expired => Err(RenewalError::Unusable(
                "renewed credential is expired or undecodable".to_string(),
            )),
        }
    }

    async fn commit(
        &self,
        attempt: u64,
        renewed_from: &Credential,
        record: SessionRecord,
    ) -> RenewalOutcome {
        match self
            .store
            .compare_and_replace(renewed_from, &record.credential, &record.profile)
            .await
        {
            Ok(true) => {
                self.invalidated.lock().await.take();
                let expires_at = crate::claims::try_decode(record.credential.as_str())
                    .map(|claims| claims.expires_at)
                    .unwrap_or_default();
                info!(expires_at, "Credential renewed");
                let _ = self
                    .event_bus
                    .emit(CoreEvent::Session(SessionEvent::Renewed {
                        attempt,
                        expires_at,
                    }));
                RenewalOutcome::Fresh
            }
            Ok(false) => {
                info!("Session changed during renewal, discarding renewed credential");
                self.superseded_outcome().await
            }
            Err(e) => {
                self.fail(
                    attempt,
                    renewed_from,
                    RenewalError::Network(format!("failed to persist renewed credential: {}", e)),
                )
                .await
            }
        }
    }

    async fn fail(
        &self,
        attempt: u64,
        renewed_from: &Credential,
        err: RenewalError,
    ) -> RenewalOutcome {
        warn!(error = %err, rejected = err.is_rejection(), "Credential renewal failed");
        let _ = self
            .event_bus
            .emit(CoreEvent::Session(SessionEvent::RenewalFailed {
                attempt,
                message: err.to_string(),
                rejected: err.is_rejection(),
            }));

        match self.store.clear_if_current(renewed_from).await {
            Ok(true) => {
                self.sign_out.fire(SignOutReason::RenewalFailed);
                RenewalOutcome::Failed
            }
            Ok(false) => {
                info!("Session changed during renewal, leaving it in place");
                self.superseded_outcome().await
            }
            Err(e) => {
                error!(error = %e, "Failed to clear credential after renewal failure");
                self.sign_out.fire(SignOutReason::RenewalFailed);
                RenewalOutcome::Failed
            }
        }
    }

    /// Outcome for callers whose renewal lost the race to a login or logout.
    async fn superseded_outcome(&self) -> RenewalOutcome {
        match self.load_credential().await {
            Some(credential) if self.freshness(&credential).await.is_usable() => {
                RenewalOutcome::Fresh
            }
            _ => RenewalOutcome::Superseded,
        }
    }
}
