//! # Session Manager
//!
//! The session context handed to the rest of the application. One instance
//! owns the credential store, the expiry policy and the single renewal
//! coordinator; everything it hands out (scheduler, interceptor) shares
//! that coordinator, so there is never more than one renewal in flight.
//!
//! ## Usage
//!
//! ```no_run
//! use core_runtime::config::SessionConfig;
//! use core_runtime::events::EventBus;
//! use core_session::{Credential, Profile, SessionManager};
//!
//! # async fn example(config: SessionConfig) -> core_session::Result<()> {
//! let manager = SessionManager::with_http_renewal(
//!     &config,
//!     "https://api.example.com/auth/renew",
//!     EventBus::default(),
//! )?;
//!
//! manager
//!     .login(Credential::new("h.p.s"), Profile::new("7", "Ada", "admin"))
//!     .await?;
//! let _scheduler = manager.start_scheduler();
//!
//! let mut sign_outs = manager.sign_out_events();
//! tokio::spawn(async move {
//!     while sign_outs.recv().await.is_ok() {
//!         // navigate to the sign-in screen
//!     }
//! });
//! # Ok(())
//! # }
//! ```

use crate::claims;
use crate::credential_store::CredentialStore;
use crate::error::{Result, SessionError};
use crate::interceptor::RequestInterceptor;
use crate::policy::ExpiryPolicy;
use crate::renewal::RenewalCoordinator;
use crate::scheduler::{LifecycleScheduler, SchedulerHandle};
use crate::signal::SignOutSignal;
use crate::transport::{HttpRenewalTransport, RenewalTransport};
use crate::types::{ClaimSet, Credential, Freshness, Profile, SessionState};
use bridge_traits::http::HttpClient;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::SessionConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, Receiver, SessionEvent};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Session lifecycle context.
#[derive(Clone)]
pub struct SessionManager {
    coordinator: RenewalCoordinator,
    http_client: Arc<dyn HttpClient>,
    event_bus: EventBus,
}

impl SessionManager {
    /// Creates a manager using the system clock.
    pub fn new(
        config: &SessionConfig,
        transport: Arc<dyn RenewalTransport>,
        event_bus: EventBus,
    ) -> Result<Self> {
        Self::with_clock(config, transport, Arc::new(SystemClock), event_bus)
    }

    pub fn with_clock(
        config: &SessionConfig,
        transport: Arc<dyn RenewalTransport>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Result<Self> {
        let policy = ExpiryPolicy::from_config(config)?;
        let store = CredentialStore::new(Arc::clone(&config.secure_store));
        let sign_out = SignOutSignal::new(event_bus.clone());
        let coordinator = RenewalCoordinator::new(
            store,
            policy,
            transport,
            clock,
            event_bus.clone(),
            sign_out,
        );

        info!(
            lifetime_secs = policy.lifetime().as_secs(),
            renewal_window_secs = policy.renewal_window().as_secs(),
            "Session manager initialized"
        );

        Ok(Self {
            coordinator,
            http_client: Arc::clone(&config.http_client),
            event_bus,
        })
    }

    /// Creates a manager that renews through `endpoint` using the
    /// configured HTTP client.
    pub fn with_http_renewal(
        config: &SessionConfig,
        endpoint: impl Into<String>,
        event_bus: EventBus,
    ) -> Result<Self> {
        let transport = HttpRenewalTransport::new(Arc::clone(&config.http_client), endpoint);
        Self::new(config, Arc::new(transport), event_bus)
    }

    /// Stores a freshly issued credential and starts a new session.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidCredential`] when the credential cannot be
    /// decoded or is already expired; storage errors otherwise.
    #[instrument(skip(self, credential, profile), fields(profile_id = %profile.id))]
    pub async fn login(&self, credential: Credential, profile: Profile) -> Result<()> {
        let claims = claims::decode(credential.as_str())
            .map_err(|e| SessionError::InvalidCredential(e.to_string()))?;

        let now = self.coordinator.clock().now();
        if self.policy().classify(Some(&claims), now) == Freshness::Expired {
            warn!(expires_at = claims.expires_at, "Refusing expired credential");
            return Err(SessionError::InvalidCredential(
                "credential is already expired".to_string(),
            ));
        }

        self.store().save(&credential, &profile).await?;
        self.coordinator.clear_invalidation().await;
        self.coordinator.sign_out_signal().rearm();

        info!(expires_at = claims.expires_at, "Logged in");
        self.emit(SessionEvent::LoggedIn {
            subject: claims.subject,
            expires_at: claims.expires_at,
        });
        Ok(())
    }

    /// Empties the store. Logging out twice is not an error.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        self.store().clear().await?;
        self.coordinator.clear_invalidation().await;
        info!("Logged out");
        self.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    /// Same as [`logout`](Self::logout).
    pub async fn clear(&self) -> Result<()> {
        self.logout().await
    }

    /// See [`RenewalCoordinator::ensure_fresh`].
    pub async fn ensure_fresh(&self) -> bool {
        self.coordinator.ensure_fresh().await
    }

    /// A credential that is safe to attach right now, renewing first if
    /// needed.
    pub async fn usable_credential(&self) -> Option<Credential> {
        if !self.ensure_fresh().await {
            return None;
        }
        match self.store().credential().await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Failed to read credential");
                None
            }
        }
    }

    pub async fn profile(&self) -> Result<Option<Profile>> {
        self.store().profile().await
    }

    /// Claims of the stored credential, decoded for this call only.
    pub async fn claims(&self) -> Result<Option<ClaimSet>> {
        Ok(self
            .store()
            .credential()
            .await?
            .and_then(|credential| claims::try_decode(credential.as_str())))
    }

    pub async fn state(&self) -> SessionState {
        match self.coordinator.current_freshness().await {
            Some(freshness) => freshness.into(),
            None => SessionState::Unauthenticated,
        }
    }

    pub fn scheduler(&self) -> LifecycleScheduler {
        LifecycleScheduler::new(self.coordinator.clone())
    }

    /// Starts the default scheduler. Must be called within a Tokio runtime.
    pub fn start_scheduler(&self) -> SchedulerHandle {
        self.scheduler().start()
    }

    pub fn interceptor(&self) -> RequestInterceptor {
        RequestInterceptor::new(
            self.coordinator.clone(),
            Arc::clone(&self.http_client),
            self.event_bus.clone(),
        )
    }

    /// Stream of [`SessionEvent::SignOutRequired`] events only.
    pub fn sign_out_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe()).filter(CoreEvent::is_sign_out)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn coordinator(&self) -> &RenewalCoordinator {
        &self.coordinator
    }

    pub fn policy(&self) -> &ExpiryPolicy {
        self.coordinator.policy()
    }

    fn store(&self) -> &CredentialStore {
        self.coordinator.store()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_bus.emit(CoreEvent::Session(event));
    }
}
