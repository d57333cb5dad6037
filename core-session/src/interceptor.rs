//! Request Interceptor
//!
//! Wraps outgoing API requests with the session lifecycle:
//!
//! 1. `ensure_fresh()` before sending; no usable credential means the
//!    request is never sent and the sign-out signal fires
//! 2. The current credential is attached as a bearer token
//! 3. A 401 answer invalidates the credential and the request goes through
//!    the same path exactly once more
//! 4. A second 401 surfaces as [`SessionError::AuthFailureAtRequestTime`]
//!
//! [`RequestInterceptor`] implements [`HttpClient`], so it can stand in for
//! the host client anywhere. [`RequestInterceptor::send_with`] covers
//! requests that don't go through `HttpClient` at all.

use crate::error::{Result, SessionError};
use crate::renewal::RenewalCoordinator;
use crate::types::Credential;
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::events::{CoreEvent, EventBus, RequestEvent, SignOutReason};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Result of a wrapped call that may have been refused as unauthenticated.
pub trait AuthOutcome {
    fn is_unauthorized(&self) -> bool;
}

impl AuthOutcome for HttpResponse {
    fn is_unauthorized(&self) -> bool {
        HttpResponse::is_unauthorized(self)
    }
}

/// Per-request retry state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestAttempt {
    pub retried: bool,
}

impl RequestAttempt {
    /// The follow-up attempt, or `None` if this one was already the retry.
    pub fn retry(self) -> Option<Self> {
        if self.retried {
            None
        } else {
            Some(Self { retried: true })
        }
    }
}

/// Attaches the session credential to outgoing requests.
#[derive(Clone)]
pub struct RequestInterceptor {
    coordinator: RenewalCoordinator,
    http_client: Arc<dyn HttpClient>,
    event_bus: EventBus,
}

impl RequestInterceptor {
    pub fn new(
        coordinator: RenewalCoordinator,
        http_client: Arc<dyn HttpClient>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            coordinator,
            http_client,
            event_bus,
        }
    }

    /// Sends `request` with the current credential as bearer token.
    ///
    /// Non-2xx answers other than a repeated 401 are returned as responses.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let target = request.url.clone();
        let client = Arc::clone(&self.http_client);
        self.send_with(&target, |credential| {
            let request = request.clone().bearer_token(credential.as_str());
            let client = Arc::clone(&client);
            async move { client.execute(request).await }
        })
        .await
    }

    /// Runs `call` with a usable credential, following the renew and
    /// retry-once rules. `target` only labels logs and events.
    #[instrument(skip(self, call))]
    pub async fn send_with<F, Fut, T, E>(&self, target: &str, mut call: F) -> Result<T>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: AuthOutcome,
        E: Into<SessionError>,
    {
        let mut attempt = RequestAttempt::default();
        loop {
            let credential = self.authorize().await?;
            let outcome = call(credential.clone()).await.map_err(Into::into)?;
            if !outcome.is_unauthorized() {
                return Ok(outcome);
            }

            // Next freshness check routes this credential through renewal.
            self.coordinator.invalidate(&credential).await;

            match attempt.retry() {
                Some(next) => {
                    debug!("Request unauthorized, retrying once");
                    self.emit(RequestEvent::Retrying {
                        target: target.to_string(),
                    });
                    attempt = next;
                }
                None => {
                    warn!("Request unauthorized after retry");
                    self.emit(RequestEvent::Rejected {
                        target: target.to_string(),
                    });
                    return Err(SessionError::AuthFailureAtRequestTime);
                }
            }
        }
    }

    async fn authorize(&self) -> Result<Credential> {
        if self.coordinator.ensure_fresh().await {
            if let Some(credential) = self.coordinator.store().credential().await? {
                return Ok(credential);
            }
        }

        debug!("No usable credential, request not sent");
        self.coordinator
            .sign_out_signal()
            .fire(SignOutReason::NoCredential);
        Err(SessionError::NotAuthenticated)
    }

    fn emit(&self, event: RequestEvent) {
        let _ = self.event_bus.emit(CoreEvent::Request(event));
    }
}

#[async_trait]
impl HttpClient for RequestInterceptor {
    /// Session failures are reported as [`BridgeError::OperationFailed`].
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.send(request).await.map_err(|e| match e {
            SessionError::Http(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        })
    }
}
