//! Renewal transport: the network call that trades a still-usable
//! credential for a fresh one.

use crate::error::RenewalError;
use crate::types::{Credential, Profile, SessionRecord};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default per-attempt timeout for renewal calls.
pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchanges the current credential for a new one.
///
/// Implementations report server refusals as [`RenewalError::Rejected`]
/// and everything transient as [`RenewalError::Network`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RenewalTransport: Send + Sync {
    async fn renew(&self, credential: &Credential) -> Result<SessionRecord, RenewalError>;
}

/// Body returned by the renewal endpoint.
#[derive(Deserialize)]
struct RenewalResponse {
    token: String,
    user: Profile,
}

/// [`RenewalTransport`] that POSTs to a renewal endpoint, presenting the
/// current credential as a bearer token.
///
/// The endpoint answers `{"token": "...", "user": {"id", "name", "role"}}`.
#[derive(Clone)]
pub struct HttpRenewalTransport {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    timeout: Duration,
}

impl HttpRenewalTransport {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            timeout: DEFAULT_RENEWAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RenewalTransport for HttpRenewalTransport {
    #[instrument(skip(self, credential), fields(endpoint = %self.endpoint))]
    async fn renew(&self, credential: &Credential) -> Result<SessionRecord, RenewalError> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint.clone())
            .bearer_token(credential.as_str())
            .header("Accept", "application/json")
            .timeout(self.timeout);

        let response = match tokio::time::timeout(self.timeout, self.http_client.execute(request))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, "Renewal request failed");
                return Err(RenewalError::Network(e.to_string()));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Renewal request timed out");
                return Err(RenewalError::timed_out(self.timeout));
            }
        };

        if response.is_client_error() {
            let message = response
                .text()
                .unwrap_or_else(|_| "renewal refused".to_string());
            warn!(status = response.status, "Renewal rejected by server");
            return Err(RenewalError::Rejected {
                status: response.status,
                message,
            });
        }

        if !response.is_success() {
            warn!(status = response.status, "Renewal endpoint unavailable");
            return Err(RenewalError::Network(format!(
                "renewal endpoint answered {}",
                response.status
            )));
        }

        let body: RenewalResponse = response.json().map_err(|e| {
            warn!(error = %e, "Renewal response could not be parsed");
            RenewalError::Network(e.to_string())
        })?;

        debug!(profile_id = %body.user.id, "Renewal response received");
        Ok(SessionRecord::new(Credential::new(body.token), body.user))
    }
}
