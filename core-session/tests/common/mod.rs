//! Shared fakes for the session integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::SecureStore;
use bridge_traits::time::Clock;
use chrono::{DateTime, TimeZone, Utc};
use core_runtime::config::SessionConfig;
use core_runtime::events::EventBus;
use core_session::claims::encode_unsigned;
use core_session::{Credential, Profile, RenewalError, RenewalTransport, SessionManager, SessionRecord};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

pub const RENEW_URL: &str = "https://api.example.com/auth/renew";
pub const CUSTOMERS_URL: &str = "https://api.example.com/customers";

pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub fn hours(n: i64) -> chrono::Duration {
    chrono::Duration::hours(n)
}

pub fn days(n: i64) -> chrono::Duration {
    chrono::Duration::days(n)
}

static SERIAL: AtomicUsize = AtomicUsize::new(0);

/// Unsigned token for subject "ada" expiring at `expires_at`. Every call
/// yields a distinct token.
pub fn token_expiring_at(expires_at: DateTime<Utc>) -> Credential {
    let mut claims = serde_json::Map::new();
    claims.insert("sub".into(), "ada".into());
    claims.insert("role".into(), "admin".into());
    claims.insert("iat".into(), (expires_at - days(7)).timestamp().into());
    claims.insert("exp".into(), expires_at.timestamp().into());
    claims.insert("jti".into(), SERIAL.fetch_add(1, Ordering::Relaxed).into());
    Credential::new(encode_unsigned(&claims))
}

pub fn profile() -> Profile {
    Profile::new("7", "Ada", "admin")
}

#[derive(Default)]
pub struct InMemorySecureStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for InMemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.data
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.data.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.data.lock().await.keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.data.lock().await.clear();
        Ok(())
    }
}

/// Wall clock that only moves when told to.
pub struct ManualClock {
    now: StdMutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: StdMutex::new(at),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Renewal transport issuing week-long tokens relative to a [`ManualClock`].
pub struct FakeTransport {
    clock: Arc<ManualClock>,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl FakeTransport {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    pub fn failing(clock: Arc<ManualClock>) -> Self {
        let transport = Self::new(clock);
        transport.failing.store(true, Ordering::SeqCst);
        transport
    }

    /// Each call takes `delay` (tokio time) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenewalTransport for FakeTransport {
    async fn renew(&self, _credential: &Credential) -> Result<SessionRecord, RenewalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RenewalError::Network("connection refused".to_string()));
        }
        Ok(SessionRecord::new(
            token_expiring_at(self.clock.now() + days(7)),
            profile(),
        ))
    }
}

/// API server stand-in.
///
/// Answers the renewal endpoint with a fresh token, answers 401 to any
/// bearer in the rejected set, and 200 otherwise. Records every bearer.
pub struct FakeHttpClient {
    clock: Arc<ManualClock>,
    rejected: StdMutex<HashSet<String>>,
    reject_all: AtomicBool,
    bearers: StdMutex<Vec<(String, Option<String>)>>,
}

impl FakeHttpClient {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            rejected: StdMutex::new(HashSet::new()),
            reject_all: AtomicBool::new(false),
            bearers: StdMutex::new(Vec::new()),
        }
    }

    pub fn reject(&self, credential: &Credential) {
        self.rejected
            .lock()
            .unwrap()
            .insert(credential.as_str().to_string());
    }

    pub fn reject_all(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    /// Bearers presented to `url`, in order.
    pub fn bearers_for(&self, url: &str) -> Vec<Option<String>> {
        self.bearers
            .lock()
            .unwrap()
            .iter()
            .filter(|(seen, _)| seen == url)
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let bearer = request.bearer().map(str::to_string);
        self.bearers
            .lock()
            .unwrap()
            .push((request.url.clone(), bearer.clone()));

        let Some(bearer) = bearer else {
            return Ok(HttpResponse::new(401, "missing credential"));
        };

        if request.url == RENEW_URL {
            if self.rejected.lock().unwrap().contains(&bearer) {
                return Ok(HttpResponse::new(401, "credential revoked"));
            }
            let body = serde_json::json!({
                "token": token_expiring_at(self.clock.now() + days(7)).as_str(),
                "user": { "id": 7, "name": "Ada", "role": "admin" },
            });
            let body = serde_json::to_vec(&body)
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
            return Ok(HttpResponse::new(200, body));
        }

        if self.reject_all.load(Ordering::SeqCst) || self.rejected.lock().unwrap().contains(&bearer) {
            return Ok(HttpResponse::new(401, "unauthorized"));
        }
        Ok(HttpResponse::new(200, r#"[{"id":1,"name":"Acme"}]"#))
    }
}

pub fn config(http_client: Arc<dyn HttpClient>) -> SessionConfig {
    SessionConfig::builder()
        .secure_store(Arc::new(InMemorySecureStore::default()))
        .http_client(http_client)
        .build()
        .unwrap()
}

/// Manager wired to a [`FakeTransport`].
pub fn manager_with(
    clock: Arc<ManualClock>,
    transport: Arc<FakeTransport>,
    http_client: Arc<FakeHttpClient>,
) -> SessionManager {
    SessionManager::with_clock(
        &config(http_client),
        transport,
        clock,
        EventBus::new(64),
    )
    .unwrap()
}
