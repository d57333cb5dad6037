//! Fakes shared by the unit tests of this crate.

use crate::claims::encode_unsigned;
use crate::credential_store::CredentialStore;
use crate::policy::ExpiryPolicy;
use crate::renewal::RenewalCoordinator;
use crate::signal::SignOutSignal;
use crate::transport::RenewalTransport;
use crate::types::Credential;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::storage::SecureStore;
use bridge_traits::time::Clock;
use chrono::{DateTime, TimeZone, Utc};
use core_runtime::events::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) const HOUR: i64 = 3600;
pub(crate) const DAY: i64 = 24 * HOUR;
pub(crate) const WEEK: i64 = 7 * DAY;

/// In-memory [`SecureStore`].
#[derive(Default)]
pub(crate) struct MockSecureStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MockSecureStore {
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

pub(crate) struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// Unsigned token for `subject` expiring `seconds` after [`now`].
pub(crate) fn token_for(subject: &str, seconds: i64) -> Credential {
    let mut claims = serde_json::Map::new();
    claims.insert("sub".into(), subject.into());
    claims.insert("exp".into(), (now().timestamp() + seconds).into());
    Credential::new(encode_unsigned(&claims))
}

pub(crate) fn token_expiring_in(seconds: i64) -> Credential {
    token_for("ada", seconds)
}

pub(crate) fn memory_store() -> CredentialStore {
    CredentialStore::new(Arc::new(MockSecureStore::default()))
}

/// Coordinator over an empty in-memory store and a clock frozen at [`now`].
pub(crate) fn coordinator(
    transport: impl RenewalTransport + 'static,
    bus: &EventBus,
) -> (RenewalCoordinator, CredentialStore) {
    let store = memory_store();
    let coordinator = RenewalCoordinator::new(
        store.clone(),
        ExpiryPolicy::default(),
        Arc::new(transport),
        Arc::new(FixedClock(now())),
        bus.clone(),
        SignOutSignal::new(bus.clone()),
    );
    (coordinator, store)
}
