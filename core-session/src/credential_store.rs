//! Credential Store
//!
//! Persists the current credential and its profile through the platform
//! [`SecureStore`] (Keychain, Keystore, Credential Manager, ...).
//!
//! ## Guarantees
//!
//! - The store is either empty or holds exactly one credential + profile
//!   pair, written as a single record under one key
//! - Writes are serialised by an async lock and replace the whole record
//! - Readers always go to the underlying store; nothing is cached
//! - Corrupted records are deleted on read and reported as empty
//! - Credential values are never logged
//!
//! ## Example
//!
//! ```no_run
//! use core_session::{CredentialStore, Credential, Profile};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_session::Result<()> {
//! let store = CredentialStore::new(secure_store);
//!
//! store
//!     .save(&Credential::new("h.p.s"), &Profile::new("7", "Ada", "admin"))
//!     .await?;
//! let current = store.credential().await?;
//! store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SessionError};
use crate::types::{Credential, Profile, SessionRecord};
use bridge_traits::storage::SecureStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Key under which the session record is stored.
pub const SESSION_KEY: &str = "session:current";

/// On-disk format of the session record.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
    profile: Profile,
}

/// Secure storage for the single session record.
///
/// Cloning yields a handle to the same record and the same write lock.
#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
    write_lock: Arc<Mutex<()>>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        debug!("Initializing CredentialStore");
        Self {
            secure_store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the stored record with `credential` and `profile`.
    pub async fn save(&self, credential: &Credential, profile: &Profile) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_record(credential, profile).await
    }

    /// Load the stored record.
    ///
    /// Returns `Ok(None)` when the store is empty or the record was
    /// corrupted (in which case it is deleted).
    pub async fn load(&self) -> Result<Option<SessionRecord>> {
        let data = self
            .secure_store
            .get_secret(SESSION_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to read session from secure storage");
                SessionError::SecureStorageUnavailable(e.to_string())
            })?;

        let Some(data) = data else {
            return Ok(None);
        };

        match serde_json::from_slice::<StoredSession>(&data) {
            Ok(stored) => Ok(Some(SessionRecord::new(
                Credential::new(stored.token),
                stored.profile,
            ))),
            Err(e) => {
                warn!(error = %e, "Stored session is corrupted, deleting");
                if let Err(delete_err) = self.secure_store.delete_secret(SESSION_KEY).await {
                    warn!(error = %delete_err, "Failed to delete corrupted session");
                }
                Ok(None)
            }
        }
    }

    /// The stored credential, if any.
    pub async fn credential(&self) -> Result<Option<Credential>> {
        Ok(self.load().await?.map(|record| record.credential))
    }

    /// The stored profile, if any.
    pub async fn profile(&self) -> Result<Option<Profile>> {
        Ok(self.load().await?.map(|record| record.profile))
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.load().await?.is_none())
    }

    /// Empty the store. Clearing an empty store succeeds.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.delete_record().await
    }

    /// Replace the record only if it still holds `expected`.
    ///
    /// Returns `Ok(false)` without writing when the stored credential
    /// changed (or was cleared) since `expected` was read.
    pub async fn compare_and_replace(
        &self,
        expected: &Credential,
        credential: &Credential,
        profile: &Profile,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if !self.holds(expected).await? {
            debug!("Stored credential changed, skipping replace");
            return Ok(false);
        }
        self.write_record(credential, profile).await?;
        Ok(true)
    }

    /// Empty the store only if it still holds `expected`.
    pub async fn clear_if_current(&self, expected: &Credential) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if !self.holds(expected).await? {
            debug!("Stored credential changed, skipping clear");
            return Ok(false);
        }
        self.delete_record().await?;
        Ok(true)
    }

    async fn holds(&self, expected: &Credential) -> Result<bool> {
        Ok(self
            .load()
            .await?
            .is_some_and(|record| &record.credential == expected))
    }

    async fn write_record(&self, credential: &Credential, profile: &Profile) -> Result<()> {
        let stored = StoredSession {
            token: credential.as_str().to_string(),
            profile: profile.clone(),
        };

        let json = serde_json::to_vec(&stored).map_err(|e| SessionError::SerializationFailed {
            context: "session record".to_string(),
            source: e,
        })?;

        self.secure_store
            .set_secret(SESSION_KEY, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to write session to secure storage");
                SessionError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            profile_id = %profile.id,
            credential = %credential.fingerprint(),
            "Session stored"
        );
        Ok(())
    }

    async fn delete_record(&self) -> Result<()> {
        self.secure_store
            .delete_secret(SESSION_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete session from secure storage");
                SessionError::SecureStorageUnavailable(e.to_string())
            })?;

        info!("Session cleared");
        Ok(())
    }
}
