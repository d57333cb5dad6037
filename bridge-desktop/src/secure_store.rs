//! Secure Credential Storage using OS Keychain

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use keyring::Entry;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const DEFAULT_SERVICE_NAME: &str = "session-core";

/// Entry holding the JSON list of keys written through this store.
const INDEX_KEY: &str = "__index__";

/// Keyring-based secure storage implementation
///
/// Uses platform-specific secure storage:
/// - macOS: Keychain
/// - Windows: Credential Manager (DPAPI)
/// - Linux: Secret Service (libsecret)
///
/// The keyring cannot enumerate entries, so the store keeps its own key
/// index in a reserved entry. `list_keys` and `clear_all` work from it.
pub struct KeyringSecureStore {
    service_name: String,
    index_lock: Mutex<()>,
}

impl KeyringSecureStore {
    /// Create a new secure store with default service name
    pub fn new() -> Self {
        Self::with_service_name(DEFAULT_SERVICE_NAME)
    }

    /// Create a new secure store with custom service name
    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            index_lock: Mutex::new(()),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn get_entry(&self, key: &str) -> std::result::Result<Entry, keyring::Error> {
        Entry::new(&self.service_name, key)
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("Keyring error: {}", e))
    }

    fn check_key(key: &str) -> Result<()> {
        if key == INDEX_KEY {
            return Err(BridgeError::OperationFailed(format!(
                "Key '{}' is reserved",
                INDEX_KEY
            )));
        }
        Ok(())
    }

    fn read_raw(&self, key: &str) -> Result<Option<String>> {
        let entry = self.get_entry(key).map_err(Self::map_keyring_error)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    fn delete_raw(&self, key: &str) -> Result<()> {
        let entry = self.get_entry(key).map_err(Self::map_keyring_error)?;
        match entry.delete_credential() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    fn read_index(&self) -> Result<Vec<String>> {
        match self.read_raw(INDEX_KEY)? {
            Some(raw) => Ok(decode_index(&raw)),
            None => Ok(Vec::new()),
        }
    }

    fn write_index(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return self.delete_raw(INDEX_KEY);
        }
        let raw = encode_index(keys)?;
        let entry = self.get_entry(INDEX_KEY).map_err(Self::map_keyring_error)?;
        entry.set_password(&raw).map_err(Self::map_keyring_error)
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_index(keys: &[String]) -> Result<String> {
    serde_json::to_string(keys)
        .map_err(|e| BridgeError::OperationFailed(format!("Failed to encode key index: {}", e)))
}

fn decode_index(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(error = %e, "Key index is corrupted, starting a new one");
        Vec::new()
    })
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        Self::check_key(key)?;

        // Keyring only supports strings, so binary data is base64 encoded
        let encoded = STANDARD.encode(value);
        let entry = self.get_entry(key).map_err(Self::map_keyring_error)?;
        entry
            .set_password(&encoded)
            .map_err(Self::map_keyring_error)?;

        let _guard = self.index_lock.lock().await;
        let mut keys = self.read_index()?;
        if !keys.iter().any(|known| known == key) {
            keys.push(key.to_string());
            self.write_index(&keys)?;
        }

        debug!(key = key, "Stored secret in keyring");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Self::check_key(key)?;

        let Some(encoded) = self.read_raw(key)? else {
            debug!(key = key, "Secret not found in keyring");
            return Ok(None);
        };

        let decoded = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
            error!(key = key, error = %e, "Failed to decode secret");
            BridgeError::OperationFailed(format!("Failed to decode secret: {}", e))
        })?;

        debug!(key = key, "Retrieved secret from keyring");
        Ok(Some(decoded))
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        Self::check_key(key)?;
        self.delete_raw(key)?;

        let _guard = self.index_lock.lock().await;
        let mut keys = self.read_index()?;
        let before = keys.len();
        keys.retain(|known| known != key);
        if keys.len() != before {
            self.write_index(&keys)?;
        }

        debug!(key = key, "Deleted secret from keyring");
        Ok(())
    }

    async fn has_secret(&self, key: &str) -> Result<bool> {
        Self::check_key(key)?;
        Ok(self.read_raw(key)?.is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.read_index()
    }

    async fn clear_all(&self) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        let keys = self.read_index()?;
        for key in &keys {
            self.delete_raw(key)?;
        }
        self.delete_raw(INDEX_KEY)?;

        debug!(count = keys.len(), "Cleared keyring secrets");
        Ok(())
    }
}
