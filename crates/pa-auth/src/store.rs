use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::{PaAuthError, Result};

/// Named secrets stored per service namespace.
///
/// Values are opaque strings; callers serialize structured data themselves.
/// Every operation is idempotent and `delete` on a missing entry is a no-op.
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    /// Read a secret, `None` when absent
    async fn get(&self, service: &str, name: &str) -> Result<Option<String>>;

    /// Write a secret, replacing any previous value
    async fn set(&self, service: &str, name: &str, value: &str) -> Result<()>;

    /// Remove a secret
    async fn delete(&self, service: &str, name: &str) -> Result<()>;
}

/// In-memory secret store for testing and simple use cases
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    secrets: Arc<RwLock<HashMap<(String, String), String>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> PaAuthError {
    PaAuthError::Keyring("Lock poisoned".to_string())
}

#[async_trait::async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, service: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .secrets
            .read()
            .map_err(|_| poisoned())?
            .get(&(service.to_string(), name.to_string()))
            .cloned())
    }

    async fn set(&self, service: &str, name: &str, value: &str) -> Result<()> {
        self.secrets
            .write()
            .map_err(|_| poisoned())?
            .insert((service.to_string(), name.to_string()), value.to_string());
        Ok(())
    }

    async fn delete(&self, service: &str, name: &str) -> Result<()> {
        self.secrets
            .write()
            .map_err(|_| poisoned())?
            .remove(&(service.to_string(), name.to_string()));
        Ok(())
    }
}

/// OS keyring backed store (macOS Keychain, Windows Credential Manager, Linux keyutils)
///
/// Entries are addressed as service `"{app}.{service}"`, user `name`.
#[cfg(feature = "keyring-support")]
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    app: String,
}

#[cfg(feature = "keyring-support")]
impl KeyringSecretStore {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }

    fn entry(app: &str, service: &str, name: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&format!("{app}.{service}"), name)
            .map_err(|e| PaAuthError::Keyring(format!("Failed to access keyring: {}", e)))
    }

    /// Run a blocking keyring call off the async runtime
    async fn with_entry<T, F>(&self, service: &str, name: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> Result<T> + Send + 'static,
    {
        let (app, service, name) = (self.app.clone(), service.to_string(), name.to_string());
        tokio::task::spawn_blocking(move || op(Self::entry(&app, &service, &name)?))
            .await
            .map_err(|e| PaAuthError::Keyring(format!("Keyring task failed: {}", e)))?
    }
}

#[cfg(feature = "keyring-support")]
#[async_trait::async_trait]
impl SecretStore for KeyringSecretStore {
    async fn get(&self, service: &str, name: &str) -> Result<Option<String>> {
        self.with_entry(service, name, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(PaAuthError::Keyring(format!(
                "Failed to read from keyring: {}",
                e
            ))),
        })
        .await
    }

    async fn set(&self, service: &str, name: &str, value: &str) -> Result<()> {
        let value = value.to_string();
        self.with_entry(service, name, move |entry| {
            entry
                .set_password(&value)
                .map_err(|e| PaAuthError::Keyring(format!("Failed to write to keyring: {}", e)))
        })
        .await?;
        tracing::debug!(service, name, "Stored secret in keyring");
        Ok(())
    }

    async fn delete(&self, service: &str, name: &str) -> Result<()> {
        self.with_entry(service, name, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(PaAuthError::Keyring(format!(
                "Failed to delete from keyring: {}",
                e
            ))),
        })
        .await
    }
}
