use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::errors::{PaAuthError, Result};
use crate::prompt::Prompter;
use crate::store::SecretStore;

/// Secret name under which a service's login/password pair is stored
pub const CREDENTIALS_SECRET: &str = "credentials";

/// Login/password pair for one portal
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub login: String,
    pub password: Zeroizing<String>,
}

impl Credential {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    login: String,
    password: String,
}

/// Resolves a service's credential from the secret store, or asks for it
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn SecretStore>,
    prompter: Arc<dyn Prompter>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn SecretStore>, prompter: Arc<dyn Prompter>) -> Self {
        Self { store, prompter }
    }

    /// Return the stored credential for `service`, prompting and persisting it when absent.
    ///
    /// A stored credential is returned as is; a wrong password surfaces later
    /// when the portal refuses the login.
    pub async fn get_or_prompt(&self, service: &str, login_prompt: &str) -> Result<Credential> {
        if let Some(raw) = self.store.get(service, CREDENTIALS_SECRET).await? {
            match serde_json::from_str::<StoredCredential>(&raw) {
                Ok(stored) => {
                    debug!(service, "Using stored credential");
                    return Ok(Credential::new(stored.login, stored.password));
                }
                Err(e) => warn!(service, "Ignoring unreadable stored credential: {}", e),
            }
        }

        let login = self.prompter.read_line(login_prompt).await?;
        if login.is_empty() {
            return Err(PaAuthError::UserCancelled);
        }
        let password = self.prompter.read_password("Mot de passe : ").await?;

        let credential = Credential {
            login,
            password,
        };
        self.save(service, &credential).await?;
        info!(service, "Saved credential to secret store");

        Ok(credential)
    }

    async fn save(&self, service: &str, credential: &Credential) -> Result<()> {
        let payload = Zeroizing::new(serde_json::to_string(&StoredCredential {
            login: credential.login.clone(),
            password: credential.password.to_string(),
        })?);
        self.store.set(service, CREDENTIALS_SECRET, &payload).await
    }

    /// Forget the stored credential so the next run prompts again
    pub async fn delete(&self, service: &str) -> Result<()> {
        self.store.delete(service, CREDENTIALS_SECRET).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::StaticPrompter;
    use crate::store::MemorySecretStore;

    fn resolver(store: &MemorySecretStore, login: &str) -> CredentialResolver {
        CredentialResolver::new(
            Arc::new(store.clone()),
            Arc::new(StaticPrompter::new(login, "s3cret")),
        )
    }

    #[tokio::test]
    async fn test_prompt_then_persist() {
        let store = MemorySecretStore::new();
        let credential = resolver(&store, "jdupont")
            .get_or_prompt("urssaf", "Identifiant : ")
            .await
            .unwrap();

        assert_eq!(credential, Credential::new("jdupont", "s3cret"));
        assert!(
            store
                .get("urssaf", CREDENTIALS_SECRET)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_stored_credential_skips_prompt() {
        let store = MemorySecretStore::new();
        resolver(&store, "first")
            .get_or_prompt("urssaf", "Identifiant : ")
            .await
            .unwrap();

        let credential = resolver(&store, "second")
            .get_or_prompt("urssaf", "Identifiant : ")
            .await
            .unwrap();
        assert_eq!(credential.login, "first");
    }

    #[tokio::test]
    async fn test_empty_login_cancels() {
        let store = MemorySecretStore::new();
        let result = resolver(&store, "")
            .get_or_prompt("urssaf", "Identifiant : ")
            .await;

        assert!(matches!(result, Err(PaAuthError::UserCancelled)));
        assert!(store.get("urssaf", CREDENTIALS_SECRET).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemorySecretStore::new();
        let resolver = resolver(&store, "jdupont");
        resolver.get_or_prompt("urssaf", "Identifiant : ").await.unwrap();

        resolver.delete("urssaf").await.unwrap();
        resolver.delete("urssaf").await.unwrap();
        assert!(store.get("urssaf", CREDENTIALS_SECRET).await.unwrap().is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let credential = Credential::new("jdupont", "s3cret");
        assert!(!format!("{:?}", credential).contains("s3cret"));
    }
}
