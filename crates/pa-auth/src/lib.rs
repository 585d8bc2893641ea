//! Session acquisition for French administrative portals without a public API
//!
//! This crate turns a login/password pair into a credential usable for the
//! portals' own JSON and document endpoints, by driving their interactive
//! login handshakes from code.
//!
//! # Handshakes
//!
//! - [`UrssafAuthenticator`]: login form → `ctxUrssaf` context cookie and
//!   `tokenBds` subject token → silent OIDC authorization with PKCE → access
//!   token. Nothing is cached; every run performs the full exchange.
//! - [`MonidenumAuthenticator`]: portal login redirect → identity provider
//!   form → manual redirect walk until the portal sets `PHPSESSID`. The session
//!   cookie is cached for 30 minutes through [`SessionCache`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pa_auth::{CredentialResolver, MemorySecretStore, TerminalPrompter};
//! use pa_auth::{UrssafAuthenticator, UrssafConfig};
//!
//! # async fn example() -> pa_auth::Result<()> {
//! let store = Arc::new(MemorySecretStore::new());
//! let credentials = CredentialResolver::new(store, Arc::new(TerminalPrompter));
//!
//! let urssaf = UrssafAuthenticator::new(UrssafConfig::production()?)?;
//! let session = urssaf.login(&credentials).await?;
//! println!("SIRET {}", session.account.siret);
//! # Ok(())
//! # }
//! ```
//!
//! # Storage
//!
//! Credentials and sessions live in a [`SecretStore`]: the OS keyring via
//! `KeyringSecretStore` (feature `keyring-support`, on by default), or
//! [`MemorySecretStore`] in tests. Passwords and tokens are never logged.

pub mod auth;
pub mod config;
pub mod cookies;
pub mod credentials;
pub mod errors;
pub mod models;
pub mod monidenum;
pub mod pkce;
pub mod prompt;
pub mod session;
pub mod store;
pub mod urssaf;

// Re-export main types
pub use auth::Authenticator;
pub use config::{HttpTimeouts, MonidenumConfig, UrssafConfig, build_http_client};
pub use cookies::CookieJar;
pub use credentials::{Credential, CredentialResolver};
pub use errors::{PaAuthError, Result};
pub use models::AccountContext;
pub use monidenum::{MonidenumAuthenticator, MonidenumSession};
pub use pkce::PkceMaterial;
pub use prompt::{Prompter, StaticPrompter, TerminalPrompter};
pub use session::{Clock, SessionCache, SessionToken, SystemClock};
#[cfg(feature = "keyring-support")]
pub use store::KeyringSecretStore;
pub use store::{MemorySecretStore, SecretStore};
pub use urssaf::{UrssafAuthenticator, UrssafSession};
