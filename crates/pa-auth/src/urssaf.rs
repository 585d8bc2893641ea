use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::auth::{Authenticator, location_header};
use crate::config::{UrssafConfig, build_http_client, urssaf};
use crate::cookies::find_set_cookie;
use crate::credentials::{Credential, CredentialResolver};
use crate::errors::{PaAuthError, Result};
use crate::models::{AccountContext, PortalConfig, TokenResponse, decode_context_cookie};
use crate::pkce::PkceMaterial;

/// Lower-cased fragments of the login page's bad-password message
const REJECTION_MARKERS: &[&str] = &[
    "identifiant ou mot de passe incorrect",
    "identifiant ou de mot de passe",
];

/// Result of a URSSAF login, valid for this invocation only
#[derive(Clone)]
pub struct UrssafSession {
    pub account: AccountContext,
    pub access_token: String,
}

impl std::fmt::Debug for UrssafSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrssafSession")
            .field("account", &self.account)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// OIDC authorization-code + PKCE login against the URSSAF portal.
///
/// The access token is never cached: every invocation runs the full handshake.
#[derive(Debug, Clone)]
pub struct UrssafAuthenticator {
    config: UrssafConfig,
    http: Client,
}

impl UrssafAuthenticator {
    pub fn new(config: UrssafConfig) -> Result<Self> {
        let http = build_http_client(&config.http_timeouts, &config.user_agent)?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &UrssafConfig {
        &self.config
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Resolve the stored credential and log in.
    ///
    /// A refused login deletes the stored credential so the next run prompts again.
    pub async fn login(&self, credentials: &CredentialResolver) -> Result<UrssafSession> {
        let credential = credentials
            .get_or_prompt(Self::SERVICE, "Identifiant URSSAF : ")
            .await?;

        match self.authenticate(&credential).await {
            Err(err @ PaAuthError::CredentialRejected(_)) => {
                warn!("URSSAF refused the stored credential, forgetting it");
                credentials.delete(Self::SERVICE).await?;
                Err(err)
            }
            other => other,
        }
    }

    /// Post the login form; returns the account context and the `tokenBds` subject token
    #[instrument(skip(self, credential))]
    pub async fn submit_login(&self, credential: &Credential) -> Result<(AccountContext, String)> {
        debug!("Submitting URSSAF login form");
        let response = self
            .http
            .post(self.config.login_url.clone())
            .form(&[
                ("identifiant", credential.login.as_str()),
                ("Password", credential.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let context = find_set_cookie(response.headers(), urssaf::CONTEXT_COOKIE);
        let location = location_header(&response);

        let Some(context) = context else {
            let body = response.text().await.unwrap_or_default().to_lowercase();
            if REJECTION_MARKERS.iter().any(|marker| body.contains(marker)) {
                return Err(PaAuthError::CredentialRejected(
                    "identifiant ou mot de passe incorrect".to_string(),
                ));
            }
            return Err(PaAuthError::contract(
                "ctxUrssaf cookie",
                format!("login answered {status} without it"),
            ));
        };

        let account = decode_context_cookie(&context)?;

        let location = location.ok_or_else(|| {
            PaAuthError::contract("Location header", format!("login answered {status}"))
        })?;
        let location = self.config.login_url.join(&location)?;
        let subject_token = query_value(&location, urssaf::SUBJECT_TOKEN_PARAM).ok_or_else(|| {
            PaAuthError::contract("tokenBds parameter", format!("Location was {location}"))
        })?;

        Ok((account, subject_token))
    }

    /// Read the OAuth client id from the public portal configuration
    #[instrument(skip(self))]
    pub async fn fetch_client_id(&self) -> Result<String> {
        let response = self
            .http
            .get(self.config.portal_config_url.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaAuthError::from_response(response).await);
        }

        let config: PortalConfig = response.json().await?;
        Ok(config.oidc.annabel.client_id)
    }

    /// Silent authorization exchanging the subject token; returns the authorization code
    #[instrument(skip(self, pkce, subject_token))]
    pub async fn authorize(
        &self,
        client_id: &str,
        pkce: &PkceMaterial,
        subject_token: &str,
    ) -> Result<String> {
        let mut url = self.config.authorize_url()?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("state", &pkce.state)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scope)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("nonce", &pkce.nonce)
            .append_pair("prompt", "none")
            .append_pair("subject_token", subject_token)
            .append_pair("subject_token_type", &self.config.subject_token_type);

        debug!("Requesting authorization code");
        let response = self.http.get(url).send().await?;

        if !response.status().is_redirection() {
            return Err(PaAuthError::from_response(response).await);
        }

        let location = location_header(&response).ok_or_else(|| {
            PaAuthError::contract("Location header", "authorize redirect without it")
        })?;
        let location = self.config.api_base.join(&location)?;

        if let Some(error) = query_value(&location, "error") {
            return Err(PaAuthError::contract("authorization code", error));
        }

        query_value(&location, "code").ok_or_else(|| {
            PaAuthError::contract("authorization code", format!("Location was {location}"))
        })
    }

    /// Redeem the authorization code with the PKCE verifier
    #[instrument(skip(self, code, code_verifier))]
    pub async fn exchange_code(
        &self,
        client_id: &str,
        code: &str,
        code_verifier: &str,
    ) -> Result<String> {
        debug!("Exchanging authorization code for access token");
        let response = self
            .http
            .post(self.config.token_url()?)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code_verifier", code_verifier),
                ("client_id", client_id),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaAuthError::from_response(response).await);
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait::async_trait]
impl Authenticator for UrssafAuthenticator {
    type Bearer = UrssafSession;

    const SERVICE: &'static str = "urssaf";

    #[instrument(skip(self, credential))]
    async fn authenticate(&self, credential: &Credential) -> Result<UrssafSession> {
        let (account, subject_token) = self.submit_login(credential).await?;
        let client_id = self.fetch_client_id().await?;
        let pkce = PkceMaterial::generate(&self.config.state_suffix)?;
        let code = self.authorize(&client_id, &pkce, &subject_token).await?;
        let access_token = self
            .exchange_code(&client_id, &code, &pkce.code_verifier)
            .await?;

        info!(siret = %account.siret, "Logged in to URSSAF");
        Ok(UrssafSession {
            account,
            access_token,
        })
    }
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
