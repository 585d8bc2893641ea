use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::COOKIE;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument};
use url::Url;

use crate::auth::{Authenticator, location_header};
use crate::config::{MonidenumConfig, build_http_client, monidenum};
use crate::cookies::{CookieJar, find_set_cookie};
use crate::credentials::{Credential, CredentialResolver};
use crate::errors::{PaAuthError, Result};
use crate::session::SessionCache;

static FORM_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"action="([^"]*)""#).expect("valid form action regex"));

static ALERT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)class="(?:[^"]*\s)?alert(?:-\w+)*(?:\s[^"]*)?"[^>]*>(.*?)</div>"#)
        .expect("valid alert regex")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Authenticated portal session, carried as a cookie
#[derive(Clone, PartialEq, Eq)]
pub struct MonidenumSession {
    pub cookie_name: String,
    pub value: String,
}

impl MonidenumSession {
    /// `Cookie` header value for authorized portal calls
    pub fn cookie_header(&self) -> String {
        format!("{}={}", self.cookie_name, self.value)
    }
}

impl std::fmt::Debug for MonidenumSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonidenumSession")
            .field("cookie_name", &self.cookie_name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Login through the identity provider fronting monidenum, walking every
/// redirect by hand to collect the portal session cookie.
#[derive(Debug, Clone)]
pub struct MonidenumAuthenticator {
    config: MonidenumConfig,
    http: Client,
}

impl MonidenumAuthenticator {
    pub fn new(config: MonidenumConfig) -> Result<Self> {
        let http = build_http_client(&config.http_timeouts, &config.user_agent)?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &MonidenumConfig {
        &self.config
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    fn session(&self, value: String) -> MonidenumSession {
        MonidenumSession {
            cookie_name: self.config.session_cookie.clone(),
            value,
        }
    }

    /// Reuse the cached session while it lasts, otherwise log in and cache the new one.
    ///
    /// A session the portal dropped before the local TTL is not detected here;
    /// `logout` clears it.
    pub async fn login(
        &self,
        credentials: &CredentialResolver,
        cache: &SessionCache,
    ) -> Result<MonidenumSession> {
        if let Some(value) = cache.get(Self::SERVICE).await? {
            debug!("Reusing cached monidenum session");
            return Ok(self.session(value));
        }

        let credential = credentials
            .get_or_prompt(Self::SERVICE, "Email monidenum : ")
            .await?;
        let session = self.authenticate(&credential).await?;
        cache
            .set(Self::SERVICE, &session.value, self.config.session_ttl)
            .await?;

        Ok(session)
    }

    /// Forget the stored credential and the cached session
    pub async fn logout(&self, credentials: &CredentialResolver, cache: &SessionCache) -> Result<()> {
        credentials.delete(Self::SERVICE).await?;
        cache.delete(Self::SERVICE).await
    }

    /// GET the portal login route; returns the identity provider URL and portal cookies
    #[instrument(skip(self))]
    pub async fn start_login(&self) -> Result<(Url, CookieJar)> {
        let response = self
            .http
            .get(self.config.portal_url(monidenum::LOGIN_PATH)?)
            .send()
            .await?;

        let jar = CookieJar::default().merge_response(response.headers());
        let location = location_header(&response).ok_or_else(|| {
            PaAuthError::contract(
                "Location header",
                format!("portal login answered {}", response.status()),
            )
        })?;

        Ok((self.config.portal_url(&location)?, jar))
    }

    /// GET the identity provider page; returns the form action and identity provider cookies
    #[instrument(skip(self))]
    pub async fn fetch_login_form(&self, authorize_url: &Url) -> Result<(Url, CookieJar)> {
        let response = self.http.get(authorize_url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(PaAuthError::from_response(response).await);
        }

        let jar = CookieJar::default().merge_response(response.headers());
        if jar.get(&self.config.auth_session_cookie).is_none() {
            return Err(PaAuthError::contract(
                "identity provider session cookie",
                format!("{} not set", self.config.auth_session_cookie),
            ));
        }

        let html = response.text().await?;
        let action = extract_form_action(&html).ok_or_else(|| {
            PaAuthError::contract("login form action", "no action attribute in page")
        })?;

        Ok((authorize_url.join(&action)?, jar))
    }

    /// POST the login form; returns the first post-login redirect target
    #[instrument(skip(self, jar, credential))]
    pub async fn submit_credentials(
        &self,
        action: &Url,
        jar: &CookieJar,
        credential: &Credential,
    ) -> Result<Url> {
        let mut request = self.http.post(action.clone()).form(&[
            ("username", credential.login.as_str()),
            ("password", credential.password.as_str()),
            ("credentialId", ""),
        ]);
        if let Some(cookies) = jar.header_value() {
            request = request.header(COOKIE, cookies);
        }
        let response = request.send().await?;
        let status = response.status();

        if status != StatusCode::FOUND {
            let html = response.text().await.unwrap_or_default();
            return Err(match extract_alert(&html) {
                Some(message) => PaAuthError::CredentialRejected(message),
                None => PaAuthError::contract(
                    "login error message",
                    format!("login answered {status} without an alert"),
                ),
            });
        }

        let location = location_header(&response).ok_or_else(|| {
            PaAuthError::contract("Location header", format!("login answered {status}"))
        })?;
        let target = self.config.portal_url(&location)?;

        if target.origin() != self.config.portal_base.origin() {
            return Err(PaAuthError::UnexpectedRedirect {
                location: target.to_string(),
            });
        }

        Ok(target)
    }

    /// Follow portal redirects until one sets the session cookie.
    ///
    /// Each origin met on the way keeps its own jar: `portal_jar` is only ever
    /// sent back to the portal, and the session cookie only counts when the
    /// portal itself sets it.
    #[instrument(skip(self, portal_jar))]
    pub async fn chase_session(&self, first: Url, portal_jar: CookieJar) -> Result<String> {
        let max_hops = self.config.max_redirect_hops;
        let cookie_name = &self.config.session_cookie;
        let portal_origin = self.config.portal_base.origin();
        let mut jars = HashMap::from([(portal_origin.clone(), portal_jar)]);
        let mut next = first;

        for hop in 1..=max_hops {
            let origin = next.origin();
            debug!(hop, url = %next, "Following login redirect");
            let jar = jars.remove(&origin).unwrap_or_default();
            let mut request = self.http.get(next.clone());
            if let Some(cookies) = jar.header_value() {
                request = request.header(COOKIE, cookies);
            }
            let response = request.send().await?;

            if origin == portal_origin {
                if let Some(value) = find_set_cookie(response.headers(), cookie_name) {
                    debug!(hop, "Session cookie found");
                    return Ok(value);
                }
            }

            jars.insert(origin, jar.merge_response(response.headers()));
            match location_header(&response) {
                Some(location) => next = self.config.portal_url(&location)?,
                None => {
                    return Err(PaAuthError::SessionCookieNotFound {
                        cookie: cookie_name.clone(),
                    });
                }
            }
        }

        Err(PaAuthError::RedirectBudgetExceeded { hops: max_hops })
    }
}

#[async_trait::async_trait]
impl Authenticator for MonidenumAuthenticator {
    type Bearer = MonidenumSession;

    const SERVICE: &'static str = "monidenum";

    #[instrument(skip(self, credential))]
    async fn authenticate(&self, credential: &Credential) -> Result<MonidenumSession> {
        let (authorize_url, portal_jar) = self.start_login().await?;
        let (action, idp_jar) = self.fetch_login_form(&authorize_url).await?;
        let first_hop = self.submit_credentials(&action, &idp_jar, credential).await?;
        let value = self.chase_session(first_hop, portal_jar).await?;

        info!("Logged in to monidenum");
        Ok(self.session(value))
    }
}

/// First `action="..."` of the page, `&amp;` decoded
pub fn extract_form_action(html: &str) -> Option<String> {
    FORM_ACTION
        .captures(html)
        .map(|caps| caps[1].replace("&amp;", "&"))
}

/// Text of the first element with an `alert` or `alert-*` class
pub fn extract_alert(html: &str) -> Option<String> {
    let inner = ALERT.captures(html)?;
    let text = TAG.replace_all(&inner[1], " ");
    let text = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("&#39;", "'");

    (!text.is_empty()).then_some(text)
}
