use std::time::Duration;
use url::Url;

use crate::errors::Result;

/// URSSAF portal endpoints
pub mod urssaf {
    pub const LOGIN: &str = "https://login.urssaf.fr/cnx";
    pub const PORTAL_CONFIG: &str = "https://mon.urssaf.fr/assets/config/config.json";
    pub const API_BASE: &str = "https://api.urssaf.fr";
    pub const REDIRECT_URI: &str = "https://mon.urssaf.fr/callback";

    pub const AUTHORIZE_PATH: &str = "/api/oauth/v1/authorize";
    pub const TOKEN_PATH: &str = "/api/oauth/v1/token";
    pub const ECHEANCES_PATH: &str = "/v1/echeances";

    pub const SCOPE: &str = "openid profile";
    /// Discriminator the authorization server expects at the end of `state`
    pub const STATE_SUFFIX: &str = "_annabel";
    pub const SUBJECT_TOKEN_TYPE: &str = "urn:urssaf:params:oauth:token-type:bds";

    /// Cookie carrying the base64 JSON account context
    pub const CONTEXT_COOKIE: &str = "ctxUrssaf";
    /// Query parameter of the post-login `Location` holding the subject token
    pub const SUBJECT_TOKEN_PARAM: &str = "tokenBds";
}

/// monidenum portal endpoints
pub mod monidenum {
    pub const PORTAL_BASE: &str = "https://www.monidenum.fr";

    pub const LOGIN_PATH: &str = "/login";
    pub const COMPANIES_PATH: &str = "/mon-espace/gestion-kbis-scoring";
    pub const KBIS_GET_PATH: &str = "/mon-espace/gestion-kbis-scoring/kbis/get";

    pub const AUTH_SESSION_COOKIE: &str = "AUTH_SESSION_ID";
    pub const SESSION_COOKIE: &str = "PHPSESSID";
}

/// Portal session cookies observed to stay valid for about this long
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Hops after the login POST within which the portal has always set its session cookie
pub const DEFAULT_MAX_REDIRECT_HOPS: usize = 5;

pub const DEFAULT_USER_AGENT: &str = concat!("paperasse/", env!("CARGO_PKG_VERSION"));

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Build the HTTP client shared by a handshake and its resource calls.
///
/// Redirects are never followed automatically: every hop is inspected by hand.
pub fn build_http_client(timeouts: &HttpTimeouts, user_agent: &str) -> Result<reqwest::Client> {
    let http = reqwest::Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    Ok(http)
}

/// Configuration for the URSSAF OIDC-PKCE handshake
#[derive(Debug, Clone)]
pub struct UrssafConfig {
    pub login_url: Url,
    /// Public JSON document exposing `oidc.annabel.clientId`
    pub portal_config_url: Url,
    /// Host of the OAuth endpoints and of the schedule API
    pub api_base: Url,
    pub redirect_uri: String,
    pub scope: String,
    pub state_suffix: String,
    pub subject_token_type: String,
    pub http_timeouts: HttpTimeouts,
    pub user_agent: String,
}

impl UrssafConfig {
    pub fn production() -> Result<Self> {
        Ok(Self {
            login_url: Url::parse(urssaf::LOGIN)?,
            portal_config_url: Url::parse(urssaf::PORTAL_CONFIG)?,
            api_base: Url::parse(urssaf::API_BASE)?,
            redirect_uri: urssaf::REDIRECT_URI.to_string(),
            scope: urssaf::SCOPE.to_string(),
            state_suffix: urssaf::STATE_SUFFIX.to_string(),
            subject_token_type: urssaf::SUBJECT_TOKEN_TYPE.to_string(),
            http_timeouts: HttpTimeouts::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Point every endpoint at a single host (mock servers, staging)
    pub fn with_base(base: &Url) -> Result<Self> {
        Ok(Self {
            login_url: base.join("/cnx")?,
            portal_config_url: base.join("/config.json")?,
            api_base: base.clone(),
            ..Self::production()?
        })
    }

    pub fn authorize_url(&self) -> Result<Url> {
        Ok(self.api_base.join(urssaf::AUTHORIZE_PATH)?)
    }

    pub fn token_url(&self) -> Result<Url> {
        Ok(self.api_base.join(urssaf::TOKEN_PATH)?)
    }

    pub fn echeances_url(&self) -> Result<Url> {
        Ok(self.api_base.join(urssaf::ECHEANCES_PATH)?)
    }
}

/// Configuration for the monidenum redirect-chase handshake
#[derive(Debug, Clone)]
pub struct MonidenumConfig {
    pub portal_base: Url,
    pub auth_session_cookie: String,
    pub session_cookie: String,
    pub session_ttl: Duration,
    pub max_redirect_hops: usize,
    pub http_timeouts: HttpTimeouts,
    pub user_agent: String,
}

impl MonidenumConfig {
    pub fn production() -> Result<Self> {
        Self::with_base(&Url::parse(monidenum::PORTAL_BASE)?)
    }

    pub fn with_base(base: &Url) -> Result<Self> {
        Ok(Self {
            portal_base: base.clone(),
            auth_session_cookie: monidenum::AUTH_SESSION_COOKIE.to_string(),
            session_cookie: monidenum::SESSION_COOKIE.to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            max_redirect_hops: DEFAULT_MAX_REDIRECT_HOPS,
            http_timeouts: HttpTimeouts::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Resolve a path or a relative `Location` against the portal origin
    pub fn portal_url(&self, location: &str) -> Result<Url> {
        Ok(self.portal_base.join(location)?)
    }
}
