use thiserror::Error;

/// Portal authentication error types
#[derive(Error, Debug)]
pub enum PaAuthError {
    #[error("No login entered - authentication cancelled")]
    UserCancelled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body_snippet}")]
    Http {
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    /// The portal explicitly refused the login/password pair
    #[error("Login rejected: {0}")]
    CredentialRejected(String),

    /// An artifact the portal always sent is missing or malformed; its API changed
    #[error("Portal contract changed - expected {artifact}: {detail}")]
    ProtocolContract { artifact: &'static str, detail: String },

    #[error("Login redirected outside the expected origin: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Session cookie not found after {hops} redirects")]
    RedirectBudgetExceeded { hops: usize },

    #[error("Session cookie {cookie} not found: redirect chain ended")]
    SessionCookieNotFound { cookie: String },

    #[error("Session lifetime out of range: {0:?}")]
    TtlOutOfRange(std::time::Duration),

    #[error("OS random source unavailable: {0}")]
    Random(String),

    #[error("Secret store error: {0}")]
    Keyring(String),

    #[error("Terminal prompt failed: {0}")]
    Prompt(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl PaAuthError {
    pub(crate) fn contract(artifact: &'static str, detail: impl Into<String>) -> Self {
        Self::ProtocolContract {
            artifact,
            detail: detail.into(),
        }
    }

    /// Build an `Http` error from a failed response, keeping a short body excerpt
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::Http {
            status,
            body_snippet: body.chars().take(200).collect(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PaAuthError>;
