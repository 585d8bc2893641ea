use std::path::PathBuf;

use pa_auth::PaAuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocsError {
    #[error(transparent)]
    Auth(#[from] PaAuthError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request failed with HTTP {status}: {body_snippet}")]
    ResourceFetchFailed {
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    #[error("Document refused by the portal: {0}")]
    DocumentRejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Failed to write {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DocsError {
    /// Build a `ResourceFetchFailed` from a non-success response
    pub(crate) async fn fetch_failed(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::ResourceFetchFailed {
            status,
            body_snippet: body.chars().take(200).collect(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocsError>;
