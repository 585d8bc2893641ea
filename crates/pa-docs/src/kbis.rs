use std::path::{Path, PathBuf};
use std::sync::Arc;

use pa_auth::config::monidenum;
use pa_auth::{MonidenumAuthenticator, MonidenumSession};
use reqwest::Client;
use reqwest::header::COOKIE;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::directory::{Company, DirectoryParser, HtmlTableDirectoryParser};
use crate::errors::{DocsError, Result};

/// Answer of the KBIS generation endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct KbisResponse {
    pub success: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Lists the account's companies and downloads their KBIS extract
#[derive(Clone)]
pub struct KbisClient {
    http: Client,
    portal_base: Url,
    parser: Arc<dyn DirectoryParser>,
}

impl KbisClient {
    pub fn new(http: Client, portal_base: Url) -> Self {
        Self::with_parser(http, portal_base, Arc::new(HtmlTableDirectoryParser))
    }

    pub fn with_parser(http: Client, portal_base: Url, parser: Arc<dyn DirectoryParser>) -> Self {
        Self {
            http,
            portal_base,
            parser,
        }
    }

    /// Reuse the authenticator's HTTP client and portal origin
    pub fn from_authenticator(auth: &MonidenumAuthenticator) -> Self {
        Self::new(auth.http().clone(), auth.config().portal_base.clone())
    }

    #[instrument(skip(self, session))]
    pub async fn list_companies(&self, session: &MonidenumSession) -> Result<Vec<Company>> {
        let response = self
            .http
            .get(self.portal_base.join(monidenum::COMPANIES_PATH)?)
            .header(COOKIE, session.cookie_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DocsError::fetch_failed(response).await);
        }

        let html = response.text().await?;
        let companies = self.parser.parse(&html);
        debug!(count = companies.len(), "Parsed company listing");
        Ok(companies)
    }

    /// Ask the portal to generate the extract; returns where to download it
    #[instrument(skip(self, session))]
    pub async fn request_document(
        &self,
        session: &MonidenumSession,
        company_id: &str,
    ) -> Result<Url> {
        let response = self
            .http
            .post(self.portal_base.join(monidenum::KBIS_GET_PATH)?)
            .header(COOKIE, session.cookie_header())
            .form(&[("idEntreprise", company_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DocsError::fetch_failed(response).await);
        }

        let kbis: KbisResponse = response.json().await?;
        if !kbis.success {
            return Err(DocsError::DocumentRejected(
                kbis.message
                    .unwrap_or_else(|| "no reason given".to_string()),
            ));
        }

        let url = kbis
            .url
            .ok_or_else(|| DocsError::InvalidResponse("KBIS answer without url".to_string()))?;
        Ok(self.portal_base.join(&url)?)
    }

    #[instrument(skip(self, session))]
    pub async fn download(&self, session: &MonidenumSession, url: Url) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .header(COOKIE, session.cookie_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DocsError::fetch_failed(response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Generate then download the extract of one company
    pub async fn fetch_document(
        &self,
        session: &MonidenumSession,
        company: &Company,
    ) -> Result<Vec<u8>> {
        let url = self.request_document(session, &company.id).await?;
        self.download(session, url).await
    }
}

/// Write the extract as `kbis-<SIREN>.pdf` in `dir`, replacing any previous one
#[instrument(skip(bytes), fields(size = bytes.len()))]
pub async fn save_document(dir: &Path, company: &Company, bytes: &[u8]) -> Result<PathBuf> {
    let write_failed = |path: &Path, source: std::io::Error| {
        error!("Failed to write {}: {}", path.display(), source);
        DocsError::FileWriteFailed {
            path: path.to_path_buf(),
            source,
        }
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| write_failed(dir, e))?;

    let stem: String = company
        .identifier
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let path = dir.join(format!("kbis-{}.pdf", if stem.is_empty() { &company.id } else { &stem }));

    // Write to a temp file then rename
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, bytes)
        .await
        .map_err(|e| write_failed(&temp_path, e))?;
    tokio::fs::rename(&temp_path, &path)
        .await
        .map_err(|e| write_failed(&path, e))?;

    info!("Saved KBIS of '{}' to {}", company.name, path.display());
    Ok(path)
}
