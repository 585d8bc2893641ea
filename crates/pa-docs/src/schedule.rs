use chrono::NaiveDate;
use pa_auth::{UrssafAuthenticator, UrssafSession};
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::errors::{DocsError, Result};

/// One due date of the yearly contribution schedule
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Echeance {
    pub montant_total: f64,
    pub montant_non_paye: f64,
    #[serde(default)]
    pub paiement: Option<Paiement>,
    pub exigibilite: Exigibilite,
    #[serde(default)]
    pub etat_echeance: Option<String>,
}

impl Echeance {
    pub fn montant_paye(&self) -> f64 {
        self.paiement.as_ref().map_or(0.0, |p| p.montant_paye)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Paiement {
    #[serde(default)]
    pub montant_paye: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exigibilite {
    pub date_exigibilite: NaiveDate,
}

/// Totals over a schedule
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScheduleSummary {
    pub count: usize,
    pub montant_total: f64,
    pub montant_non_paye: f64,
    pub montant_paye: f64,
}

impl ScheduleSummary {
    pub fn from_entries(entries: &[Echeance]) -> Self {
        entries.iter().fold(Self::default(), |acc, e| Self {
            count: acc.count + 1,
            montant_total: acc.montant_total + e.montant_total,
            montant_non_paye: acc.montant_non_paye + e.montant_non_paye,
            montant_paye: acc.montant_paye + e.montant_paye(),
        })
    }
}

/// Reads the yearly self-employed (TIPL) contribution schedule
#[derive(Debug, Clone)]
pub struct ScheduleClient {
    http: Client,
    url: Url,
}

impl ScheduleClient {
    pub fn new(http: Client, echeances_url: Url) -> Self {
        Self {
            http,
            url: echeances_url,
        }
    }

    /// Reuse the authenticator's HTTP client and API host
    pub fn from_authenticator(auth: &UrssafAuthenticator) -> Result<Self> {
        Ok(Self::new(auth.http().clone(), auth.config().echeances_url()?))
    }

    #[instrument(skip(self, session), fields(siret = %session.account.siret))]
    pub async fn fetch(&self, session: &UrssafSession, year: i32) -> Result<Vec<Echeance>> {
        let account = &session.account;
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("siret", &account.siret)
            .append_pair("categorie", "TIPL")
            .append_pair("orga", &account.orga)
            .append_pair("numCot", &account.numc)
            .append_pair("view", "ECHEANCIER_ANNUEL")
            .append_pair("annee", &year.to_string());

        let correlation_id = Uuid::new_v4();
        debug!(%correlation_id, "Fetching schedule");
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", session.access_token))
            .header("Correlation-ID", correlation_id.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DocsError::fetch_failed(response).await);
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pa_auth::AccountContext;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> UrssafSession {
        UrssafSession {
            account: AccountContext {
                siret: "12345678900011".to_string(),
                orga: "117".to_string(),
                numc: "987654".to_string(),
            },
            access_token: "at-1".to_string(),
        }
    }

    fn client(server: &MockServer) -> ScheduleClient {
        let url = Url::parse(&format!("{}/v1/echeances", server.uri())).unwrap();
        ScheduleClient::new(Client::new(), url)
    }

    #[tokio::test]
    async fn test_fetch_and_sum() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/echeances"))
            .and(header("authorization", "Bearer at-1"))
            .and(header_exists("correlation-id"))
            .and(query_param("siret", "12345678900011"))
            .and(query_param("categorie", "TIPL"))
            .and(query_param("orga", "117"))
            .and(query_param("numCot", "987654"))
            .and(query_param("view", "ECHEANCIER_ANNUEL"))
            .and(query_param("annee", "2025"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "montantTotal": 1200.5,
                    "montantNonPaye": 200.25,
                    "paiement": {"montantPaye": 1000.25},
                    "exigibilite": {"dateExigibilite": "2025-02-05"},
                    "etatEcheance": "PAYEE_PARTIELLEMENT"
                },
                {
                    "montantTotal": 800.0,
                    "montantNonPaye": 800.0,
                    "paiement": {"montantPaye": 0.0},
                    "exigibilite": {"dateExigibilite": "2025-05-05"},
                    "etatEcheance": "A_PAYER"
                }
            ])))
            .mount(&server)
            .await;

        let entries = client(&server).fetch(&session(), 2025).await.unwrap();
        let summary = ScheduleSummary::from_entries(&entries);

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].exigibilite.date_exigibilite,
            NaiveDate::from_ymd_opt(2025, 2, 5).unwrap()
        );
        assert_eq!(
            summary,
            ScheduleSummary {
                count: 2,
                montant_total: 1200.5 + 800.0,
                montant_non_paye: 200.25 + 800.0,
                montant_paye: 1000.25 + 0.0,
            }
        );
    }

    #[tokio::test]
    async fn test_correlation_id_is_fresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/echeances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = client(&server);
        client.fetch(&session(), 2025).await.unwrap();
        client.fetch(&session(), 2025).await.unwrap();

        let ids: Vec<_> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.headers.get("correlation-id").unwrap().clone())
            .collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn test_unauthorized_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/echeances"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let err = client(&server).fetch(&session(), 2025).await.unwrap_err();
        assert!(matches!(
            err,
            DocsError::ResourceFetchFailed { status, .. } if status.as_u16() == 401
        ));
    }

    #[test]
    fn test_summary_missing_payment() {
        let entry: Echeance = serde_json::from_str(
            r#"{"montantTotal": 10.0, "montantNonPaye": 10.0, "exigibilite": {"dateExigibilite": "2025-11-05"}}"#,
        )
        .unwrap();

        let summary = ScheduleSummary::from_entries(&[entry]);
        assert_eq!(summary.montant_paye, 0.0);
        assert_eq!(summary.count, 1);
        assert_eq!(ScheduleSummary::from_entries(&[]), ScheduleSummary::default());
    }
}
