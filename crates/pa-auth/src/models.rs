use base64::Engine;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};

use crate::errors::{PaAuthError, Result};

/// Account identifiers carried by the `ctxUrssaf` cookie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountContext {
    pub siret: String,
    pub orga: String,
    /// Contribution account number, `numCot` in the schedule API
    #[serde(alias = "numCot")]
    pub numc: String,
}

/// Decoded `ctxUrssaf` cookie
#[derive(Debug, Clone, Deserialize)]
pub struct ContextCookie {
    pub compte: AccountContext,
}

/// Standard alphabet, padding optional: the portal has sent both forms
const COOKIE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode the base64 JSON account context set at login.
///
/// The value is not verified in any way; it is trusted on the strength of TLS.
pub fn decode_context_cookie(value: &str) -> Result<AccountContext> {
    let value = value.trim().trim_matches('"').replace("%3D", "=").replace("%3d", "=");

    let bytes = COOKIE_BASE64
        .decode(value.as_bytes())
        .map_err(|e| PaAuthError::contract("base64 ctxUrssaf cookie", e.to_string()))?;
    let json = String::from_utf8(bytes)
        .map_err(|e| PaAuthError::contract("UTF-8 ctxUrssaf cookie", e.to_string()))?;
    let cookie: ContextCookie = serde_json::from_str(&json)
        .map_err(|e| PaAuthError::contract("ctxUrssaf.compte JSON", e.to_string()))?;

    Ok(cookie.compte)
}

/// Public portal configuration, only the OIDC client id is read
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub oidc: OidcSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OidcSection {
    pub annabel: OidcClient,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcClient {
    pub client_id: String,
}

/// OAuth token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};

    const CONTEXT_JSON: &str = r#"{"compte":{"siret":"X","orga":"Y","numc":"Z"}}"#;

    #[test]
    fn test_decode_context_cookie() {
        let context = decode_context_cookie(&STANDARD.encode(CONTEXT_JSON)).unwrap();
        assert_eq!(
            context,
            AccountContext {
                siret: "X".to_string(),
                orga: "Y".to_string(),
                numc: "Z".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_unpadded_and_percent_encoded() {
        let json = r#"{"compte":{"siret":"12345678900011","orga":"117","numCot":"987"}}"#;

        let unpadded = decode_context_cookie(&STANDARD_NO_PAD.encode(json)).unwrap();
        let escaped = decode_context_cookie(&STANDARD.encode(json).replace('=', "%3D")).unwrap();

        assert_eq!(unpadded.numc, "987");
        assert_eq!(unpadded, escaped);
    }

    #[test]
    fn test_decode_garbage_is_contract_error() {
        let err = decode_context_cookie("!!not base64!!").unwrap_err();
        assert!(matches!(err, PaAuthError::ProtocolContract { .. }));

        let err = decode_context_cookie(&STANDARD.encode(r#"{"other":1}"#)).unwrap_err();
        assert!(matches!(
            err,
            PaAuthError::ProtocolContract {
                artifact: "ctxUrssaf.compte JSON",
                ..
            }
        ));
    }

    #[test]
    fn test_portal_config_client_id() {
        let config: PortalConfig = serde_json::from_str(
            r#"{"oidc":{"annabel":{"clientId":"abc","issuer":"x"}},"other":true}"#,
        )
        .unwrap();
        assert_eq!(config.oidc.annabel.client_id, "abc");
    }
}
