//! Per-attempt PKCE (RFC 7636, S256 only) and OIDC `state`/`nonce` material.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::errors::{PaAuthError, Result};

/// Random values for one authorization attempt; never persisted or reused.
#[derive(Clone)]
pub struct PkceMaterial {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
    pub nonce: String,
}

impl PkceMaterial {
    /// Fresh verifier, challenge, state and nonce from the OS RNG.
    ///
    /// `state_suffix` is appended verbatim to the random state.
    pub fn generate(state_suffix: &str) -> Result<Self> {
        let code_verifier = random_token()?;
        let code_challenge = s256_challenge(&code_verifier);

        Ok(Self {
            code_verifier,
            code_challenge,
            state: format!("{}{}", random_token()?, state_suffix),
            nonce: random_token()?,
        })
    }
}

impl std::fmt::Debug for PkceMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceMaterial")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// 32 random bytes, base64url without padding (43 characters)
fn random_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|e| PaAuthError::Random(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// BASE64URL(SHA256(ASCII(code_verifier)))
pub fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc7636_vector() {
        assert_eq!(
            s256_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generate_shape() {
        let pkce = PkceMaterial::generate("_annabel").unwrap();

        assert_eq!(pkce.code_verifier.len(), 43);
        assert_eq!(pkce.code_challenge, s256_challenge(&pkce.code_verifier));
        assert!(pkce.state.ends_with("_annabel"));
        assert_eq!(pkce.nonce.len(), 43);
        assert!(
            pkce.code_verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_generate_is_fresh() {
        let a = PkceMaterial::generate("").unwrap();
        let b = PkceMaterial::generate("").unwrap();

        assert_ne!(a.code_verifier, b.code_verifier);
        assert_ne!(a.state, b.state);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.code_verifier, a.nonce);
    }
}
