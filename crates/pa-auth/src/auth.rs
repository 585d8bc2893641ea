use reqwest::header::LOCATION;

use crate::credentials::Credential;
use crate::errors::Result;

/// A portal login handshake turning a credential into a bearer value
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// What subsequent API calls authenticate with
    type Bearer: Send;

    /// Secret store namespace of this portal
    const SERVICE: &'static str;

    /// Run the whole handshake; any failed step aborts it
    async fn authenticate(&self, credential: &Credential) -> Result<Self::Bearer>;
}

/// Raw `Location` header of a response, if it is valid text
pub(crate) fn location_header(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
