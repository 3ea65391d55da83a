use serde::{Deserialize, Serialize};
use ureq::{http::Request, Agent};

use super::context::{Credentials, STContext};
use crate::error::{APIError, APIResult};
use crate::Environment;

/// A context paired with the credential bundle that produced it.
///
/// `ServiceTitan` access tokens only live for a few minutes, so long-running
/// callers keep the bundle around and re-authenticate between pulls.
pub struct RefreshableContext {
    pub(crate) context: STContext,
    pub(crate) credentials: Credentials,
}

impl RefreshableContext {
    /// Requests a fresh access token using the stored client credentials
    ///
    /// # Errors
    ///
    /// Fails if the token request cannot be sent or is rejected.
    pub fn refresh_access_token(&mut self, client: &Agent) -> APIResult<()> {
        let token = request_access_token(
            self.context.environment,
            &self.credentials.client_id,
            &self.credentials.client_secret,
            client,
        )?;

        self.context.access_token = token.access_token;
        self.context.expires_at =
            chrono::Utc::now() + chrono::Duration::seconds(token.expires_in as i64);

        Ok(())
    }
}

pub(crate) fn request_access_token(
    environment: Environment,
    client_id: &str,
    client_secret: &str,
    client: &Agent,
) -> APIResult<AuthTokenResponse> {
    let form = format!(
        "grant_type=client_credentials&client_id={}&client_secret={}",
        urlencoding::encode(client_id),
        urlencoding::encode(client_secret)
    );

    let request = Request::post(environment.auth_url())
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("Accept", "application/json")
        .body(form)?;

    let response = client.run(request)?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.into_body().read_to_string()?;
        return Err(APIError::BadTokenRequest(format!("{status}: {body}")));
    }

    Ok(response.into_body().read_json()?)
}

#[derive(Serialize, Deserialize)]
pub(crate) struct AuthTokenResponse {
    pub token_type: String,
    pub expires_in: u64,
    pub access_token: String,
}

impl std::ops::Deref for RefreshableContext {
    type Target = STContext;
    fn deref(&self) -> &Self::Target {
        &self.context
    }
}
