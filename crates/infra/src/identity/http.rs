//! Identity provider reached over a JSON/HTTP API.
//!
//! Routes (relative to the configured base URL):
//!
//! ```text
//! POST   /accounts                  {email, password, displayName} -> {id}
//! PUT    /accounts/{id}/attributes  {role, ...}
//! PATCH  /accounts/{id}             {disabled}
//! DELETE /accounts/{id}
//! GET    /accounts/{id}             -> IdentityAccount
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use staffgate_core::{CustomClaims, StaffId};

use super::{AccountUpdate, IdentityAccount, IdentityError, IdentityProvider, NewIdentity};

#[derive(Debug, Deserialize)]
struct CreatedAccount {
    id: StaffId,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

/// HTTP client for a remote identity provider.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpIdentityProvider {
    /// Build a client for `base_url`. `timeout` bounds each HTTP exchange.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(IdentityError::InvalidArgument(format!(
                "identity provider URL must be http(s): {base_url}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn account_path(id: &StaffId) -> String {
        format!("/accounts/{}", id)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, IdentityError> {
        let req = match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };

        let resp = req
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("HTTP request failed: {e}")))?;

        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(error_from_response(resp).await)
    }
}

async fn error_from_response(resp: Response) -> IdentityError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                format!("HTTP {status} from identity provider")
            } else {
                body
            }
        });

    match status {
        StatusCode::NOT_FOUND => IdentityError::NotFound(message),
        StatusCode::CONFLICT => IdentityError::AlreadyExists(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            IdentityError::InvalidArgument(message)
        }
        s if s.is_server_error() => IdentityError::Unavailable(message),
        _ => IdentityError::Provider(message),
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn create_account(&self, account: &NewIdentity) -> Result<StaffId, IdentityError> {
        let resp = self
            .send(self.client.post(self.url("/accounts")).json(account))
            .await?;

        let created: CreatedAccount = resp
            .json()
            .await
            .map_err(|e| IdentityError::Provider(format!("Failed to parse response: {e}")))?;
        Ok(created.id)
    }

    async fn set_custom_attributes(
        &self,
        id: &StaffId,
        claims: &CustomClaims,
    ) -> Result<(), IdentityError> {
        let path = format!("{}/attributes", Self::account_path(id));
        self.send(self.client.put(self.url(&path)).json(&claims.to_attributes()))
            .await
            .map(|_| ())
    }

    async fn update_account(&self, id: &StaffId, update: &AccountUpdate) -> Result<(), IdentityError> {
        self.send(self.client.patch(self.url(&Self::account_path(id))).json(update))
            .await
            .map(|_| ())
    }

    async fn delete_account(&self, id: &StaffId) -> Result<(), IdentityError> {
        self.send(self.client.delete(self.url(&Self::account_path(id))))
            .await
            .map(|_| ())
    }

    async fn get_account(&self, id: &StaffId) -> Result<Option<IdentityAccount>, IdentityError> {
        match self.send(self.client.get(self.url(&Self::account_path(id)))).await {
            Ok(resp) => resp
                .json()
                .await
                .map(Some)
                .map_err(|e| IdentityError::Provider(format!("Failed to parse response: {e}"))),
            Err(IdentityError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
