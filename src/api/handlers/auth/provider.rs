//! External identity provider profile fetch.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Profile fields returned by the provider for a valid access token.
#[derive(Clone, Debug)]
pub struct ExternalProfile {
    pub subject_id: String,
    pub email: String,
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl ExternalProfile {
    /// Human-readable name for the link-confirmation screen.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The access token was rejected by the provider.
    #[error("invalid provider access token")]
    InvalidToken,
    /// The provider could not be reached or answered unexpectedly.
    #[error("identity provider unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct GoogleUserinfo {
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: bool,
    given_name: Option<String>,
    family_name: Option<String>,
}

/// Fetches profiles from Google's OAuth2 userinfo endpoint.
pub struct GoogleIdentityProvider {
    client: reqwest::Client,
    userinfo_url: String,
}

impl GoogleIdentityProvider {
    /// Build a provider client for the configured userinfo endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(userinfo_url: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build identity provider HTTP client")?;
        Ok(Self {
            client,
            userinfo_url,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, ProviderError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("userinfo request failed")?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::InvalidToken);
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(anyhow!(
                "userinfo fetch failed: {status}"
            )));
        }

        let userinfo: GoogleUserinfo = response
            .json()
            .await
            .context("invalid userinfo response body")?;

        Ok(ExternalProfile {
            subject_id: userinfo.sub,
            email: userinfo.email,
            email_verified: userinfo.email_verified,
            given_name: userinfo.given_name,
            family_name: userinfo.family_name,
        })
    }
}
