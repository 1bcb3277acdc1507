//! OAuth2 client-credentials token acquisition.
//!
//! A token is fetched for every inbound webhook. Nothing is cached.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::VincereConfig;
use crate::models::excerpt;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token response did not contain an access_token")]
    MissingToken,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub obtained_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Clone)]
pub struct TokenProvider {
    client: Client,
    auth_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenProvider {
    pub fn new(client: Client, config: &VincereConfig) -> Self {
        Self {
            client,
            auth_url: config.auth_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    pub async fn fetch(&self) -> Result<AccessToken, AuthError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self.client.post(&self.auth_url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Token endpoint returned {}: {}", status, excerpt(&body, 512));
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let value = serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .and_then(|t| t.access_token)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        debug!("Obtained Vincere access token");
        Ok(AccessToken {
            value,
            obtained_at: Utc::now(),
        })
    }
}
