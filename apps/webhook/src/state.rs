use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::config::Config;
use crate::vincere::auth::TokenProvider;
use crate::vincere::{CandidateApi, VincereClient};

/// Shared application state injected into all route handlers via Axum extractors.
/// Everything here is read-only; requests share nothing mutable.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tokens: TokenProvider,
    /// Candidate API backend. Default: `VincereClient` over HTTP.
    pub vincere: Arc<dyn CandidateApi>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        // One pooled client for every outbound call; the timeout bounds each request.
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let tokens = TokenProvider::new(http.clone(), &config.vincere);
        let vincere = Arc::new(VincereClient::new(http, &config.vincere));

        Ok(Self {
            config,
            tokens,
            vincere,
        })
    }
}
