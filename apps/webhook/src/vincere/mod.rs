/// Vincere client: the single point of entry for all calls to the Vincere REST API.
///
/// Token acquisition lives in `auth`; the create-or-update flow lives in `upsert`
/// and talks to Vincere only through the `CandidateApi` trait.
use async_trait::async_trait;
use reqwest::{multipart, Client, Method, RequestBuilder, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::VincereConfig;
use crate::models::candidate::{LookupKey, ResumeAttachment};

pub mod auth;
pub mod models;
pub mod upsert;

use auth::AccessToken;
use models::{
    parse_search_results, CandidateId, CandidatePayload, CreatedCandidate, ExistingCandidate,
    UpstreamResult,
};

const CANDIDATES_PATH: &str = "/v2/candidates";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Vincere {operation} returned {}", .result.status_code)]
    Status {
        operation: &'static str,
        result: UpstreamResult,
    },

    #[error("Vincere {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Vincere {operation} response was malformed: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },
}

impl UpstreamError {
    /// Downstream HTTP status, when Vincere answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { result, .. } => Some(result.status_code),
            _ => None,
        }
    }

    /// Downstream response body, when there is one worth returning.
    pub fn details(&self) -> Option<String> {
        match self {
            UpstreamError::Status { result, .. } => Some(result.body_excerpt()),
            _ => None,
        }
    }
}

/// Candidate operations the upsert flow needs from Vincere.
/// `VincereClient` is the HTTP implementation; tests substitute a fake.
#[async_trait]
pub trait CandidateApi: Send + Sync {
    async fn find_candidate(
        &self,
        token: &AccessToken,
        key: &LookupKey,
    ) -> Result<Option<ExistingCandidate>, UpstreamError>;

    async fn create_candidate(
        &self,
        token: &AccessToken,
        candidate: &CandidatePayload,
    ) -> Result<CandidateId, UpstreamError>;

    async fn update_candidate(
        &self,
        token: &AccessToken,
        id: &CandidateId,
        candidate: &CandidatePayload,
    ) -> Result<(), UpstreamError>;

    async fn upload_resume(
        &self,
        token: &AccessToken,
        id: &CandidateId,
        resume: &ResumeAttachment,
    ) -> Result<(), UpstreamError>;
}

#[derive(Clone)]
pub struct VincereClient {
    client: Client,
    base_url: String,
    tenant_id: String,
    api_key: Option<String>,
}

impl VincereClient {
    pub fn new(client: Client, config: &VincereConfig) -> Self {
        Self {
            client,
            base_url: config.base_url(),
            tenant_id: config.tenant_header().to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn request(&self, method: Method, path: &str, token: &AccessToken) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", token.bearer())
            .header("tenantId", &self.tenant_id);
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    async fn send(
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<String, UpstreamError> {
        let response = builder
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { operation, source })?;
        Self::read_success(operation, response).await
    }

    /// Returns the body of a 2xx response; anything else becomes `UpstreamError::Status`.
    async fn read_success(
        operation: &'static str,
        response: Response,
    ) -> Result<String, UpstreamError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| UpstreamError::Transport { operation, source })?;

        if status.is_success() {
            info!("Vincere {} returned {}", operation, status);
            return Ok(body);
        }

        let result = UpstreamResult {
            status_code: status.as_u16(),
            body,
        };
        warn!(
            "Vincere {} returned {}: {}",
            operation,
            status,
            result.body_excerpt()
        );
        Err(UpstreamError::Status { operation, result })
    }
}

#[async_trait]
impl CandidateApi for VincereClient {
    async fn find_candidate(
        &self,
        token: &AccessToken,
        key: &LookupKey,
    ) -> Result<Option<ExistingCandidate>, UpstreamError> {
        const OP: &str = "candidate search";
        let filter = key.filter_expression();
        debug!("Searching Vincere candidates with {}", filter);

        let builder = self
            .request(Method::GET, &format!("{CANDIDATES_PATH}/search"), token)
            .query(&[("q", filter.as_str())]);
        let body = Self::send(OP, builder).await?;

        let mut matches = parse_search_results(&body).map_err(|e| UpstreamError::Malformed {
            operation: OP,
            message: e.to_string(),
        })?;
        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        })
    }

    async fn create_candidate(
        &self,
        token: &AccessToken,
        candidate: &CandidatePayload,
    ) -> Result<CandidateId, UpstreamError> {
        const OP: &str = "candidate create";
        let builder = self
            .request(Method::POST, CANDIDATES_PATH, token)
            .json(candidate);
        let body = Self::send(OP, builder).await?;

        serde_json::from_str::<CreatedCandidate>(&body)
            .ok()
            .and_then(|created| created.id)
            .ok_or_else(|| UpstreamError::Malformed {
                operation: OP,
                message: "response did not contain a candidate id".to_string(),
            })
    }

    async fn update_candidate(
        &self,
        token: &AccessToken,
        id: &CandidateId,
        candidate: &CandidatePayload,
    ) -> Result<(), UpstreamError> {
        let builder = self
            .request(Method::PATCH, &format!("{CANDIDATES_PATH}/{id}"), token)
            .json(candidate);
        Self::send("candidate update", builder).await.map(|_| ())
    }

    async fn upload_resume(
        &self,
        token: &AccessToken,
        id: &CandidateId,
        resume: &ResumeAttachment,
    ) -> Result<(), UpstreamError> {
        const OP: &str = "resume upload";
        let part = multipart::Part::bytes(resume.bytes.to_vec())
            .file_name(resume.file_name.clone())
            .mime_str(&resume.content_type)
            .map_err(|source| UpstreamError::Transport {
                operation: OP,
                source,
            })?;
        let form = multipart::Form::new().part("file", part);

        let builder = self
            .request(Method::POST, &format!("{CANDIDATES_PATH}/{id}/files"), token)
            .multipart(form);
        Self::send(OP, builder).await.map(|_| ())
    }
}
