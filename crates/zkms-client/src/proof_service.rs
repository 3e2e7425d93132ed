//! Proof aggregation service client.
//!
//! ## Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/submit-proof` | Submit a proof, returns a job id |
//! | GET    | `/job-status/{jobId}` | Job status and, once aggregated, the artifacts |
//!
//! Calls are not retried here. The poller retries on its next tick and
//! submission failures go back to the caller.

use std::time::Duration;

use async_trait::async_trait;

use zkms_core::ExternalJobId;

use crate::config::ProofServiceConfig;
use crate::error::ProofServiceError;
use crate::types::{JobOutcome, JobStatusResponse, ProofSubmission, SubmitProofResponse};

/// The proof aggregation service as seen by the coordinator.
#[async_trait]
pub trait ProofSubmissionService: Send + Sync {
    /// Submit a proof for verification and aggregation.
    async fn submit_proof(
        &self,
        submission: &ProofSubmission,
    ) -> Result<SubmitProofResponse, ProofServiceError>;

    /// Fetch the current status of a submitted job.
    async fn job_status(&self, job_id: &ExternalJobId) -> Result<JobOutcome, ProofServiceError>;
}

/// HTTP implementation over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpProofService {
    http: reqwest::Client,
    base_url: url::Url,
}

impl HttpProofService {
    pub fn new(config: ProofServiceConfig) -> Result<Self, ProofServiceError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut key = reqwest::header::HeaderValue::from_str(config.api_key.as_str()).map_err(
            |_| ProofServiceError::Malformed {
                endpoint: "client_init".into(),
                reason: "API key is not a valid header value".into(),
            },
        )?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ProofServiceError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn check(
        endpoint: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, ProofServiceError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
        Err(ProofServiceError::Api {
            endpoint: endpoint.into(),
            status,
            body,
        })
    }
}

#[async_trait]
impl ProofSubmissionService for HttpProofService {
    async fn submit_proof(
        &self,
        submission: &ProofSubmission,
    ) -> Result<SubmitProofResponse, ProofServiceError> {
        let endpoint = "POST /submit-proof";
        let resp = self
            .http
            .post(self.url("submit-proof"))
            .json(submission)
            .send()
            .await
            .map_err(|e| ProofServiceError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        let resp = Self::check(endpoint, resp).await?;
        let parsed: SubmitProofResponse =
            resp.json()
                .await
                .map_err(|e| ProofServiceError::Deserialization {
                    endpoint: endpoint.into(),
                    source: e,
                })?;
        tracing::debug!(
            job_id = %parsed.job_id,
            optimistic = parsed.optimistic_verify_passed(),
            "Proof submitted"
        );
        Ok(parsed)
    }

    async fn job_status(&self, job_id: &ExternalJobId) -> Result<JobOutcome, ProofServiceError> {
        let endpoint = "GET /job-status";
        let encoded: String =
            url::form_urlencoded::byte_serialize(job_id.as_str().as_bytes()).collect();
        let resp = self
            .http
            .get(self.url(&format!("job-status/{encoded}")))
            .send()
            .await
            .map_err(|e| ProofServiceError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        let resp = Self::check(endpoint, resp).await?;
        let parsed: JobStatusResponse =
            resp.json()
                .await
                .map_err(|e| ProofServiceError::Deserialization {
                    endpoint: endpoint.into(),
                    source: e,
                })?;
        tracing::debug!(job_id = %job_id, status = ?parsed.status, "Fetched proof job status");
        parsed.into_outcome()
    }
}
