//! Wire types for the proof aggregation service.
//!
//! Field names follow the relayer API (camelCase). Statuses the coordinator
//! does not act on are kept so that logs show what the service reported.

use serde::{Deserialize, Serialize};

use zkms_core::{ExternalJobId, Hash32};
use zkms_state::AggregationArtifact;

use crate::error::ProofServiceError;

// -- Requests -----------------------------------------------------------------

/// A proof to hand to the aggregation service.
///
/// The coordinator never inspects the proof; `proof`, `public_signals` and
/// `vk` are forwarded as produced by the prover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSubmission {
    /// e.g. `groth16`, `ultraplonk`.
    pub proof_type: String,
    /// Whether `proof_data.vk` is a registered key hash rather than the key.
    #[serde(default)]
    pub vk_registered: bool,
    /// Chain whose aggregation contract receives the batch root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    pub proof_data: ProofData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofData {
    pub proof: serde_json::Value,
    pub public_signals: serde_json::Value,
    pub vk: serde_json::Value,
}

// -- Responses ----------------------------------------------------------------

/// Response to `POST /submit-proof`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProofResponse {
    pub job_id: String,
    /// `"success"` when the service's optimistic verification passed.
    #[serde(default)]
    pub optimistic_verify: Option<String>,
}

impl SubmitProofResponse {
    pub fn optimistic_verify_passed(&self) -> bool {
        self.optimistic_verify.as_deref() == Some("success")
    }
}

/// Job status as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireJobStatus {
    Queued,
    Valid,
    Submitted,
    IncludedInBlock,
    Finalized,
    AggregationPending,
    Aggregated,
    AggregationPublished,
    Failed,
    Rejected,
    /// Forward-compatible catch-all.
    #[serde(other)]
    Unknown,
}

/// Position of a proof inside a published aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationDetails {
    #[serde(default)]
    pub root: Option<Hash32>,
    #[serde(default)]
    pub leaf: Option<Hash32>,
    pub leaf_index: u64,
    pub number_of_leaves: u64,
    pub merkle_proof: Vec<Hash32>,
}

/// Response to `GET /job-status/{jobId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: WireJobStatus,
    #[serde(default)]
    pub aggregation_id: Option<u64>,
    #[serde(default)]
    pub domain_id: Option<u64>,
    #[serde(default)]
    pub aggregation_details: Option<AggregationDetails>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What the tracker should do with a job after a status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Not aggregated yet.
    Pending,
    Aggregated(AggregationArtifact),
    Failed(String),
}

impl JobStatusResponse {
    /// Map the service's status onto the tracker's three states.
    pub fn into_outcome(self) -> Result<JobOutcome, ProofServiceError> {
        match self.status {
            WireJobStatus::Aggregated | WireJobStatus::AggregationPublished => {
                let malformed = |reason: &str| ProofServiceError::Malformed {
                    endpoint: "GET /job-status".into(),
                    reason: format!("job {}: {reason}", self.job_id),
                };
                let aggregation_id = self
                    .aggregation_id
                    .ok_or_else(|| malformed("aggregated without aggregationId"))?;
                let details = self
                    .aggregation_details
                    .ok_or_else(|| malformed("aggregated without aggregationDetails"))?;
                Ok(JobOutcome::Aggregated(AggregationArtifact {
                    aggregation_id,
                    domain_id: self.domain_id.unwrap_or(0),
                    merkle_proof: details.merkle_proof,
                    leaf_count: details.number_of_leaves,
                    leaf_index: details.leaf_index,
                }))
            }
            WireJobStatus::Failed | WireJobStatus::Rejected => Ok(JobOutcome::Failed(
                self.error
                    .unwrap_or_else(|| format!("proof service reported {:?}", self.status)),
            )),
            _ => Ok(JobOutcome::Pending),
        }
    }
}

impl TryFrom<&SubmitProofResponse> for ExternalJobId {
    type Error = ProofServiceError;

    fn try_from(resp: &SubmitProofResponse) -> Result<Self, Self::Error> {
        ExternalJobId::new(resp.job_id.clone()).map_err(|e| ProofServiceError::Malformed {
            endpoint: "POST /submit-proof".into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(json: serde_json::Value) -> JobStatusResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn aggregated_status_maps_to_artifact() {
        let resp = status(serde_json::json!({
            "jobId": "j-1",
            "status": "Aggregated",
            "aggregationId": 42,
            "domainId": 1,
            "aggregationDetails": {
                "leafIndex": 3,
                "numberOfLeaves": 8,
                "merkleProof": ["0x01", "0x02", "0x03"]
            }
        }));
        match resp.into_outcome().unwrap() {
            JobOutcome::Aggregated(a) => {
                assert_eq!(a.aggregation_id, 42);
                assert_eq!(a.domain_id, 1);
                assert_eq!(a.leaf_count, 8);
                assert_eq!(a.leaf_index, 3);
                assert_eq!(a.merkle_proof[0], Hash32::from_u64(1));
            }
            other => panic!("expected aggregation, got {other:?}"),
        }
    }

    #[test]
    fn aggregated_without_details_is_malformed() {
        let resp = status(serde_json::json!({
            "jobId": "j-1",
            "status": "Aggregated",
            "aggregationId": 42
        }));
        assert!(matches!(
            resp.into_outcome(),
            Err(ProofServiceError::Malformed { .. })
        ));
    }

    #[test]
    fn intermediate_and_unknown_statuses_stay_pending() {
        for s in ["Queued", "Valid", "IncludedInBlock", "Finalized", "AggregationPending", "Teleported"] {
            let resp = status(serde_json::json!({ "jobId": "j", "status": s }));
            assert_eq!(resp.into_outcome().unwrap(), JobOutcome::Pending, "{s}");
        }
    }

    #[test]
    fn rejected_maps_to_failed_with_reason() {
        let resp = status(serde_json::json!({
            "jobId": "j",
            "status": "Rejected",
            "error": "invalid proof"
        }));
        assert_eq!(
            resp.into_outcome().unwrap(),
            JobOutcome::Failed("invalid proof".into())
        );
    }
}
