//! # Proof Job Lifecycle
//!
//! A proof job tracks one membership proof submitted to the external
//! aggregation service. It is created `Pending` and moves exactly once to
//! `Aggregated` (with the artifacts the contract needs to verify the proof
//! inside an aggregation) or to `Failed`.
//!
//! `Aggregated` is only reachable through [`ProofJob::record_aggregation`]
//! so an aggregated job always carries its artifacts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use zkms_core::{
    ExternalJobId, Hash32, Nullifier, ParseError, ProofJobId, Timestamp, TransactionId,
};

/// Status of a proof job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofJobStatus {
    Pending,
    Aggregated,
    Failed,
}

impl ProofJobStatus {
    pub const ALL: [ProofJobStatus; 3] = [Self::Pending, Self::Aggregated, Self::Failed];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Aggregated => "AGGREGATED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ParseError> {
        Self::ALL
            .into_iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| ParseError::UnknownVariant {
                kind: "proof job status",
                value: name.to_string(),
            })
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn valid_transitions(&self) -> &'static [ProofJobStatus] {
        match self {
            Self::Pending => &[Self::Aggregated, Self::Failed],
            Self::Aggregated | Self::Failed => &[],
        }
    }
}

impl std::fmt::Display for ProofJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofJobError {
    #[error("invalid proof job transition: {from} -> {to}")]
    InvalidTransition {
        from: ProofJobStatus,
        to: ProofJobStatus,
    },

    /// `Aggregated` needs artifacts; use `record_aggregation`.
    #[error("aggregation artifacts are required to mark a job aggregated")]
    ArtifactsRequired,

    #[error("invalid aggregation artifact: {0}")]
    InvalidArtifact(String),
}

/// Everything the wallet contract needs to check that a proof is part of
/// an aggregation published on the settlement chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationArtifact {
    pub aggregation_id: u64,
    pub domain_id: u64,
    /// Path from the proof's leaf to the aggregation root.
    pub merkle_proof: Vec<Hash32>,
    pub leaf_count: u64,
    pub leaf_index: u64,
}

impl AggregationArtifact {
    pub fn validate(&self) -> Result<(), ProofJobError> {
        if self.leaf_count == 0 {
            return Err(ProofJobError::InvalidArtifact(
                "leaf count must be positive".into(),
            ));
        }
        if self.leaf_index >= self.leaf_count {
            return Err(ProofJobError::InvalidArtifact(format!(
                "leaf index {} out of range for {} leaves",
                self.leaf_index, self.leaf_count
            )));
        }
        // A single-leaf aggregation has an empty path.
        if self.leaf_count > 1 && self.merkle_proof.is_empty() {
            return Err(ProofJobError::InvalidArtifact(
                "merkle proof must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// One aggregated approval, as submitted with the execution call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionProof {
    pub nullifier: Nullifier,
    pub artifact: AggregationArtifact,
}

/// A tracked proof job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofJob {
    pub id: ProofJobId,
    /// Handle assigned by the aggregation service. Unique.
    pub external_id: ExternalJobId,
    /// Unique: one job per nullifier.
    pub nullifier: Nullifier,
    pub transaction_id: TransactionId,
    pub status: ProofJobStatus,
    pub aggregation: Option<AggregationArtifact>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProofJob {
    pub fn new(
        external_id: ExternalJobId,
        nullifier: Nullifier,
        transaction_id: TransactionId,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: ProofJobId::new(),
            external_id,
            nullifier,
            transaction_id,
            status: ProofJobStatus::Pending,
            aggregation: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `to` without artifacts. Returns whether anything changed.
    ///
    /// Re-asserting `Pending` on a pending job or `Failed` on a failed job
    /// is a no-op, since status polls repeat.
    pub fn update_status(
        &mut self,
        to: ProofJobStatus,
        reason: Option<String>,
    ) -> Result<bool, ProofJobError> {
        match (self.status, to) {
            (ProofJobStatus::Pending, ProofJobStatus::Pending)
            | (ProofJobStatus::Failed, ProofJobStatus::Failed) => Ok(false),
            (_, ProofJobStatus::Aggregated) => Err(ProofJobError::ArtifactsRequired),
            (ProofJobStatus::Pending, ProofJobStatus::Failed) => {
                self.status = ProofJobStatus::Failed;
                self.failure_reason = reason;
                self.updated_at = Timestamp::now();
                Ok(true)
            }
            (from, to) => Err(ProofJobError::InvalidTransition { from, to }),
        }
    }

    /// PENDING → AGGREGATED with the aggregation artifacts.
    pub fn record_aggregation(
        &mut self,
        artifact: AggregationArtifact,
    ) -> Result<(), ProofJobError> {
        if self.status != ProofJobStatus::Pending {
            return Err(ProofJobError::InvalidTransition {
                from: self.status,
                to: ProofJobStatus::Aggregated,
            });
        }
        artifact.validate()?;
        self.status = ProofJobStatus::Aggregated;
        self.aggregation = Some(artifact);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// The proof to submit on-chain, if this job is aggregated.
    pub fn execution_proof(&self) -> Option<ExecutionProof> {
        match (&self.status, &self.aggregation) {
            (ProofJobStatus::Aggregated, Some(artifact)) => Some(ExecutionProof {
                nullifier: self.nullifier,
                artifact: artifact.clone(),
            }),
            _ => None,
        }
    }
}
