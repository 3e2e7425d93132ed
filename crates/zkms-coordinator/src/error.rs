//! Coordinator errors.

use thiserror::Error;

use zkms_client::ProofServiceError;
use zkms_core::{ErrorKind, PayloadError, TransactionKind, TxHash};
use zkms_crypto::MerkleError;
use zkms_state::{ProofJobError, ProofJobStatus, TransactionError, TransactionStatus};
use zkms_store::{StoreError, UniqueConstraint};

/// Failures surfaced by the coordinator services.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// The durable store could not be reached. Retry the whole operation.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("corrupt stored record: {0}")]
    CorruptRecord(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("declared kind {declared} does not match {actual} payload")]
    KindMismatch {
        declared: TransactionKind,
        actual: TransactionKind,
    },

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("invalid aggregation artifact: {0}")]
    InvalidArtifact(String),

    /// Deny votes are only accepted from the wallet's current signers.
    #[error("voter is not a signer of this wallet")]
    NotASigner,

    #[error("this voter already voted on the transaction")]
    AlreadyVoted,

    #[error("transaction already resolved as {status}")]
    TransactionResolved { status: TransactionStatus },

    #[error("a proof job already exists for this nullifier")]
    DuplicateNullifier,

    #[error("external job id is already tracked")]
    DuplicateJobId,

    /// Another proposal reserved the same nonce. Retry the proposal.
    #[error("nonce already used for this wallet")]
    NonceConflict,

    #[error("conflicting record: {0}")]
    Conflict(String),

    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("transaction is {status}; only THRESHOLD_REACHED transactions execute")]
    NotExecutable { status: TransactionStatus },

    #[error("execution already in progress")]
    ExecutionInProgress,

    /// The chain rejected the call, or the retry budget ran out. The
    /// transaction is now `Failed`.
    #[error("execution failed: {reason}")]
    ExecutionFailed {
        reason: String,
        tx_hash: Option<TxHash>,
    },

    #[error(transparent)]
    ProofService(#[from] ProofServiceError),
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StorageUnavailable(_) => ErrorKind::ExternalService { transient: true },
            Self::CorruptRecord(_) => ErrorKind::ExternalService { transient: false },
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidPayload(_)
            | Self::KindMismatch { .. }
            | Self::InvalidProof(_)
            | Self::InvalidArtifact(_)
            | Self::NotASigner => ErrorKind::Validation,
            Self::AlreadyVoted
            | Self::DuplicateNullifier
            | Self::DuplicateJobId
            | Self::NonceConflict
            | Self::Conflict(_) => ErrorKind::Conflict,
            Self::TransactionResolved { .. }
            | Self::InvalidTransition { .. }
            | Self::NotExecutable { .. }
            | Self::ExecutionInProgress => ErrorKind::State,
            Self::ExecutionFailed { .. } => ErrorKind::Execution,
            Self::ProofService(e) => ErrorKind::ExternalService {
                transient: e.is_transient(),
            },
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
            StoreError::Corrupt(msg) => Self::CorruptRecord(msg),
            StoreError::NotFound(id) => Self::not_found("record", id),
            StoreError::TransactionClosed { status, .. } => Self::TransactionResolved { status },
            StoreError::UniqueViolation { constraint } => match constraint {
                UniqueConstraint::WalletNonce => Self::NonceConflict,
                // A proof job is bound to one nullifier, so a reused job is
                // the same voter again.
                UniqueConstraint::VoteNullifier
                | UniqueConstraint::VoteProofJob
                | UniqueConstraint::DenyVoter => Self::AlreadyVoted,
                UniqueConstraint::ProofJobNullifier => Self::DuplicateNullifier,
                UniqueConstraint::ProofJobExternalId => Self::DuplicateJobId,
                UniqueConstraint::PrimaryKey(name) => Self::Conflict(name),
            },
        }
    }
}

impl From<TransactionError> for CoordinatorError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::InvalidTransition { from, to } => Self::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            TransactionError::Resolved { status } => Self::TransactionResolved { status },
        }
    }
}

impl From<ProofJobError> for CoordinatorError {
    fn from(err: ProofJobError) -> Self {
        match err {
            ProofJobError::InvalidTransition { from, to } => Self::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            ProofJobError::ArtifactsRequired => Self::InvalidTransition {
                from: ProofJobStatus::Pending.to_string(),
                to: ProofJobStatus::Aggregated.to_string(),
            },
            ProofJobError::InvalidArtifact(msg) => Self::InvalidArtifact(msg),
        }
    }
}

impl From<MerkleError> for CoordinatorError {
    fn from(err: MerkleError) -> Self {
        Self::InvalidProof(err.to_string())
    }
}

/// Result alias for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violations_map_to_named_conflicts() {
        let err: CoordinatorError = StoreError::UniqueViolation {
            constraint: UniqueConstraint::VoteNullifier,
        }
        .into();
        assert!(matches!(err, CoordinatorError::AlreadyVoted));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: CoordinatorError = StoreError::UniqueViolation {
            constraint: UniqueConstraint::ProofJobNullifier,
        }
        .into();
        assert!(matches!(err, CoordinatorError::DuplicateNullifier));
    }

    #[test]
    fn vote_on_closed_transaction_is_resolved() {
        let err: CoordinatorError = StoreError::TransactionClosed {
            id: "tx".into(),
            status: TransactionStatus::Executed,
        }
        .into();
        assert!(matches!(
            err,
            CoordinatorError::TransactionResolved {
                status: TransactionStatus::Executed
            }
        ));
    }

    #[test]
    fn outage_is_transient() {
        let err: CoordinatorError = StoreError::Unavailable("pool timed out".into()).into();
        assert!(err.kind().is_transient());
    }

    #[test]
    fn resolved_transaction_is_state_error() {
        let err: CoordinatorError = TransactionError::Resolved {
            status: TransactionStatus::Denied,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(err.to_string(), "transaction already resolved as DENIED");
    }

    #[test]
    fn revert_is_execution_error() {
        let err = CoordinatorError::ExecutionFailed {
            reason: "reverted".into(),
            tx_hash: None,
        };
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(!err.kind().is_transient());
    }
}
