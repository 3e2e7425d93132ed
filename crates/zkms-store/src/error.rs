//! Store errors.

use thiserror::Error;

use zkms_state::TransactionStatus;

/// Unique constraints the workflow depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueConstraint {
    /// `(wallet_id, nonce)` on transactions.
    WalletNonce,
    /// `(transaction_id, nullifier)` on approve votes.
    VoteNullifier,
    /// `(transaction_id, voter)` on deny votes.
    DenyVoter,
    /// One vote per proof job.
    VoteProofJob,
    /// One proof job per nullifier.
    ProofJobNullifier,
    /// External job ids are tracked once.
    ProofJobExternalId,
    /// Duplicate primary key.
    PrimaryKey(String),
}

impl UniqueConstraint {
    /// Map a PostgreSQL constraint or index name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "transactions_wallet_nonce_key" => Self::WalletNonce,
            "votes_transaction_nullifier_key" => Self::VoteNullifier,
            "votes_transaction_voter_key" => Self::DenyVoter,
            "votes_proof_job_key" => Self::VoteProofJob,
            "proof_jobs_nullifier_key" => Self::ProofJobNullifier,
            "proof_jobs_external_id_key" => Self::ProofJobExternalId,
            other => Self::PrimaryKey(other.to_string()),
        }
    }
}

impl std::fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WalletNonce => f.write_str("wallet nonce"),
            Self::VoteNullifier => f.write_str("vote nullifier"),
            Self::DenyVoter => f.write_str("deny voter"),
            Self::VoteProofJob => f.write_str("vote proof job"),
            Self::ProofJobNullifier => f.write_str("proof job nullifier"),
            Self::ProofJobExternalId => f.write_str("proof job external id"),
            Self::PrimaryKey(name) => write!(f, "primary key ({name})"),
        }
    }
}

/// Errors from any store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection, pool, or I/O failure. The caller should retry the whole
    /// operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: UniqueConstraint },

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A vote was refused because its transaction is already terminal.
    #[error("transaction {id} is closed ({status})")]
    TransactionClosed {
        id: String,
        status: TransactionStatus,
    },

    /// A persisted row could not be decoded into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_unique_violation(&self, constraint: &UniqueConstraint) -> bool {
        matches!(self, Self::UniqueViolation { constraint: c } if c == constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                if db.is_unique_violation() {
                    StoreError::UniqueViolation {
                        constraint: UniqueConstraint::from_name(db.constraint().unwrap_or("")),
                    }
                } else if db.is_foreign_key_violation() {
                    StoreError::NotFound(db.message().to_string())
                } else {
                    StoreError::Unavailable(db.message().to_string())
                }
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("row".into()),
            e @ (sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::TypeNotFound { .. }) => StoreError::Corrupt(e.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
