//! Store traits consumed by the coordinator.

use async_trait::async_trait;

use zkms_core::{Nullifier, ProofJobId, Timestamp, TransactionId, Wallet, WalletId};
use zkms_state::{ProofJob, ProofJobStatus, Transaction, TransactionStatus, Vote};

use crate::error::Result;

/// Wallet registry and the per-wallet nonce counter.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Register a wallet whose next on-chain nonce is `starting_nonce`.
    async fn register_wallet(&self, wallet: &Wallet, starting_nonce: u64) -> Result<()>;

    async fn wallet(&self, id: WalletId) -> Result<Option<Wallet>>;

    /// Replace the signer set and threshold after a signer-management
    /// transaction executed.
    async fn update_wallet(&self, wallet: &Wallet) -> Result<()>;

    /// Atomically read and increment the wallet's nonce counter, returning
    /// the reserved value. Concurrent callers never get the same value.
    async fn reserve_nonce(&self, id: WalletId) -> Result<u64>;
}

/// Transactions and their votes.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new transaction together with the proposer's proof job and
    /// self-vote. All three land or none do.
    async fn insert_proposal(&self, tx: &Transaction, job: &ProofJob, vote: &Vote) -> Result<()>;

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Persist `tx`'s status, transition log and execution outcome if the
    /// stored status is still `expected`. Returns whether the write applied.
    async fn update_transaction(&self, tx: &Transaction, expected: TransactionStatus)
        -> Result<bool>;

    /// Mark `id` as being executed if it is `ThresholdReached` and nobody
    /// claimed it yet. Returns whether this caller won the claim.
    async fn claim_execution(&self, id: TransactionId, at: Timestamp) -> Result<bool>;

    /// Insert a vote under its uniqueness constraints. Fails with
    /// [`StoreError::TransactionClosed`] if the transaction is terminal at
    /// the moment of the insert.
    ///
    /// [`StoreError::TransactionClosed`]: crate::StoreError::TransactionClosed
    async fn insert_vote(&self, vote: &Vote) -> Result<()>;

    /// All votes on `tx`, in insertion order.
    async fn votes(&self, tx: TransactionId) -> Result<Vec<Vote>>;

    async fn vote_by_nullifier(
        &self,
        tx: TransactionId,
        nullifier: &Nullifier,
    ) -> Result<Option<Vote>>;

    /// Up to `limit` open transactions, oldest first, whose recorded votes
    /// and proof jobs already allow a status change that was never
    /// written.
    async fn stalled_transactions(&self, limit: usize) -> Result<Vec<TransactionId>>;
}

/// Proof jobs.
#[async_trait]
pub trait ProofJobStore: Send + Sync {
    /// Insert under the nullifier and external-id uniqueness constraints.
    async fn insert_proof_job(&self, job: &ProofJob) -> Result<()>;

    async fn proof_job(&self, id: ProofJobId) -> Result<Option<ProofJob>>;

    async fn proof_job_by_nullifier(&self, nullifier: &Nullifier) -> Result<Option<ProofJob>>;

    /// Persist `job` if its stored status is still `expected`.
    async fn update_proof_job(&self, job: &ProofJob, expected: ProofJobStatus) -> Result<bool>;

    async fn proof_jobs_for_transaction(&self, tx: TransactionId) -> Result<Vec<ProofJob>>;

    /// Up to `limit` pending jobs, oldest first.
    async fn pending_proof_jobs(&self, limit: usize) -> Result<Vec<ProofJob>>;
}

/// Everything the coordinator needs from a backend.
pub trait MultisigStore: WalletStore + TransactionStore + ProofJobStore {}

impl<T: WalletStore + TransactionStore + ProofJobStore> MultisigStore for T {}
