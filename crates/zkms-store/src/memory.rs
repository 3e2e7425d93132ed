//! In-memory store.
//!
//! One `parking_lot::Mutex` guards all state. Every trait method takes the
//! lock, does its work synchronously and releases it before returning, so
//! no lock is ever held across an `.await`. The constraint checks mirror
//! the PostgreSQL schema exactly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use zkms_core::{Nullifier, ProofJobId, Timestamp, TransactionId, Wallet, WalletId};
use zkms_state::{
    Ballot, ProofJob, ProofJobStatus, Transaction, TransactionStatus, Vote, VoteTally,
};

use crate::error::{Result, StoreError, UniqueConstraint};
use crate::traits::{ProofJobStore, TransactionStore, WalletStore};

#[derive(Default)]
struct Inner {
    wallets: HashMap<WalletId, Wallet>,
    nonces: HashMap<WalletId, u64>,
    transactions: HashMap<TransactionId, Transaction>,
    /// Insertion order across all transactions.
    votes: Vec<Vote>,
    jobs: HashMap<ProofJobId, ProofJob>,
}

impl Inner {
    fn check_vote(&self, vote: &Vote) -> Result<()> {
        let tx = self
            .transactions
            .get(&vote.transaction_id)
            .ok_or_else(|| StoreError::NotFound(vote.transaction_id.to_string()))?;
        if tx.is_terminal() {
            return Err(StoreError::TransactionClosed {
                id: tx.id.to_string(),
                status: tx.status,
            });
        }
        let same_tx = self
            .votes
            .iter()
            .filter(|v| v.transaction_id == vote.transaction_id);
        for existing in same_tx {
            match (&existing.ballot, &vote.ballot) {
                (Ballot::Approve { nullifier: a, .. }, Ballot::Approve { nullifier: b, .. })
                    if a == b =>
                {
                    return Err(unique(UniqueConstraint::VoteNullifier));
                }
                (Ballot::Deny { voter: a }, Ballot::Deny { voter: b }) if a == b => {
                    return Err(unique(UniqueConstraint::DenyVoter));
                }
                _ => {}
            }
        }
        if let Some(job) = vote.proof_job() {
            if !self.jobs.contains_key(&job) {
                return Err(StoreError::NotFound(job.to_string()));
            }
            if self.votes.iter().any(|v| v.proof_job() == Some(job)) {
                return Err(unique(UniqueConstraint::VoteProofJob));
            }
        }
        Ok(())
    }

    fn check_job(&self, job: &ProofJob) -> Result<()> {
        for existing in self.jobs.values() {
            if existing.nullifier == job.nullifier {
                return Err(unique(UniqueConstraint::ProofJobNullifier));
            }
            if existing.external_id == job.external_id {
                return Err(unique(UniqueConstraint::ProofJobExternalId));
            }
        }
        if self.jobs.contains_key(&job.id) {
            return Err(unique(UniqueConstraint::PrimaryKey("proof_jobs_pkey".into())));
        }
        Ok(())
    }
}

fn unique(constraint: UniqueConstraint) -> StoreError {
    StoreError::UniqueViolation { constraint }
}

/// Process-local store with the same guarantees as the PostgreSQL backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    fail_vote_read: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every operation fails with
    /// [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next [`TransactionStore::votes`] call fail with
    /// [`StoreError::Unavailable`]; later calls succeed.
    pub fn fail_next_vote_read(&self) {
        self.fail_vote_read.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<parking_lot::MutexGuard<'_, Inner>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(self.inner.lock())
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn register_wallet(&self, wallet: &Wallet, starting_nonce: u64) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.wallets.contains_key(&wallet.id()) {
            return Err(unique(UniqueConstraint::PrimaryKey("wallets_pkey".into())));
        }
        inner.wallets.insert(wallet.id(), wallet.clone());
        inner.nonces.insert(wallet.id(), starting_nonce);
        Ok(())
    }

    async fn wallet(&self, id: WalletId) -> Result<Option<Wallet>> {
        Ok(self.lock()?.wallets.get(&id).cloned())
    }

    async fn update_wallet(&self, wallet: &Wallet) -> Result<()> {
        let mut inner = self.lock()?;
        match inner.wallets.get_mut(&wallet.id()) {
            Some(slot) => {
                *slot = wallet.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(wallet.id().to_string())),
        }
    }

    async fn reserve_nonce(&self, id: WalletId) -> Result<u64> {
        let mut inner = self.lock()?;
        let counter = inner
            .nonces
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let reserved = *counter;
        *counter += 1;
        Ok(reserved)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_proposal(&self, tx: &Transaction, job: &ProofJob, vote: &Vote) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.wallets.contains_key(&tx.wallet_id) {
            return Err(StoreError::NotFound(tx.wallet_id.to_string()));
        }
        if inner.transactions.contains_key(&tx.id) {
            return Err(unique(UniqueConstraint::PrimaryKey("transactions_pkey".into())));
        }
        if inner
            .transactions
            .values()
            .any(|t| t.wallet_id == tx.wallet_id && t.nonce == tx.nonce)
        {
            return Err(unique(UniqueConstraint::WalletNonce));
        }
        inner.check_job(job)?;

        // Stage, check the vote against the staged rows, roll back on error.
        inner.transactions.insert(tx.id, tx.clone());
        inner.jobs.insert(job.id, job.clone());
        if let Err(e) = inner.check_vote(vote) {
            inner.transactions.remove(&tx.id);
            inner.jobs.remove(&job.id);
            return Err(e);
        }
        inner.votes.push(vote.clone());
        Ok(())
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.lock()?.transactions.get(&id).cloned())
    }

    async fn update_transaction(
        &self,
        tx: &Transaction,
        expected: TransactionStatus,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        let stored = inner
            .transactions
            .get_mut(&tx.id)
            .ok_or_else(|| StoreError::NotFound(tx.id.to_string()))?;
        if stored.status != expected {
            return Ok(false);
        }
        stored.status = tx.status;
        stored.transitions = tx.transitions.clone();
        stored.executed_at = tx.executed_at;
        stored.tx_hash = tx.tx_hash;
        stored.failure_reason = tx.failure_reason.clone();
        Ok(true)
    }

    async fn claim_execution(&self, id: TransactionId, at: Timestamp) -> Result<bool> {
        let mut inner = self.lock()?;
        let stored = inner
            .transactions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if stored.status != TransactionStatus::ThresholdReached
            || stored.execution_started_at.is_some()
        {
            return Ok(false);
        }
        stored.execution_started_at = Some(at);
        Ok(true)
    }

    async fn insert_vote(&self, vote: &Vote) -> Result<()> {
        let mut inner = self.lock()?;
        inner.check_vote(vote)?;
        inner.votes.push(vote.clone());
        Ok(())
    }

    async fn votes(&self, tx: TransactionId) -> Result<Vec<Vote>> {
        if self.fail_vote_read.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("vote read interrupted".into()));
        }
        Ok(self
            .lock()?
            .votes
            .iter()
            .filter(|v| v.transaction_id == tx)
            .cloned()
            .collect())
    }

    async fn vote_by_nullifier(
        &self,
        tx: TransactionId,
        nullifier: &Nullifier,
    ) -> Result<Option<Vote>> {
        Ok(self
            .lock()?
            .votes
            .iter()
            .find(|v| v.transaction_id == tx && v.nullifier().as_ref() == Some(nullifier))
            .cloned())
    }

    async fn stalled_transactions(&self, limit: usize) -> Result<Vec<TransactionId>> {
        let inner = self.lock()?;
        let mut stalled: Vec<&Transaction> = inner
            .transactions
            .values()
            .filter(|tx| {
                let votes: Vec<Vote> = inner
                    .votes
                    .iter()
                    .filter(|v| v.transaction_id == tx.id)
                    .cloned()
                    .collect();
                let jobs: Vec<ProofJob> = inner
                    .jobs
                    .values()
                    .filter(|j| j.transaction_id == tx.id)
                    .cloned()
                    .collect();
                VoteTally::count(&votes, &jobs).next_status(tx).is_some()
            })
            .collect();
        stalled.sort_by_key(|tx| tx.created_at);
        Ok(stalled.into_iter().take(limit).map(|tx| tx.id).collect())
    }
}

#[async_trait]
impl ProofJobStore for MemoryStore {
    async fn insert_proof_job(&self, job: &ProofJob) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.transactions.contains_key(&job.transaction_id) {
            return Err(StoreError::NotFound(job.transaction_id.to_string()));
        }
        inner.check_job(job)?;
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn proof_job(&self, id: ProofJobId) -> Result<Option<ProofJob>> {
        Ok(self.lock()?.jobs.get(&id).cloned())
    }

    async fn proof_job_by_nullifier(&self, nullifier: &Nullifier) -> Result<Option<ProofJob>> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .find(|j| &j.nullifier == nullifier)
            .cloned())
    }

    async fn update_proof_job(&self, job: &ProofJob, expected: ProofJobStatus) -> Result<bool> {
        let mut inner = self.lock()?;
        let stored = inner
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| StoreError::NotFound(job.id.to_string()))?;
        if stored.status != expected {
            return Ok(false);
        }
        stored.status = job.status;
        stored.aggregation = job.aggregation.clone();
        stored.failure_reason = job.failure_reason.clone();
        stored.updated_at = job.updated_at;
        Ok(true)
    }

    async fn proof_jobs_for_transaction(&self, tx: TransactionId) -> Result<Vec<ProofJob>> {
        let mut jobs: Vec<ProofJob> = self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.transaction_id == tx)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn pending_proof_jobs(&self, limit: usize) -> Result<Vec<ProofJob>> {
        let mut jobs: Vec<ProofJob> = self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.status == ProofJobStatus::Pending)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs.truncate(limit);
        Ok(jobs)
    }
}
