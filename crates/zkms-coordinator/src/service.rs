//! # Transaction Service
//!
//! The operations callers use: propose, approve, deny, execute, and the
//! proof-job reports that move transactions forward.
//!
//! ## Status evaluation
//!
//! A transaction's next status is never stored incrementally. After every
//! vote and every aggregation the service recounts all votes and their
//! proof jobs ([`VoteTally`]) and applies whatever transitions the count
//! allows. The write is compare-and-set on the status that was read; a
//! concurrent writer makes the loser recount from fresh data instead of
//! overwriting.
//!
//! ## Identity
//!
//! Approvals carry only a nullifier and a proof-job reference. The service
//! never learns which signer approved. The only identity fact it keeps is
//! the proposer flag, fixed when the proposal is stored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use zkms_client::{ChainRpc, ProofSubmission, ProofSubmissionService};
use zkms_core::{
    Commitment, ExternalJobId, Nullifier, ProofJobId, Timestamp, TransactionId, TransactionKind,
    TransactionPayload, TxHash, Wallet, WalletId,
};
use zkms_crypto::{MembershipClaim, MembershipTree};
use zkms_state::{
    select_execution_proofs, AggregationArtifact, ExecutionProof, ProofJob, ProofJobStatus,
    Transaction, TransactionStatus, Vote, VoteTally,
};
use zkms_store::MultisigStore;

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::execution::ExecutionCoordinator;
use crate::nonce::NonceReservation;
use crate::tracker::ProofJobTracker;

/// The proposer's approval, submitted to the proof service before the
/// proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalProof {
    /// Root and leaf slot the proof was generated against.
    pub claim: MembershipClaim,
    pub nullifier: Nullifier,
    /// Job handle returned by the proof service.
    pub external_job_id: ExternalJobId,
}

/// A transaction with everything recorded against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub transaction: Transaction,
    pub votes: Vec<Vote>,
    pub proof_jobs: Vec<ProofJob>,
}

pub struct TransactionService {
    store: Arc<dyn MultisigStore>,
    nonces: NonceReservation,
    tracker: ProofJobTracker,
    executor: ExecutionCoordinator,
    prover: Arc<dyn ProofSubmissionService>,
}

impl TransactionService {
    pub fn new(
        store: Arc<dyn MultisigStore>,
        chain: Arc<dyn ChainRpc>,
        prover: Arc<dyn ProofSubmissionService>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            nonces: NonceReservation::new(store.clone()),
            tracker: ProofJobTracker::new(store.clone()),
            executor: ExecutionCoordinator::new(
                chain,
                config.retry_policy(),
                config.attempt_timeout(),
            ),
            store,
            prover,
        }
    }

    pub fn tracker(&self) -> &ProofJobTracker {
        &self.tracker
    }

    pub fn nonces(&self) -> &NonceReservation {
        &self.nonces
    }

    async fn wallet(&self, id: WalletId) -> Result<Wallet> {
        self.store
            .wallet(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("wallet", id))
    }

    async fn load(&self, id: TransactionId) -> Result<Transaction> {
        self.store
            .transaction(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("transaction", id))
    }

    // ── Proposal ────────────────────────────────────────────────────

    /// Validate, reserve a nonce, and store the transaction together with
    /// the proposer's approval.
    ///
    /// Payload and membership are checked before anything is written.
    #[tracing::instrument(skip_all, fields(wallet_id = %wallet_id, kind = %kind))]
    pub async fn propose(
        &self,
        wallet_id: WalletId,
        kind: TransactionKind,
        payload: TransactionPayload,
        proof: ProposalProof,
    ) -> Result<Transaction> {
        if payload.kind() != kind {
            return Err(CoordinatorError::KindMismatch {
                declared: kind,
                actual: payload.kind(),
            });
        }
        let wallet = self.wallet(wallet_id).await?;
        payload.validate(&wallet)?;
        let tree = MembershipTree::build(wallet.signers())?;
        tree.verify_claim(&proof.claim)?;

        let nonce = self.nonces.reserve(wallet_id).await?;
        let mut tx = Transaction::propose(&wallet, nonce, payload, tree.root())?;
        tx.begin_voting()?;
        let job = ProofJob::new(proof.external_job_id, proof.nullifier, tx.id);
        let vote = Vote::approve(tx.id, proof.nullifier, job.id, true);
        self.store.insert_proposal(&tx, &job, &vote).await?;

        tracing::info!(tx_id = %tx.id, nonce, threshold = tx.threshold_snapshot, "Transaction proposed");
        Ok(tx)
    }

    // ── Voting ──────────────────────────────────────────────────────

    /// Record an anonymous approval backed by `proof_job`.
    #[tracing::instrument(skip_all, fields(tx_id = %tx_id, job_id = %proof_job))]
    pub async fn approve(
        &self,
        tx_id: TransactionId,
        nullifier: Nullifier,
        proof_job: ProofJobId,
    ) -> Result<Transaction> {
        let tx = self.load(tx_id).await?;
        if self.store.vote_by_nullifier(tx_id, &nullifier).await?.is_some() {
            return Err(CoordinatorError::AlreadyVoted);
        }
        if tx.is_terminal() {
            return Err(CoordinatorError::TransactionResolved { status: tx.status });
        }

        let job = self.tracker.job(proof_job).await?;
        if job.nullifier != nullifier || job.transaction_id != tx_id {
            return Err(CoordinatorError::InvalidProof(
                "proof job does not belong to this nullifier and transaction".into(),
            ));
        }
        if job.status == ProofJobStatus::Failed {
            return Err(CoordinatorError::InvalidProof(format!(
                "proof job {proof_job} failed verification"
            )));
        }

        self.store
            .insert_vote(&Vote::approve(tx_id, nullifier, proof_job, false))
            .await?;
        tracing::info!(tx_id = %tx_id, "Approval recorded");
        self.reevaluate(tx_id).await
    }

    /// Record a deny vote from `voter`, who must be a current signer.
    #[tracing::instrument(skip_all, fields(tx_id = %tx_id))]
    pub async fn deny(&self, tx_id: TransactionId, voter: Commitment) -> Result<Transaction> {
        let tx = self.load(tx_id).await?;
        if tx.is_terminal() {
            return Err(CoordinatorError::TransactionResolved { status: tx.status });
        }
        let wallet = self.wallet(tx.wallet_id).await?;
        if !wallet.is_signer(&voter) {
            return Err(CoordinatorError::NotASigner);
        }
        self.store.insert_vote(&Vote::deny(tx_id, voter)).await?;
        tracing::info!(tx_id = %tx_id, "Deny vote recorded");
        self.reevaluate(tx_id).await
    }

    /// Open transactions whose votes already allow a status change that
    /// was never written, e.g. because the recount after a vote or an
    /// aggregation hit a store error. Pass each to [`Self::reevaluate`].
    pub async fn stalled_transactions(&self, limit: usize) -> Result<Vec<TransactionId>> {
        Ok(self.store.stalled_transactions(limit).await?)
    }

    /// Recount votes and apply every transition the count allows.
    ///
    /// Idempotent: a transaction already at the status its votes allow is
    /// returned unchanged.
    pub async fn reevaluate(&self, tx_id: TransactionId) -> Result<Transaction> {
        loop {
            let current = self.load(tx_id).await?;
            let votes = self.store.votes(tx_id).await?;
            let jobs = self.store.proof_jobs_for_transaction(tx_id).await?;
            let tally = VoteTally::count(&votes, &jobs);

            let mut next = current.clone();
            while let Some(status) = tally.next_status(&next) {
                match status {
                    TransactionStatus::Denied => {
                        let limit = next.deny_limit();
                        next.deny(format!("{} deny votes reached limit {limit}", tally.denials))?
                    }
                    other => next.try_transition(other, None)?,
                }
            }
            if next.status == current.status {
                return Ok(current);
            }
            if self.store.update_transaction(&next, current.status).await? {
                tracing::info!(
                    tx_id = %tx_id,
                    from = %current.status,
                    to = %next.status,
                    aggregated = tally.aggregated_approvals,
                    pending = tally.pending_approvals,
                    denials = tally.denials,
                    "Transaction status advanced"
                );
                return Ok(next);
            }
            tracing::debug!(tx_id = %tx_id, "Transaction changed concurrently, recounting");
        }
    }

    // ── Execution ───────────────────────────────────────────────────

    /// Execute a `ThresholdReached` transaction on-chain.
    ///
    /// Any other status fails with `NotExecutable` before anything is
    /// written or sent. A concurrent second call fails with
    /// `ExecutionInProgress`.
    #[tracing::instrument(skip_all, fields(tx_id = %tx_id))]
    pub async fn execute(&self, tx_id: TransactionId) -> Result<TxHash> {
        let mut tx = self.load(tx_id).await?;
        if tx.status != TransactionStatus::ThresholdReached {
            return Err(CoordinatorError::NotExecutable { status: tx.status });
        }
        let claimed_at = Timestamp::now();
        if !self.store.claim_execution(tx_id, claimed_at).await? {
            let latest = self.load(tx_id).await?;
            return Err(match latest.status {
                TransactionStatus::ThresholdReached => CoordinatorError::ExecutionInProgress,
                status => CoordinatorError::NotExecutable { status },
            });
        }
        tx.execution_started_at = Some(claimed_at);

        let votes = self.store.votes(tx_id).await?;
        let jobs = self.store.proof_jobs_for_transaction(tx_id).await?;
        let proofs = select_execution_proofs(&votes, &jobs, tx.threshold_snapshot);
        if (proofs.len() as u32) < tx.threshold_snapshot {
            let reason = format!(
                "{} aggregated proofs available, {} required",
                proofs.len(),
                tx.threshold_snapshot
            );
            tx.mark_failed(reason.clone(), None)?;
            self.persist_outcome(&tx).await?;
            return Err(CoordinatorError::ExecutionFailed {
                reason,
                tx_hash: None,
            });
        }

        match self.executor.execute(&tx, &proofs).await {
            Ok(hash) => {
                tx.mark_executed(hash)?;
                self.persist_outcome(&tx).await?;
                tracing::info!(tx_id = %tx_id, tx_hash = %hash, "Transaction executed");
                if tx.kind().mutates_wallet() {
                    self.apply_wallet_change(&tx).await;
                }
                Ok(hash)
            }
            Err(failure) => {
                tx.mark_failed(failure.reason.clone(), failure.tx_hash)?;
                self.persist_outcome(&tx).await?;
                tracing::error!(
                    tx_id = %tx_id,
                    attempts = failure.attempts,
                    reason = %failure.reason,
                    "Transaction execution failed"
                );
                Err(CoordinatorError::ExecutionFailed {
                    reason: failure.reason,
                    tx_hash: failure.tx_hash,
                })
            }
        }
    }

    async fn persist_outcome(&self, tx: &Transaction) -> Result<()> {
        if self
            .store
            .update_transaction(tx, TransactionStatus::ThresholdReached)
            .await?
        {
            return Ok(());
        }
        tracing::error!(tx_id = %tx.id, status = %tx.status, "Claimed transaction changed during execution");
        Err(CoordinatorError::Conflict(format!(
            "transaction {} changed during execution",
            tx.id
        )))
    }

    /// The wallet contract already applied the change on-chain; a failure
    /// here only leaves the stored copy stale.
    async fn apply_wallet_change(&self, tx: &Transaction) {
        let updated = match self.wallet(tx.wallet_id).await {
            Ok(wallet) => wallet.apply(&tx.payload),
            Err(e) => {
                tracing::warn!(tx_id = %tx.id, error = %e, "Could not load wallet after signer change");
                return;
            }
        };
        match updated {
            Ok(wallet) => {
                if let Err(e) = self.store.update_wallet(&wallet).await {
                    tracing::warn!(tx_id = %tx.id, error = %e, "Could not store updated wallet");
                } else {
                    tracing::info!(
                        wallet_id = %wallet.id(),
                        signers = wallet.signer_count(),
                        threshold = wallet.threshold(),
                        "Wallet signer set updated"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(tx_id = %tx.id, error = %e, "Executed change does not apply to stored wallet");
            }
        }
    }

    // ── Proof jobs ──────────────────────────────────────────────────

    /// Forward a proof to the aggregation service and track the job.
    ///
    /// Not retried: a failed submission is returned to the caller.
    #[tracing::instrument(skip_all, fields(tx_id = %tx_id))]
    pub async fn submit_proof(
        &self,
        tx_id: TransactionId,
        nullifier: Nullifier,
        submission: &ProofSubmission,
    ) -> Result<ProofJob> {
        let tx = self.load(tx_id).await?;
        if tx.is_terminal() {
            return Err(CoordinatorError::TransactionResolved { status: tx.status });
        }
        if self.store.proof_job_by_nullifier(&nullifier).await?.is_some() {
            return Err(CoordinatorError::DuplicateNullifier);
        }

        let resp = self.prover.submit_proof(submission).await?;
        if resp.optimistic_verify.is_some() && !resp.optimistic_verify_passed() {
            return Err(CoordinatorError::InvalidProof(format!(
                "optimistic verification reported {:?}",
                resp.optimistic_verify
            )));
        }
        let external_id = ExternalJobId::try_from(&resp)?;
        self.tracker.submit(external_id, nullifier, tx_id).await
    }

    /// Store aggregation artifacts and re-check the threshold.
    pub async fn record_aggregation(
        &self,
        job_id: ProofJobId,
        artifact: AggregationArtifact,
    ) -> Result<Transaction> {
        let job = self.tracker.record_aggregation(job_id, artifact).await?;
        self.reevaluate(job.transaction_id).await
    }

    /// Mark a job failed. Its vote, if any, will never count.
    ///
    /// No recount follows: a failed job adds to neither aggregated
    /// approvals nor denials, so it can never move a transaction forward.
    pub async fn mark_job_failed(&self, job_id: ProofJobId, reason: String) -> Result<ProofJob> {
        let job = self
            .tracker
            .update_status(job_id, ProofJobStatus::Failed, Some(reason))
            .await?;
        tracing::warn!(job_id = %job_id, tx_id = %job.transaction_id, "Proof job failed");
        Ok(job)
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Aggregated proofs recorded for `tx_id`.
    pub async fn get_aggregations(&self, tx_id: TransactionId) -> Result<Vec<ExecutionProof>> {
        self.load(tx_id).await?;
        self.tracker.aggregated_for_transaction(tx_id).await
    }

    pub async fn transaction(&self, tx_id: TransactionId) -> Result<TransactionDetails> {
        let transaction = self.load(tx_id).await?;
        let votes = self.store.votes(tx_id).await?;
        let proof_jobs = self.store.proof_jobs_for_transaction(tx_id).await?;
        Ok(TransactionDetails {
            transaction,
            votes,
            proof_jobs,
        })
    }
}
