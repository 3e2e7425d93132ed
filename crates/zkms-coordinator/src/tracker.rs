//! # Proof Job Tracker
//!
//! Persists [`ProofJob`] transitions. The tracker never calls the proof
//! service itself: the poller (or a webhook handler) reports what the
//! service said and the tracker applies it.
//!
//! Every write is compare-and-set on the status that was read, so two
//! reporters racing on one job cannot regress it. A lost race re-reads the
//! job and applies the update again, which then either no-ops or fails with
//! `InvalidTransition`.

use std::sync::Arc;

use zkms_core::{ExternalJobId, Nullifier, ProofJobId, TransactionId};
use zkms_state::{AggregationArtifact, ExecutionProof, ProofJob, ProofJobStatus};
use zkms_store::MultisigStore;

use crate::error::{CoordinatorError, Result};

#[derive(Clone)]
pub struct ProofJobTracker {
    store: Arc<dyn MultisigStore>,
}

impl ProofJobTracker {
    pub fn new(store: Arc<dyn MultisigStore>) -> Self {
        Self { store }
    }

    /// Track a newly submitted proof as a `Pending` job.
    ///
    /// Fails with `DuplicateNullifier` if a job already exists for the
    /// nullifier and `DuplicateJobId` if the external id is tracked.
    pub async fn submit(
        &self,
        external_id: ExternalJobId,
        nullifier: Nullifier,
        transaction: TransactionId,
    ) -> Result<ProofJob> {
        if self.store.transaction(transaction).await?.is_none() {
            return Err(CoordinatorError::not_found("transaction", transaction));
        }
        let job = ProofJob::new(external_id, nullifier, transaction);
        self.store.insert_proof_job(&job).await?;
        tracing::info!(
            job_id = %job.id,
            external_id = %job.external_id,
            tx_id = %transaction,
            "Proof job tracked"
        );
        Ok(job)
    }

    pub async fn job(&self, id: ProofJobId) -> Result<ProofJob> {
        self.store
            .proof_job(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("proof job", id))
    }

    /// Move a job to `Pending` or `Failed`. Re-reporting the current status
    /// is a no-op; moving a terminal job back to `Pending` fails.
    pub async fn update_status(
        &self,
        id: ProofJobId,
        status: ProofJobStatus,
        reason: Option<String>,
    ) -> Result<ProofJob> {
        loop {
            let mut job = self.job(id).await?;
            let expected = job.status;
            if !job.update_status(status, reason.clone())? {
                return Ok(job);
            }
            if self.store.update_proof_job(&job, expected).await? {
                tracing::info!(job_id = %id, from = %expected, to = %status, "Proof job updated");
                return Ok(job);
            }
            tracing::debug!(job_id = %id, "Proof job changed concurrently, re-reading");
        }
    }

    /// `Pending` → `Aggregated` with the artifacts needed on-chain.
    pub async fn record_aggregation(
        &self,
        id: ProofJobId,
        artifact: AggregationArtifact,
    ) -> Result<ProofJob> {
        loop {
            let mut job = self.job(id).await?;
            let expected = job.status;
            job.record_aggregation(artifact.clone())?;
            if self.store.update_proof_job(&job, expected).await? {
                tracing::info!(
                    job_id = %id,
                    tx_id = %job.transaction_id,
                    aggregation_id = artifact.aggregation_id,
                    "Proof job aggregated"
                );
                return Ok(job);
            }
            tracing::debug!(job_id = %id, "Proof job changed concurrently, re-reading");
        }
    }

    /// Aggregated jobs of `transaction`, ready for the execution call.
    pub async fn aggregated_for_transaction(
        &self,
        transaction: TransactionId,
    ) -> Result<Vec<ExecutionProof>> {
        let jobs = self.store.proof_jobs_for_transaction(transaction).await?;
        Ok(jobs.iter().filter_map(ProofJob::execution_proof).collect())
    }

    pub async fn jobs_for_transaction(&self, transaction: TransactionId) -> Result<Vec<ProofJob>> {
        Ok(self.store.proof_jobs_for_transaction(transaction).await?)
    }

    /// Up to `limit` pending jobs, oldest first.
    pub async fn pending(&self, limit: usize) -> Result<Vec<ProofJob>> {
        Ok(self.store.pending_proof_jobs(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkms_core::{
        Address, CallData, Commitment, Hash32, TransactionPayload, Wallet, WalletId,
    };
    use zkms_state::{Transaction, Vote};
    use zkms_store::{MemoryStore, TransactionStore, WalletStore};

    fn artifact() -> AggregationArtifact {
        AggregationArtifact {
            aggregation_id: 9,
            domain_id: 0,
            merkle_proof: vec![Hash32::from_u64(5)],
            leaf_count: 2,
            leaf_index: 0,
        }
    }

    async fn setup() -> (ProofJobTracker, TransactionId) {
        let store = Arc::new(MemoryStore::new());
        let wallet = Wallet::new(
            WalletId::new(),
            Address::from_bytes([1; 20]),
            (1..=3).map(Commitment::from_u64).collect(),
            2,
        )
        .unwrap();
        store.register_wallet(&wallet, 0).await.unwrap();
        let payload = TransactionPayload::Transfer {
            to: Address::from_bytes([2; 20]),
            value: 10,
            data: CallData::default(),
        };
        let mut tx = Transaction::propose(&wallet, 0, payload, Hash32::ZERO).unwrap();
        tx.begin_voting().unwrap();
        let job = ProofJob::new(
            ExternalJobId::new("proposer").unwrap(),
            Nullifier::from_u64(100),
            tx.id,
        );
        let vote = Vote::approve(tx.id, job.nullifier, job.id, true);
        store.insert_proposal(&tx, &job, &vote).await.unwrap();
        (ProofJobTracker::new(store), tx.id)
    }

    fn ext(s: &str) -> ExternalJobId {
        ExternalJobId::new(s).unwrap()
    }

    #[tokio::test]
    async fn duplicate_nullifier_creates_no_second_job() {
        let (tracker, tx) = setup().await;
        tracker.submit(ext("a"), Nullifier::from_u64(1), tx).await.unwrap();
        let err = tracker
            .submit(ext("b"), Nullifier::from_u64(1), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::DuplicateNullifier));
        assert_eq!(tracker.jobs_for_transaction(tx).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_external_id_is_rejected() {
        let (tracker, tx) = setup().await;
        tracker.submit(ext("a"), Nullifier::from_u64(1), tx).await.unwrap();
        let err = tracker
            .submit(ext("a"), Nullifier::from_u64(2), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::DuplicateJobId));
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let (tracker, _) = setup().await;
        let err = tracker
            .submit(ext("a"), Nullifier::from_u64(1), TransactionId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn aggregated_job_cannot_return_to_pending() {
        let (tracker, tx) = setup().await;
        let job = tracker.submit(ext("a"), Nullifier::from_u64(1), tx).await.unwrap();
        tracker.record_aggregation(job.id, artifact()).await.unwrap();
        let err = tracker
            .update_status(job.id, ProofJobStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidTransition { .. }));
        assert!(tracker
            .record_aggregation(job.id, artifact())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn repeated_reports_are_no_ops() {
        let (tracker, tx) = setup().await;
        let job = tracker.submit(ext("a"), Nullifier::from_u64(1), tx).await.unwrap();
        let same = tracker
            .update_status(job.id, ProofJobStatus::Pending, None)
            .await
            .unwrap();
        assert_eq!(same.updated_at, job.updated_at);

        tracker
            .update_status(job.id, ProofJobStatus::Failed, Some("rejected".into()))
            .await
            .unwrap();
        let again = tracker
            .update_status(job.id, ProofJobStatus::Failed, Some("rejected".into()))
            .await
            .unwrap();
        assert_eq!(again.status, ProofJobStatus::Failed);
        assert_eq!(again.failure_reason.as_deref(), Some("rejected"));
    }

    #[tokio::test]
    async fn only_aggregated_jobs_are_listed_for_execution() {
        let (tracker, tx) = setup().await;
        let a = tracker.submit(ext("a"), Nullifier::from_u64(1), tx).await.unwrap();
        let b = tracker.submit(ext("b"), Nullifier::from_u64(2), tx).await.unwrap();
        tracker.record_aggregation(a.id, artifact()).await.unwrap();
        tracker
            .update_status(b.id, ProofJobStatus::Failed, None)
            .await
            .unwrap();

        let proofs = tracker.aggregated_for_transaction(tx).await.unwrap();
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].nullifier, Nullifier::from_u64(1));
        assert_eq!(proofs[0].artifact, artifact());

        let pending = tracker.pending(10).await.unwrap();
        assert_eq!(pending.len(), 1, "only the proposer's job is still pending");
    }
}
