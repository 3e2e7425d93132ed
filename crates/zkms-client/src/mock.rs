//! Scriptable in-process doubles for the external services.
//!
//! Results are queued per call. When a queue is empty the double answers
//! with a default success, so tests only script the calls they care about.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use zkms_core::{keccak256, ExternalJobId, OnChainCall, TxHash};

use crate::chain::{ChainRpc, Receipt};
use crate::error::{ChainError, ProofServiceError};
use crate::proof_service::ProofSubmissionService;
use crate::types::{JobOutcome, ProofSubmission, SubmitProofResponse};

// -- Chain --------------------------------------------------------------------

#[derive(Default)]
struct ChainScript {
    call_results: VecDeque<Result<TxHash, ChainError>>,
    receipt_results: VecDeque<Result<Receipt, ChainError>>,
    calls: Vec<OnChainCall>,
    receipt_requests: Vec<TxHash>,
    hang_receipts: bool,
}

/// Chain double recording every call.
#[derive(Default)]
pub struct MockChainRpc {
    script: Mutex<ChainScript>,
    sequence: AtomicU64,
}

impl MockChainRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `call`.
    pub fn push_call(&self, result: Result<TxHash, ChainError>) {
        self.script.lock().call_results.push_back(result);
    }

    /// Queue the result of the next `wait_for_receipt`.
    pub fn push_receipt(&self, result: Result<Receipt, ChainError>) {
        self.script.lock().receipt_results.push_back(result);
    }

    /// Make unscripted receipt waits never complete.
    pub fn hang_receipts(&self, hang: bool) {
        self.script.lock().hang_receipts = hang;
    }

    /// Every call submitted so far.
    pub fn calls(&self) -> Vec<OnChainCall> {
        self.script.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().calls.len()
    }

    pub fn receipt_requests(&self) -> Vec<TxHash> {
        self.script.lock().receipt_requests.clone()
    }
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    async fn call(&self, call: &OnChainCall) -> Result<TxHash, ChainError> {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock();
        script.calls.push(call.clone());
        script
            .call_results
            .pop_front()
            .unwrap_or_else(|| Ok(TxHash::from_bytes(keccak256(n.to_be_bytes()))))
    }

    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<Receipt, ChainError> {
        let scripted = {
            let mut script = self.script.lock();
            script.receipt_requests.push(*tx_hash);
            match script.receipt_results.pop_front() {
                Some(result) => Some(result),
                None if script.hang_receipts => None,
                None => Some(Ok(Receipt {
                    tx_hash: *tx_hash,
                    block_number: 1,
                    success: true,
                    gas_used: 21_000,
                })),
            }
        };
        match scripted {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

// -- Proof service ------------------------------------------------------------

#[derive(Default)]
struct ProofScript {
    submit_results: VecDeque<Result<SubmitProofResponse, ProofServiceError>>,
    outcomes: HashMap<ExternalJobId, JobOutcome>,
    status_errors: HashMap<ExternalJobId, VecDeque<ProofServiceError>>,
    submissions: Vec<ProofSubmission>,
    status_requests: Vec<ExternalJobId>,
}

/// Proof service double. Unknown jobs report `Pending`.
#[derive(Default)]
pub struct MockProofService {
    script: Mutex<ProofScript>,
    sequence: AtomicU64,
}

impl MockProofService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `submit_proof`.
    pub fn push_submit(&self, result: Result<SubmitProofResponse, ProofServiceError>) {
        self.script.lock().submit_results.push_back(result);
    }

    /// Report `outcome` for `job` from now on.
    pub fn set_outcome(&self, job: &ExternalJobId, outcome: JobOutcome) {
        self.script.lock().outcomes.insert(job.clone(), outcome);
    }

    /// Fail the next status check for `job` once.
    pub fn fail_next_status(&self, job: &ExternalJobId, err: ProofServiceError) {
        self.script
            .lock()
            .status_errors
            .entry(job.clone())
            .or_default()
            .push_back(err);
    }

    pub fn submissions(&self) -> Vec<ProofSubmission> {
        self.script.lock().submissions.clone()
    }

    pub fn status_requests(&self) -> Vec<ExternalJobId> {
        self.script.lock().status_requests.clone()
    }
}

#[async_trait]
impl ProofSubmissionService for MockProofService {
    async fn submit_proof(
        &self,
        submission: &ProofSubmission,
    ) -> Result<SubmitProofResponse, ProofServiceError> {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock();
        script.submissions.push(submission.clone());
        script.submit_results.pop_front().unwrap_or_else(|| {
            Ok(SubmitProofResponse {
                job_id: format!("mock-job-{n}"),
                optimistic_verify: Some("success".into()),
            })
        })
    }

    async fn job_status(&self, job_id: &ExternalJobId) -> Result<JobOutcome, ProofServiceError> {
        let mut script = self.script.lock();
        script.status_requests.push(job_id.clone());
        if let Some(err) = script
            .status_errors
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(script
            .outcomes
            .get(job_id)
            .cloned()
            .unwrap_or(JobOutcome::Pending))
    }
}
