//! Shared fixture: an in-memory coordinator with scripted proof service and
//! chain, plus signers holding real secrets.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use zkms_client::{MockChainRpc, MockProofService, ProofData, ProofSubmission};
use zkms_coordinator::{CoordinatorConfig, ProposalProof, Result, TransactionService};
use zkms_core::{
    Address, CallData, Commitment, ExternalJobId, Hash32, Nullifier, TransactionPayload,
    Wallet, WalletId,
};
use zkms_crypto::{
    commitment_from_secret, derive_nullifier, MembershipClaim, MembershipTree, SignerSecret,
};
use zkms_state::{AggregationArtifact, ProofJob, Transaction};
use zkms_store::{MemoryStore, WalletStore};

pub struct Signer {
    pub secret: SignerSecret,
    pub commitment: Commitment,
}

impl Signer {
    pub fn new(seed: u8) -> Self {
        let secret = SignerSecret::from_bytes([seed; 32]);
        let commitment = commitment_from_secret(&secret);
        Self { secret, commitment }
    }

    pub fn nullifier(&self, tx: &Transaction) -> Nullifier {
        derive_nullifier(&self.secret, &tx.signing_hash())
    }
}

pub struct World {
    pub service: Arc<TransactionService>,
    pub store: Arc<MemoryStore>,
    pub chain: Arc<MockChainRpc>,
    pub prover: Arc<MockProofService>,
    pub wallet_id: WalletId,
    pub signers: Vec<Signer>,
    aggregations: AtomicU64,
    proposals: AtomicU64,
}

pub fn config() -> CoordinatorConfig {
    CoordinatorConfig {
        exec_base_delay_ms: 1,
        exec_attempt_timeout_secs: 1,
        ..CoordinatorConfig::default()
    }
}

/// A registered wallet with `signers` members and `threshold`.
pub async fn world(signers: u8, threshold: u32) -> World {
    let store = Arc::new(MemoryStore::new());
    let chain = Arc::new(MockChainRpc::new());
    let prover = Arc::new(MockProofService::new());
    let signers: Vec<Signer> = (1..=signers).map(Signer::new).collect();
    let wallet = Wallet::new(
        WalletId::new(),
        Address::from_bytes([0x5a; 20]),
        signers.iter().map(|s| s.commitment).collect(),
        threshold,
    )
    .unwrap();
    store.register_wallet(&wallet, 0).await.unwrap();
    let service = Arc::new(TransactionService::new(
        store.clone(),
        chain.clone(),
        prover.clone(),
        &config(),
    ));
    World {
        service,
        store,
        chain,
        prover,
        wallet_id: wallet.id(),
        signers,
        aggregations: AtomicU64::new(1),
        proposals: AtomicU64::new(1),
    }
}

pub fn transfer(value: u128) -> TransactionPayload {
    TransactionPayload::Transfer {
        to: Address::from_bytes([0x11; 20]),
        value,
        data: CallData::default(),
    }
}

pub fn submission() -> ProofSubmission {
    ProofSubmission {
        proof_type: "groth16".into(),
        vk_registered: true,
        chain_id: Some(11_155_111),
        proof_data: ProofData {
            proof: serde_json::json!({ "pi_a": ["1", "2"], "pi_b": [["3", "4"]], "pi_c": ["5"] }),
            public_signals: serde_json::json!(["7", "8"]),
            vk: serde_json::json!("0x9f"),
        },
    }
}

impl World {
    pub async fn wallet(&self) -> Wallet {
        self.store.wallet(self.wallet_id).await.unwrap().unwrap()
    }

    /// The claim `signer` proves against the wallet's current signer set.
    pub async fn claim(&self, commitment: &Commitment) -> MembershipClaim {
        let wallet = self.wallet().await;
        let tree = MembershipTree::build(wallet.signers()).unwrap();
        MembershipClaim {
            root: tree.root(),
            leaf_index: wallet.signer_index(commitment).unwrap(),
        }
    }

    /// Propose as `signer`. The proposer's proof is generated before the
    /// nonce is known, so its nullifier is keyed on a per-proposal digest.
    pub async fn propose(&self, signer: usize, payload: TransactionPayload) -> Result<Transaction> {
        let n = self.proposals.fetch_add(1, Ordering::SeqCst);
        let nullifier = derive_nullifier(&self.signers[signer].secret, &Hash32::from_u64(n));
        let proof = ProposalProof {
            claim: self.claim(&self.signers[signer].commitment).await,
            nullifier,
            external_job_id: ExternalJobId::new(format!("proposal-{n}")).unwrap(),
        };
        self.service
            .propose(self.wallet_id, payload.kind(), payload, proof)
            .await
    }

    /// Submit `signer`'s proof for `tx` and cast the approval.
    pub async fn approve(&self, signer: usize, tx: &Transaction) -> Result<(Transaction, ProofJob)> {
        let nullifier = self.signers[signer].nullifier(tx);
        let job = self
            .service
            .submit_proof(tx.id, nullifier, &submission())
            .await?;
        let tx = self.service.approve(tx.id, nullifier, job.id).await?;
        Ok((tx, job))
    }

    pub async fn aggregate(&self, job: &ProofJob) -> Transaction {
        let n = self.aggregations.fetch_add(1, Ordering::SeqCst);
        let artifact = AggregationArtifact {
            aggregation_id: n,
            domain_id: 0,
            merkle_proof: vec![Hash32::from_u64(n), Hash32::from_u64(n + 100)],
            leaf_count: 4,
            leaf_index: n % 4,
        };
        self.service
            .record_aggregation(job.id, artifact)
            .await
            .unwrap()
    }

    /// The proof job backing the proposer's automatic approval.
    pub async fn proposer_job(&self, tx: &Transaction) -> ProofJob {
        let details = self.service.transaction(tx.id).await.unwrap();
        let vote = details.votes.iter().find(|v| v.is_proposer).unwrap();
        let job_id = vote.proof_job().unwrap();
        details
            .proof_jobs
            .into_iter()
            .find(|j| j.id == job_id)
            .unwrap()
    }

    pub async fn reload(&self, tx: &Transaction) -> Transaction {
        self.service.transaction(tx.id).await.unwrap().transaction
    }
}
