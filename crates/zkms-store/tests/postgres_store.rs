//! PostgreSQL backend tests.
//!
//! These run against a live database and are skipped unless `DATABASE_URL`
//! is set. Each test registers its own wallet, so runs do not interfere.

use std::sync::Arc;

use zkms_core::{
    Address, CallData, Commitment, ExternalJobId, Hash32, Nullifier, TransactionPayload, TxHash,
    Wallet, WalletId,
};
use zkms_state::{AggregationArtifact, ProofJob, ProofJobStatus, Transaction, TransactionStatus, Vote};
use zkms_store::{PgStore, ProofJobStore, StoreError, TransactionStore, UniqueConstraint, WalletStore};

async fn store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let store = PgStore::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    Some(store)
}

fn wallet() -> Wallet {
    let signers = (1..=3).map(Commitment::from_u64).collect();
    Wallet::new(WalletId::new(), Address::from_bytes([0xaa; 20]), signers, 2).unwrap()
}

fn transfer(w: &Wallet, nonce: u64) -> Transaction {
    let payload = TransactionPayload::Transfer {
        to: Address::from_bytes([0x01; 20]),
        value: u128::MAX,
        data: CallData::new(vec![0xde, 0xad]),
    };
    Transaction::propose(w, nonce, payload, Hash32::from_u64(9)).unwrap()
}

fn unique_nullifier() -> Nullifier {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    Nullifier::from_bytes(bytes)
}

fn job(tx: &Transaction, nullifier: Nullifier) -> ProofJob {
    ProofJob::new(
        ExternalJobId::new(uuid::Uuid::new_v4().to_string()).unwrap(),
        nullifier,
        tx.id,
    )
}

async fn propose(store: &PgStore, w: &Wallet) -> (Transaction, ProofJob) {
    let nonce = store.reserve_nonce(w.id()).await.unwrap();
    let mut tx = transfer(w, nonce);
    tx.begin_voting().unwrap();
    let j = job(&tx, unique_nullifier());
    let v = Vote::approve(tx.id, j.nullifier, j.id, true);
    store.insert_proposal(&tx, &j, &v).await.unwrap();
    (tx, j)
}

#[tokio::test]
async fn transaction_round_trips_through_rows() {
    let Some(store) = store().await else { return };
    let w = wallet();
    store.register_wallet(&w, 0).await.unwrap();
    let (tx, j) = propose(&store, &w).await;

    let loaded = store.transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(loaded.value, u128::MAX);
    assert_eq!(loaded.data.as_bytes(), &[0xde, 0xad]);
    assert_eq!(loaded.status, TransactionStatus::Voting);
    assert_eq!(loaded.transitions.len(), 1);
    assert_eq!(loaded.signing_hash(), tx.signing_hash());

    let votes = store.votes(tx.id).await.unwrap();
    assert_eq!(votes.len(), 1);
    assert!(votes[0].is_proposer);
    assert_eq!(votes[0].proof_job(), Some(j.id));
    assert_eq!(store.wallet(w.id()).await.unwrap().unwrap(), w);
}

#[tokio::test]
async fn concurrent_nonce_reservations_are_distinct() {
    let Some(store) = store().await else { return };
    let store = Arc::new(store);
    let w = wallet();
    store.register_wallet(&w, 3).await.unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let store = store.clone();
            let id = w.id();
            tokio::spawn(async move { store.reserve_nonce(id).await.unwrap() })
        })
        .collect();
    let mut nonces = Vec::new();
    for h in handles {
        nonces.push(h.await.unwrap());
    }
    nonces.sort_unstable();
    assert_eq!(nonces, (3..23).collect::<Vec<u64>>());
}

#[tokio::test]
async fn unknown_wallet_nonce_is_not_found() {
    let Some(store) = store().await else { return };
    let err = store.reserve_nonce(WalletId::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_nullifier_vote_is_rejected() {
    let Some(store) = store().await else { return };
    let w = wallet();
    store.register_wallet(&w, 0).await.unwrap();
    let (tx, j) = propose(&store, &w).await;

    let other = job(&tx, unique_nullifier());
    store.insert_proof_job(&other).await.unwrap();
    let replay = Vote::approve(tx.id, j.nullifier, other.id, false);
    let err = store.insert_vote(&replay).await.unwrap_err();
    assert!(err.is_unique_violation(&UniqueConstraint::VoteNullifier));
}

#[tokio::test]
async fn status_updates_are_compare_and_set() {
    let Some(store) = store().await else { return };
    let w = wallet();
    store.register_wallet(&w, 0).await.unwrap();
    let (mut tx, mut j) = propose(&store, &w).await;

    tx.reach_threshold().unwrap();
    assert!(store.update_transaction(&tx, TransactionStatus::Voting).await.unwrap());
    assert!(!store.update_transaction(&tx, TransactionStatus::Voting).await.unwrap());

    assert!(store.claim_execution(tx.id, zkms_core::Timestamp::now()).await.unwrap());
    assert!(!store.claim_execution(tx.id, zkms_core::Timestamp::now()).await.unwrap());

    tx.mark_executed(TxHash::from_u64(77)).unwrap();
    assert!(store
        .update_transaction(&tx, TransactionStatus::ThresholdReached)
        .await
        .unwrap());
    let loaded = store.transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(loaded.tx_hash, Some(TxHash::from_u64(77)));
    assert!(loaded.executed_at.is_some());

    j.record_aggregation(AggregationArtifact {
        aggregation_id: 4,
        domain_id: 0,
        merkle_proof: vec![Hash32::from_u64(1)],
        leaf_count: 2,
        leaf_index: 1,
    })
    .unwrap();
    assert!(store.update_proof_job(&j, ProofJobStatus::Pending).await.unwrap());
    assert!(!store.update_proof_job(&j, ProofJobStatus::Pending).await.unwrap());
    let loaded = store.proof_job(j.id).await.unwrap().unwrap();
    assert_eq!(loaded.aggregation, j.aggregation);
}

#[tokio::test]
async fn votes_on_resolved_transactions_are_refused() {
    let Some(store) = store().await else { return };
    let w = wallet();
    store.register_wallet(&w, 0).await.unwrap();
    let (mut tx, _) = propose(&store, &w).await;
    tx.deny("denied").unwrap();
    assert!(store.update_transaction(&tx, TransactionStatus::Voting).await.unwrap());

    let err = store
        .insert_vote(&Vote::deny(tx.id, Commitment::from_u64(2)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::TransactionClosed {
            status: TransactionStatus::Denied,
            ..
        }
    ));
    assert_eq!(store.votes(tx.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stalled_transactions_follow_the_tally() {
    let Some(store) = store().await else { return };
    let w = wallet();
    store.register_wallet(&w, 0).await.unwrap();
    let (tx, _) = propose(&store, &w).await;
    assert!(!store.stalled_transactions(10_000).await.unwrap().contains(&tx.id));

    for voter in [2, 3] {
        store
            .insert_vote(&Vote::deny(tx.id, Commitment::from_u64(voter)))
            .await
            .unwrap();
    }
    assert!(store.stalled_transactions(10_000).await.unwrap().contains(&tx.id));
}
