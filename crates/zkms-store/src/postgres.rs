//! # PostgreSQL Store
//!
//! All functions go through a shared `PgPool`. Lifecycle rules are enforced
//! by the state machines in `zkms-state`. SQL only provides atomicity:
//!
//! - the nonce counter is an `INSERT … ON CONFLICT DO UPDATE … RETURNING`
//!   upsert, so two proposals racing on one wallet serialize on the row;
//! - duplicate votes and proof jobs hit unique indexes, reported as
//!   [`StoreError::UniqueViolation`];
//! - status writes carry `WHERE status = $expected`;
//! - votes are inserted through a `FOR SHARE` read of an open transaction
//!   row, so no vote lands after the transaction resolved.
//!
//! 256-bit values are stored as canonical `0x` hex text and `u128` amounts
//! as decimal text.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgExecutor;
use uuid::Uuid;

use zkms_core::{
    Address, CallData, Commitment, ExternalJobId, Hash32, Nullifier, ProofJobId, Timestamp,
    TransactionId, TransactionPayload, TxHash, VoteId, Wallet, WalletId,
};
use zkms_state::{
    AggregationArtifact, Ballot, ProofJob, ProofJobStatus, Transaction, TransactionStatus,
    TransitionRecord, Vote, VoteKind,
};

use crate::error::{Result, StoreError};
use crate::traits::{ProofJobStore, TransactionStore, WalletStore};

/// Store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with the workspace's standard pool sizing.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ── Conversions ─────────────────────────────────────────────────────

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {err}"))
}

fn to_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|e| corrupt(what, e))
}

fn to_u64(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|e| corrupt(what, e))
}

fn dt(ts: &Timestamp) -> DateTime<Utc> {
    *ts.as_datetime()
}

fn json<T: serde::Serialize>(value: &T, what: &str) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| corrupt(what, e))
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value, what: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| corrupt(what, e))
}

fn parse<T: std::str::FromStr>(s: &str, what: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    s.parse().map_err(|e| corrupt(what, e))
}

// ── Row types ───────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct WalletRow {
    id: Uuid,
    address: String,
    signers: serde_json::Value,
    threshold: i32,
}

impl WalletRow {
    fn into_record(self) -> Result<Wallet> {
        let signers: Vec<Commitment> = from_json(self.signers, "wallet signers")?;
        let threshold = u32::try_from(self.threshold).map_err(|e| corrupt("threshold", e))?;
        Wallet::new(
            WalletId(self.id),
            parse(&self.address, "wallet address")?,
            signers,
            threshold,
        )
        .map_err(|e| corrupt("wallet", e))
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    wallet_id: Uuid,
    wallet_address: String,
    nonce: i64,
    payload: serde_json::Value,
    to_address: String,
    value: String,
    call_data: Vec<u8>,
    threshold_snapshot: i32,
    signer_count_snapshot: i32,
    signer_root_snapshot: String,
    status: String,
    transition_log: serde_json::Value,
    created_at: DateTime<Utc>,
    execution_started_at: Option<DateTime<Utc>>,
    executed_at: Option<DateTime<Utc>>,
    tx_hash: Option<String>,
    failure_reason: Option<String>,
}

impl TransactionRow {
    fn into_record(self) -> Result<Transaction> {
        let payload: TransactionPayload = from_json(self.payload, "transaction payload")?;
        let transitions: Vec<TransitionRecord> = from_json(self.transition_log, "transition log")?;
        let tx_hash = self
            .tx_hash
            .as_deref()
            .map(|h| parse::<TxHash>(h, "tx hash"))
            .transpose()?;
        Ok(Transaction {
            id: TransactionId(self.id),
            wallet_id: WalletId(self.wallet_id),
            wallet_address: parse::<Address>(&self.wallet_address, "wallet address")?,
            nonce: to_u64(self.nonce, "nonce")?,
            payload,
            to: parse::<Address>(&self.to_address, "to address")?,
            value: parse::<u128>(&self.value, "value")?,
            data: CallData::new(self.call_data),
            threshold_snapshot: u32::try_from(self.threshold_snapshot)
                .map_err(|e| corrupt("threshold snapshot", e))?,
            signer_count_snapshot: u32::try_from(self.signer_count_snapshot)
                .map_err(|e| corrupt("signer count snapshot", e))?,
            signer_root_snapshot: parse::<Hash32>(&self.signer_root_snapshot, "signer root")?,
            status: TransactionStatus::from_name(&self.status)
                .map_err(|e| corrupt("transaction status", e))?,
            created_at: Timestamp::from_utc(self.created_at),
            execution_started_at: self.execution_started_at.map(Timestamp::from_utc),
            executed_at: self.executed_at.map(Timestamp::from_utc),
            tx_hash,
            failure_reason: self.failure_reason,
            transitions,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VoteRow {
    id: Uuid,
    transaction_id: Uuid,
    kind: String,
    nullifier: Option<String>,
    proof_job_id: Option<Uuid>,
    voter: Option<String>,
    is_proposer: bool,
    created_at: DateTime<Utc>,
}

impl VoteRow {
    fn into_record(self) -> Result<Vote> {
        let ballot = match (self.kind.as_str(), self.nullifier, self.proof_job_id, self.voter) {
            ("APPROVE", Some(nullifier), Some(job), None) => Ballot::Approve {
                nullifier: parse::<Nullifier>(&nullifier, "vote nullifier")?,
                proof_job: ProofJobId(job),
            },
            ("DENY", None, None, Some(voter)) => Ballot::Deny {
                voter: parse::<Commitment>(&voter, "vote voter")?,
            },
            (kind, ..) => return Err(corrupt("vote", format!("malformed {kind} ballot"))),
        };
        Ok(Vote {
            id: VoteId(self.id),
            transaction_id: TransactionId(self.transaction_id),
            ballot,
            is_proposer: self.is_proposer,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProofJobRow {
    id: Uuid,
    external_id: String,
    nullifier: String,
    transaction_id: Uuid,
    status: String,
    aggregation: Option<serde_json::Value>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProofJobRow {
    fn into_record(self) -> Result<ProofJob> {
        let aggregation = self
            .aggregation
            .map(|v| from_json::<AggregationArtifact>(v, "aggregation artifact"))
            .transpose()?;
        Ok(ProofJob {
            id: ProofJobId(self.id),
            external_id: ExternalJobId::new(self.external_id)
                .map_err(|e| corrupt("external job id", e))?,
            nullifier: parse::<Nullifier>(&self.nullifier, "job nullifier")?,
            transaction_id: TransactionId(self.transaction_id),
            status: ProofJobStatus::from_name(&self.status)
                .map_err(|e| corrupt("proof job status", e))?,
            aggregation,
            failure_reason: self.failure_reason,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}

const TRANSACTION_COLUMNS: &str = "id, wallet_id, wallet_address, nonce, payload, to_address, \
     value, call_data, threshold_snapshot, signer_count_snapshot, signer_root_snapshot, status, \
     transition_log, created_at, execution_started_at, executed_at, tx_hash, failure_reason";

const VOTE_COLUMNS: &str =
    "id, transaction_id, kind, nullifier, proof_job_id, voter, is_proposer, created_at";

const PROOF_JOB_COLUMNS: &str = "id, external_id, nullifier, transaction_id, status, \
     aggregation, failure_reason, created_at, updated_at";

// ── Shared inserts (pool or open transaction) ───────────────────────

async fn insert_transaction_row<'e>(exec: impl PgExecutor<'e>, tx: &Transaction) -> Result<()> {
    sqlx::query(
        "INSERT INTO transactions (id, wallet_id, wallet_address, nonce, kind, payload, to_address,
             value, call_data, threshold_snapshot, signer_count_snapshot, signer_root_snapshot,
             status, transition_log, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(tx.id.0)
    .bind(tx.wallet_id.0)
    .bind(tx.wallet_address.to_hex())
    .bind(to_i64(tx.nonce, "nonce")?)
    .bind(tx.kind().as_str())
    .bind(json(&tx.payload, "transaction payload")?)
    .bind(tx.to.to_hex())
    .bind(tx.value.to_string())
    .bind(tx.data.as_bytes())
    .bind(tx.threshold_snapshot as i32)
    .bind(tx.signer_count_snapshot as i32)
    .bind(tx.signer_root_snapshot.to_hex())
    .bind(tx.status.name())
    .bind(json(&tx.transitions, "transition log")?)
    .bind(dt(&tx.created_at))
    .execute(exec)
    .await?;
    Ok(())
}

/// Insert `vote` only while its transaction is open. The `FOR SHARE` lock
/// holds off a concurrent status write until the insert commits. Returns
/// whether a row was written.
async fn insert_vote_row<'e>(exec: impl PgExecutor<'e>, vote: &Vote) -> Result<bool> {
    let (nullifier, proof_job, voter) = match &vote.ballot {
        Ballot::Approve {
            nullifier,
            proof_job,
        } => (Some(nullifier.to_hex()), Some(proof_job.0), None),
        Ballot::Deny { voter } => (None, None, Some(voter.to_hex())),
    };
    let result = sqlx::query(
        "WITH open_tx AS (
             SELECT id FROM transactions WHERE id = $2 AND status <> ALL($9) FOR SHARE
         )
         INSERT INTO votes (id, transaction_id, kind, nullifier, proof_job_id, voter, is_proposer, created_at)
         SELECT $1, open_tx.id, $3, $4, $5, $6, $7, $8 FROM open_tx",
    )
    .bind(vote.id.0)
    .bind(vote.transaction_id.0)
    .bind(vote.kind().name())
    .bind(nullifier)
    .bind(proof_job)
    .bind(voter)
    .bind(vote.is_proposer)
    .bind(dt(&vote.created_at))
    .bind(terminal_statuses())
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn terminal_statuses() -> Vec<&'static str> {
    TransactionStatus::ALL
        .iter()
        .filter(|s| s.is_terminal())
        .map(|s| s.name())
        .collect()
}

async fn insert_proof_job_row<'e>(exec: impl PgExecutor<'e>, job: &ProofJob) -> Result<()> {
    let aggregation = job
        .aggregation
        .as_ref()
        .map(|a| json(a, "aggregation artifact"))
        .transpose()?;
    sqlx::query(
        "INSERT INTO proof_jobs (id, external_id, nullifier, transaction_id, status, aggregation,
             failure_reason, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(job.id.0)
    .bind(job.external_id.as_str())
    .bind(job.nullifier.to_hex())
    .bind(job.transaction_id.0)
    .bind(job.status.name())
    .bind(aggregation)
    .bind(&job.failure_reason)
    .bind(dt(&job.created_at))
    .bind(dt(&job.updated_at))
    .execute(exec)
    .await?;
    Ok(())
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl WalletStore for PgStore {
    async fn register_wallet(&self, wallet: &Wallet, starting_nonce: u64) -> Result<()> {
        let mut db = self.pool.begin().await?;
        sqlx::query("INSERT INTO wallets (id, address, signers, threshold) VALUES ($1, $2, $3, $4)")
            .bind(wallet.id().0)
            .bind(wallet.address().to_hex())
            .bind(json(&wallet.signers(), "wallet signers")?)
            .bind(wallet.threshold() as i32)
            .execute(&mut *db)
            .await?;
        sqlx::query("INSERT INTO wallet_nonces (wallet_id, next_nonce) VALUES ($1, $2)")
            .bind(wallet.id().0)
            .bind(to_i64(starting_nonce, "starting nonce")?)
            .execute(&mut *db)
            .await?;
        db.commit().await?;
        Ok(())
    }

    async fn wallet(&self, id: WalletId) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(
            "SELECT id, address, signers, threshold FROM wallets WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(WalletRow::into_record).transpose()
    }

    async fn update_wallet(&self, wallet: &Wallet) -> Result<()> {
        let result = sqlx::query(
            "UPDATE wallets SET signers = $1, threshold = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(json(&wallet.signers(), "wallet signers")?)
        .bind(wallet.threshold() as i32)
        .bind(wallet.id().0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(wallet.id().to_string()));
        }
        Ok(())
    }

    async fn reserve_nonce(&self, id: WalletId) -> Result<u64> {
        // The foreign key rejects unknown wallets; the conflict arm is the
        // normal path since registration seeds the counter.
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO wallet_nonces (wallet_id, next_nonce) VALUES ($1, 1)
             ON CONFLICT (wallet_id)
             DO UPDATE SET next_nonce = wallet_nonces.next_nonce + 1, updated_at = NOW()
             RETURNING next_nonce - 1",
        )
        .bind(id.0)
        .fetch_one(&self.pool)
        .await?;
        to_u64(row.0, "nonce")
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn insert_proposal(&self, tx: &Transaction, job: &ProofJob, vote: &Vote) -> Result<()> {
        let mut db = self.pool.begin().await?;
        insert_transaction_row(&mut *db, tx).await?;
        insert_proof_job_row(&mut *db, job).await?;
        if !insert_vote_row(&mut *db, vote).await? {
            return Err(StoreError::Corrupt(format!(
                "proposal {} was stored as {}",
                tx.id, tx.status
            )));
        }
        db.commit().await?;
        Ok(())
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TransactionRow::into_record).transpose()
    }

    async fn update_transaction(
        &self,
        tx: &Transaction,
        expected: TransactionStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE transactions
             SET status = $1, transition_log = $2, executed_at = $3, tx_hash = $4,
                 failure_reason = $5, updated_at = NOW()
             WHERE id = $6 AND status = $7",
        )
        .bind(tx.status.name())
        .bind(json(&tx.transitions, "transition log")?)
        .bind(tx.executed_at.as_ref().map(dt))
        .bind(tx.tx_hash.map(|h| h.to_hex()))
        .bind(&tx.failure_reason)
        .bind(tx.id.0)
        .bind(expected.name())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn claim_execution(&self, id: TransactionId, at: Timestamp) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE transactions SET execution_started_at = $1, updated_at = NOW()
             WHERE id = $2 AND status = $3 AND execution_started_at IS NULL",
        )
        .bind(dt(&at))
        .bind(id.0)
        .bind(TransactionStatus::ThresholdReached.name())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_vote(&self, vote: &Vote) -> Result<()> {
        if insert_vote_row(&self.pool, vote).await? {
            return Ok(());
        }
        let id = vote.transaction_id;
        let status: Option<(String,)> =
            sqlx::query_as("SELECT status FROM transactions WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;
        match status {
            Some((name,)) => Err(StoreError::TransactionClosed {
                id: id.to_string(),
                status: TransactionStatus::from_name(&name)
                    .map_err(|e| corrupt("transaction status", e))?,
            }),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn votes(&self, tx: TransactionId) -> Result<Vec<Vote>> {
        let rows = sqlx::query_as::<_, VoteRow>(&format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE transaction_id = $1 ORDER BY seq"
        ))
        .bind(tx.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(VoteRow::into_record).collect()
    }

    async fn vote_by_nullifier(
        &self,
        tx: TransactionId,
        nullifier: &Nullifier,
    ) -> Result<Option<Vote>> {
        let row = sqlx::query_as::<_, VoteRow>(&format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE transaction_id = $1 AND nullifier = $2"
        ))
        .bind(tx.0)
        .bind(nullifier.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        row.map(VoteRow::into_record).transpose()
    }

    async fn stalled_transactions(&self, limit: usize) -> Result<Vec<TransactionId>> {
        // Same rules as `VoteTally::next_status`.
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT t.id FROM transactions t
             WHERE t.status IN ($1, $2)
               AND (
                 (SELECT COUNT(*) FROM votes v WHERE v.transaction_id = t.id AND v.kind = $3)
                     >= t.signer_count_snapshot - t.threshold_snapshot + 1
                 OR (t.status = $1 AND EXISTS (SELECT 1 FROM votes v WHERE v.transaction_id = t.id))
                 OR (t.status = $2 AND (
                     SELECT COUNT(*) FROM votes v JOIN proof_jobs j ON j.id = v.proof_job_id
                     WHERE v.transaction_id = t.id AND j.status = $4
                 ) >= t.threshold_snapshot)
               )
             ORDER BY t.created_at
             LIMIT $5",
        )
        .bind(TransactionStatus::Proposed.name())
        .bind(TransactionStatus::Voting.name())
        .bind(VoteKind::Deny.name())
        .bind(ProofJobStatus::Aggregated.name())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| TransactionId(id)).collect())
    }
}

#[async_trait]
impl ProofJobStore for PgStore {
    async fn insert_proof_job(&self, job: &ProofJob) -> Result<()> {
        insert_proof_job_row(&self.pool, job).await
    }

    async fn proof_job(&self, id: ProofJobId) -> Result<Option<ProofJob>> {
        let row = sqlx::query_as::<_, ProofJobRow>(&format!(
            "SELECT {PROOF_JOB_COLUMNS} FROM proof_jobs WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProofJobRow::into_record).transpose()
    }

    async fn proof_job_by_nullifier(&self, nullifier: &Nullifier) -> Result<Option<ProofJob>> {
        let row = sqlx::query_as::<_, ProofJobRow>(&format!(
            "SELECT {PROOF_JOB_COLUMNS} FROM proof_jobs WHERE nullifier = $1"
        ))
        .bind(nullifier.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProofJobRow::into_record).transpose()
    }

    async fn update_proof_job(&self, job: &ProofJob, expected: ProofJobStatus) -> Result<bool> {
        let aggregation = job
            .aggregation
            .as_ref()
            .map(|a| json(a, "aggregation artifact"))
            .transpose()?;
        let result = sqlx::query(
            "UPDATE proof_jobs
             SET status = $1, aggregation = $2, failure_reason = $3, updated_at = $4
             WHERE id = $5 AND status = $6",
        )
        .bind(job.status.name())
        .bind(aggregation)
        .bind(&job.failure_reason)
        .bind(dt(&job.updated_at))
        .bind(job.id.0)
        .bind(expected.name())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn proof_jobs_for_transaction(&self, tx: TransactionId) -> Result<Vec<ProofJob>> {
        let rows = sqlx::query_as::<_, ProofJobRow>(&format!(
            "SELECT {PROOF_JOB_COLUMNS} FROM proof_jobs WHERE transaction_id = $1 ORDER BY created_at"
        ))
        .bind(tx.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProofJobRow::into_record).collect()
    }

    async fn pending_proof_jobs(&self, limit: usize) -> Result<Vec<ProofJob>> {
        let rows = sqlx::query_as::<_, ProofJobRow>(&format!(
            "SELECT {PROOF_JOB_COLUMNS} FROM proof_jobs WHERE status = $1
             ORDER BY created_at LIMIT $2"
        ))
        .bind(ProofJobStatus::Pending.name())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProofJobRow::into_record).collect()
    }
}
