//! # zkms-client — External Collaborators
//!
//! Typed access to the two services the coordinator depends on:
//!
//! - the **proof aggregation service**, which verifies membership proofs
//!   and batches them into aggregations whose roots are published on-chain;
//! - the **chain JSON-RPC endpoint**, used to submit execution calls and
//!   wait for receipts.
//!
//! Each is a trait ([`ProofSubmissionService`], [`ChainRpc`]) with an HTTP
//! implementation and a scriptable double in [`mock`]. Errors classify
//! themselves as transient or terminal; retry policy belongs to the caller.

pub mod chain;
pub mod config;
pub mod error;
pub mod mock;
pub mod proof_service;
pub mod types;

pub use chain::{ChainRpc, JsonRpcChain, Receipt};
pub use config::{ChainRpcConfig, ConfigError, ProofServiceConfig};
pub use error::{ChainError, ProofServiceError};
pub use mock::{MockChainRpc, MockProofService};
pub use proof_service::{HttpProofService, ProofSubmissionService};
pub use types::{
    AggregationDetails, JobOutcome, JobStatusResponse, ProofData, ProofSubmission,
    SubmitProofResponse, WireJobStatus,
};
