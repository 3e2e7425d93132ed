//! # zkms-cli — Operator Command-Line Interface
//!
//! ## Subcommands
//!
//! - `merkle`: signer-set root, inclusion paths, and claim verification
//! - `derive`: signer secrets, commitments, and nullifiers
//! - `migrate`: apply the PostgreSQL schema
//! - `poll`: run the proof-job poller
//!
//! ## Crate Policy
//!
//! - Argument parsing lives here; behavior is delegated to the library
//!   crates.
//! - Handlers return the process exit code. `1` means a check failed.

pub mod daemon;
pub mod derive;
pub mod merkle;
