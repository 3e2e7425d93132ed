//! # Derive Subcommand
//!
//! Signer-side helpers for provisioning and debugging. Secrets passed on
//! the command line end up in shell history; use these on trusted hosts.

use anyhow::Result;
use clap::{Args, Subcommand};

use zkms_core::Hash32;
use zkms_crypto::{commitment_from_secret, derive_nullifier, SignerSecret};

#[derive(Args, Debug)]
pub struct DeriveArgs {
    #[command(subcommand)]
    pub command: DeriveCommand,
}

#[derive(Subcommand, Debug)]
pub enum DeriveCommand {
    /// Generate a fresh signer secret and print it with its commitment.
    Keygen,

    /// Print the commitment registered for a secret.
    Commitment {
        #[arg(long)]
        secret: SignerSecret,
    },

    /// Print the nullifier a secret produces for one transaction.
    Nullifier {
        #[arg(long)]
        secret: SignerSecret,
        /// The transaction's signing hash.
        #[arg(long)]
        tx_hash: Hash32,
    },
}

pub fn run_derive(args: &DeriveArgs) -> Result<u8> {
    match &args.command {
        DeriveCommand::Keygen => {
            let secret = SignerSecret::generate();
            let out = serde_json::json!({
                "secret": Hash32::from_bytes(*secret.expose_bytes()),
                "commitment": commitment_from_secret(&secret),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        DeriveCommand::Commitment { secret } => {
            println!("{}", commitment_from_secret(secret));
        }
        DeriveCommand::Nullifier { secret, tx_hash } => {
            println!("{}", derive_nullifier(secret, tx_hash));
        }
    }
    Ok(0)
}
