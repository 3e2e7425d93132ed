//! # zkms CLI entry point
//!
//! Parses command-line arguments, initializes tracing and dispatches to
//! subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zkms_cli::daemon::{run_migrate, run_poll, MigrateArgs, PollArgs};
use zkms_cli::derive::{run_derive, DeriveArgs};
use zkms_cli::merkle::{run_merkle, MerkleArgs};

/// ZK multisig coordinator operator tool.
#[derive(Parser, Debug)]
#[command(name = "zkms", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Signer-set Merkle root, inclusion paths and claim checks.
    Merkle(MerkleArgs),

    /// Signer secrets, commitments and nullifiers.
    Derive(DeriveArgs),

    /// Apply the PostgreSQL migrations.
    Migrate(MigrateArgs),

    /// Poll the proof service for pending jobs.
    Poll(PollArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let result = match cli.command {
        Commands::Merkle(args) => run_merkle(&args),
        Commands::Derive(args) => run_derive(&args),
        Commands::Migrate(args) => run_migrate(&args),
        Commands::Poll(args) => run_poll(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkms_cli::derive::DeriveCommand;
    use zkms_cli::merkle::MerkleCommand;

    #[test]
    fn parse_merkle_root_with_mixed_encodings() {
        let cli = Cli::try_parse_from(["zkms", "merkle", "root", "0x01", "2", "3"]).unwrap();
        let Commands::Merkle(args) = cli.command else {
            panic!("expected merkle");
        };
        let MerkleCommand::Root { commitments } = args.command else {
            panic!("expected root");
        };
        assert_eq!(commitments.len(), 3);
        assert_eq!(commitments[1], zkms_core::Commitment::from_u64(2));
    }

    #[test]
    fn merkle_root_requires_commitments() {
        assert!(Cli::try_parse_from(["zkms", "merkle", "root"]).is_err());
    }

    #[test]
    fn parse_nullifier_derivation() {
        let cli = Cli::try_parse_from([
            "zkms",
            "-vv",
            "derive",
            "nullifier",
            "--secret",
            "0x2a",
            "--tx-hash",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Derive(args) = cli.command else {
            panic!("expected derive");
        };
        assert!(matches!(args.command, DeriveCommand::Nullifier { .. }));
    }

    #[test]
    fn parse_poll_once_with_json_logs() {
        let cli = Cli::try_parse_from(["zkms", "poll", "--once", "--json-logs"]).unwrap();
        assert!(cli.json_logs);
        let Commands::Poll(args) = cli.command else {
            panic!("expected poll");
        };
        assert!(args.once);
        assert!(args.database_url.is_none());
    }
}
