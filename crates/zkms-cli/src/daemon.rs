//! # Database and Poller Subcommands
//!
//! `migrate` applies the embedded schema. `poll` wires the PostgreSQL
//! store, the HTTP proof service and the JSON-RPC chain client into a
//! [`TransactionService`] and runs the proof-job poller until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::runtime::Runtime;
use tokio::sync::watch;

use zkms_client::{
    ChainRpcConfig, HttpProofService, JsonRpcChain, ProofServiceConfig, ProofSubmissionService,
};
use zkms_coordinator::{CoordinatorConfig, ProofJobPoller, TransactionService};
use zkms_store::PgStore;

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// PostgreSQL connection URL. Falls back to `DATABASE_URL`.
    #[arg(long)]
    pub database_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    /// PostgreSQL connection URL. Falls back to `DATABASE_URL`.
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run a single polling pass and exit.
    #[arg(long)]
    pub once: bool,
}

fn database_url(arg: &Option<String>) -> Result<String> {
    match arg {
        Some(url) => Ok(url.clone()),
        None => std::env::var("DATABASE_URL")
            .context("no --database-url given and DATABASE_URL is not set"),
    }
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")
}

pub fn run_migrate(args: &MigrateArgs) -> Result<u8> {
    let url = database_url(&args.database_url)?;
    runtime()?.block_on(async {
        let store = PgStore::connect(&url).await?;
        store.migrate().await?;
        println!("OK: migrations applied");
        Ok(0)
    })
}

pub fn run_poll(args: &PollArgs) -> Result<u8> {
    let url = database_url(&args.database_url)?;
    let coordinator = CoordinatorConfig::from_env().context("coordinator configuration")?;
    let prover_config = ProofServiceConfig::from_env().context("proof service configuration")?;
    let chain_config = ChainRpcConfig::from_env().context("chain RPC configuration")?;

    runtime()?.block_on(async move {
        let store = Arc::new(PgStore::connect(&url).await?);
        let prover: Arc<dyn ProofSubmissionService> =
            Arc::new(HttpProofService::new(prover_config)?);
        let chain = Arc::new(JsonRpcChain::new(chain_config)?);
        let service = Arc::new(TransactionService::new(
            store,
            chain,
            prover.clone(),
            &coordinator,
        ));
        let poller = ProofJobPoller::new(
            service,
            prover,
            coordinator.poll_batch_size,
            coordinator.poll_interval(),
        );

        if args.once {
            let report = poller.poll_once().await?;
            println!(
                "checked={} aggregated={} failed={} pending={} reevaluated={} errors={}",
                report.checked,
                report.aggregated,
                report.failed,
                report.still_pending,
                report.reevaluated,
                report.errors
            );
            return Ok(if report.errors > 0 { 1 } else { 0 });
        }

        let (stop, shutdown) = watch::channel(false);
        let worker = tokio::spawn(poller.run(shutdown));
        tokio::signal::ctrl_c()
            .await
            .context("waiting for Ctrl-C")?;
        tracing::info!("Shutdown requested");
        let _ = stop.send(true);
        worker.await.context("poller task panicked")?;
        Ok(0)
    })
}
