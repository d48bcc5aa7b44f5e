//! statebench - state store benchmark harness
//!
//! The coordinator (instance 0) provisions worker instances, drives each
//! scenario against its target and reports mean and standard deviation of
//! time, memory and CPU. Workers answer control commands over nng
//! request/reply sockets.

mod bench;
mod cli;
mod error;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use libstatebench_core::save_config;
use libstatebench_core::types::InstanceIdentity;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bench::{open_store, run_benchmark, BenchContext, LocalExecutor};
use cli::{Cli, Command, RunArgs, WorkerArgs};
use error::{BenchError, Result};
use worker::WorkerServer;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Worker(args) => serve(args).await,
        Command::InitConfig { path } => save_config(&path, &Default::default())
            .map(|_| println!("Wrote {}", path.display()))
            .map_err(BenchError::from),
    };

    if let Err(e) = result {
        error!(code = e.error_code(), "{}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let report_path = config.report.clone();
    let ctx = BenchContext::coordinator(config)?;

    let report = run_benchmark(&ctx).await?;
    println!("{}", report.to_table());
    println!(
        "{} scenario(s), {} failed, {:.2}s",
        report.scenarios.len(),
        report.failed_count(),
        report.duration_secs()
    );

    if let Some(path) = report_path {
        report.write_json(&path)?;
        info!(path = %path.display(), "report written");
    }

    if report.failed_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn serve(args: WorkerArgs) -> Result<()> {
    let store = open_store(args.store_kind()?, args.store_path.as_deref())?;
    let executor = Arc::new(LocalExecutor::new(
        store,
        Duration::from_millis(args.sample_interval_ms),
    ));

    let socket = WorkerServer::bind(&args.listen)?;
    let server = WorkerServer::new(InstanceIdentity::new(args.index), executor);

    info!(instance = args.index, "worker starting");
    server.run(socket, setup_signal_handlers()).await?;
    info!(instance = args.index, "worker stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
fn setup_signal_handlers() -> impl std::future::Future<Output = ()> {
    async {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }
        info!("Received shutdown signal");
    }
}
