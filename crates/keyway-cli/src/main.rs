//! keyway: drive the deep-link wallet protocol from a terminal.

use std::{io::Write, path::PathBuf, process::ExitCode};

use clap::Parser;
use keyway_cli::{CliError, Command, FileStorage, TerminalHost, run};
use keyway_core::{AdapterConfig, ReadinessPolicy, WalletAdapter};
use keyway_proto::Cluster;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Deep-link wallet adapter for the terminal
#[derive(Parser, Debug)]
#[command(name = "keyway")]
#[command(about = "Connect to a wallet app and sign through encrypted deep links")]
struct Args {
    /// Page URL for this load; pass the wallet's redirect URL to complete a request
    #[arg(short, long, default_value = "https://localhost/keyway")]
    url: String,

    /// Session storage file
    #[arg(short, long, default_value = "keyway-session.json")]
    storage: PathBuf,

    /// Network named in connect requests
    #[arg(long, default_value = "mainnet-beta")]
    cluster: Cluster,

    /// Wallet universal-link base
    #[arg(long, default_value = keyway_core::config::DEFAULT_WALLET_URL)]
    wallet_url: String,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keyway=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match execute(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        },
    }
}

async fn execute(args: Args) -> Result<(), CliError> {
    let url = Url::parse(&args.url)?;
    let config = AdapterConfig {
        readiness: ReadinessPolicy::PreferDeepLink,
        cluster: args.cluster,
        wallet_url: args.wallet_url,
        ..AdapterConfig::default()
    };
    let adapter = WalletAdapter::new(TerminalHost::new(url, FileStorage::new(args.storage)), config);

    let report = run(&adapter, args.command).await?;
    writeln!(std::io::stdout(), "{report}")?;
    Ok(())
}
