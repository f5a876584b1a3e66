use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::DEFAULT_SETTINGS_FILE, load_settings, ContractArtifact, ContractFactory,
    ContractInterface, HttpWalletProvider,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_ARTIFACT: &str = "artifacts/contracts/BigBrotherVoting.sol/BigBrotherVoting.json";

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy the voting contract and print its address.
    Deploy {
        #[arg(long, default_value = DEFAULT_ARTIFACT)]
        artifact: PathBuf,
    },
    /// Check that an artifact exposes the functions the voter calls.
    CheckArtifact {
        #[arg(long, default_value = DEFAULT_ARTIFACT)]
        artifact: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let interface = ContractInterface::big_brother_voting();

    match cli.command {
        Command::Deploy { artifact } => {
            let settings = load_settings(&cli.config)?;
            let Some(endpoint) = settings.wallet_endpoint()? else {
                bail!("no wallet endpoint configured; set wallet_url or VOTING_WALLET_URL");
            };

            let artifact = ContractArtifact::load(&artifact)?;
            let missing = artifact.missing_functions(&interface);
            if !missing.is_empty() {
                warn!(?missing, "artifact lacks functions used by the voter");
            }

            let factory = ContractFactory::new(artifact, Arc::new(HttpWalletProvider::new(endpoint)));
            let deployed = factory
                .deploy(settings.confirmation_policy())
                .await
                .context("deployment failed")?;
            println!("{} contract deployed to {}", deployed.name, deployed.address);
        }
        Command::CheckArtifact { artifact } => {
            let artifact = ContractArtifact::load(&artifact)?;
            artifact.bytecode()?;
            let missing = artifact.missing_functions(&interface);
            if !missing.is_empty() {
                bail!("{} is missing {}", artifact.contract_name, missing.join(", "));
            }
            println!("{} provides {}", artifact.contract_name, interface.name);
        }
    }

    Ok(())
}
