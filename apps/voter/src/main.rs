use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use client_core::{
    config::DEFAULT_SETTINGS_FILE, load_settings, parse_contestant, ConfiguredWalletDetector,
    ConnectOutcome, ControllerEvent, Notice, NoticePresenter, ViewState, VotingController,
};
use shared::domain::CONTESTANTS;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Vote for your favorite Big Brother contestant")]
struct Args {
    /// Settings file; missing files fall back to built-in defaults.
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Wallet JSON-RPC endpoint; an empty value runs without a wallet.
    #[arg(long)]
    wallet_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current view, picking up already authorized accounts.
    Status,
    /// Request account access and show tallies.
    Connect,
    /// Connect, then vote for a contestant by index or name.
    Vote { contestant: String },
    /// Read commands from stdin until `quit`.
    Interactive,
}

struct TerminalNotices {
    failed: AtomicBool,
}

#[async_trait]
impl NoticePresenter for TerminalNotices {
    async fn present(&self, notice: &Notice) {
        if notice.is_failure() {
            self.failed.store(true, Ordering::SeqCst);
            eprintln!("\n!! {}\n", notice.text());
        } else {
            println!("\n** {}\n", notice.text());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(url) = args.wallet_url {
        settings.wallet_url = (!url.trim().is_empty()).then_some(url);
    }
    let endpoint = settings.wallet_endpoint()?;
    info!(wallet = ?endpoint.as_ref().map(|u| u.as_str()), contract = %settings.contract_address, "starting voter");

    let notices = Arc::new(TerminalNotices {
        failed: AtomicBool::new(false),
    });
    let controller = VotingController::new(
        settings.controller_config(),
        Arc::new(ConfiguredWalletDetector::new(endpoint)),
        notices.clone(),
    );
    controller.acquire_wallet().await;

    match args.command.unwrap_or(Command::Interactive) {
        Command::Status => {
            controller.acquire_wallet().await;
            render(&controller).await;
        }
        Command::Connect => {
            connect(&controller).await?;
            render(&controller).await;
        }
        Command::Vote { contestant } => {
            let index = contestant_index(&contestant)?;
            match connect(&controller).await? {
                ConnectOutcome::Connected(_) => {}
                ConnectOutcome::WalletRequired => bail!("cannot vote without a wallet"),
                ConnectOutcome::NoAccount => bail!("wallet granted no account to vote with"),
            }
            controller.submit_vote(index).await;
            render(&controller).await;
            if notices.failed.load(Ordering::SeqCst) {
                let name = CONTESTANTS.get(index).map_or("?", |c| c.name);
                bail!("vote for {name} failed");
            }
        }
        Command::Interactive => run_interactive(controller).await?,
    }

    Ok(())
}

async fn connect(controller: &VotingController) -> Result<ConnectOutcome> {
    controller
        .connect_account()
        .await
        .context("could not connect wallet")
}

async fn render(controller: &VotingController) {
    let view = ViewState::from_session(&controller.snapshot().await);
    println!("{}", view.render_text());
}

fn contestant_index(raw: &str) -> Result<usize> {
    parse_contestant(raw).with_context(|| format!("unknown contestant '{}'", raw.trim()))
}

const HELP: &str = "commands: connect | vote <index|name> | refresh | detect | show | help | quit";

async fn run_interactive(controller: Arc<VotingController>) -> Result<()> {
    let mut events = controller.subscribe_events();
    let observer = Arc::clone(&controller);
    let renderer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::TalliesUpdated(_)) => render(&observer).await,
                Ok(ControllerEvent::VoteSubmitted { contestant, tx }) => {
                    let name = CONTESTANTS.get(contestant).map_or("?", |c| c.name);
                    println!("vote for {name} sent in {tx}; waiting for it to be mined");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "view fell behind controller events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    render(&controller).await;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        match (words.next(), words.collect::<Vec<_>>().join(" ")) {
            (None, _) => {}
            (Some("connect"), _) => match controller.connect_account().await {
                Ok(_) => render(&controller).await,
                Err(err) => eprintln!("could not connect wallet: {err}"),
            },
            (Some("vote"), target) => match contestant_index(&target) {
                // Votes run in the background so another can be cast while one is mined.
                Ok(index) => {
                    let controller = Arc::clone(&controller);
                    tokio::spawn(async move { controller.submit_vote(index).await });
                }
                Err(err) => eprintln!("{err}"),
            },
            (Some("refresh"), _) => controller.refresh_tallies().await,
            (Some("detect"), _) => {
                controller.acquire_wallet().await;
                render(&controller).await;
            }
            (Some("show"), _) => render(&controller).await,
            (Some("help"), _) => println!("{HELP}"),
            (Some("quit" | "exit"), _) => break,
            (Some(other), _) => eprintln!("unknown command '{other}'; {HELP}"),
        }
    }

    renderer.abort();
    Ok(())
}
