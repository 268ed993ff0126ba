mod config;

use anyhow::{Context, Result};
use chain::{Clock, DevChainClock, FallbackClock, JsonRpcClient, WallClock};
use clap::Parser;
use colored::Colorize;
use events::{Event, EventBus, EventEnvelope};
use orchestrator::{AuctionStatus, DeploymentRun, DirectoryArtifacts};
use rns_core::RegistrationNames;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{FileConfig, CONFIG_FILE, DEFAULT_ARTIFACTS_DIR, DEFAULT_RPC_URL};

#[derive(Parser)]
#[command(name = "rns-deploy")]
#[command(about = "Deploy the RNS suite and register names", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON-RPC endpoint of the node
    #[arg(long)]
    rpc_url: Option<String>,

    /// Directory holding `<Module>.json` build artifacts
    #[arg(long)]
    artifacts: Option<PathBuf>,

    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Labels registered through the FIFS registrar
    #[arg(long, value_delimiter = ',')]
    direct: Vec<String>,

    /// Labels registered through the legacy auction
    #[arg(long, value_delimiter = ',')]
    auction: Vec<String>,

    /// Labels registered with their address set to the sender
    #[arg(long, value_delimiter = ',')]
    address_bound: Vec<String>,

    /// Wait in real time instead of asking the node to advance its clock
    #[arg(long)]
    no_dev_clock: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let file = FileConfig::load(&cli.config).await?;
    let rpc_url = cli
        .rpc_url
        .clone()
        .or_else(|| file.rpc_url.clone())
        .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
    let artifacts_dir = cli
        .artifacts
        .clone()
        .or_else(|| file.artifacts.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR));
    let names = merge_names(&cli, &file.names);

    println!("{}", "Deploying RNS".bold());
    println!("{}", "This can take a while...".italic());
    println!();
    tracing::info!(rpc_url = %rpc_url, artifacts = %artifacts_dir.display(), "Starting run");

    let client = Arc::new(
        JsonRpcClient::connect(rpc_url.clone())
            .await
            .with_context(|| format!("Failed to connect to {}", rpc_url))?,
    );
    let clock: Arc<dyn Clock> = if cli.no_dev_clock {
        Arc::new(WallClock)
    } else {
        Arc::new(FallbackClock::new(DevChainClock::new(client.clone())))
    };

    let bus = EventBus::new();
    let printer = tokio::spawn(print_events(bus.subscribe()));

    let run = DeploymentRun::new(client, Arc::new(DirectoryArtifacts::new(artifacts_dir)), clock)
        .with_config(file.deploy_config())
        .with_event_bus(bus);
    let result = run.execute(&names).await;
    drop(run);
    let _ = printer.await;

    let report = result.context("Deployment failed")?;
    println!();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Done! Summary:".green().bold());
    println!();
    print!("{}", report.render_manifest());
    println!();
    print!("{}", report.render_names());

    if report.auction_status() == AuctionStatus::Failed
        || report.registrations.failed().next().is_some()
    {
        println!();
        println!("{}", "Some names were not registered".yellow());
    }
    Ok(())
}

/// Command line lists replace the file's lists of the same kind.
fn merge_names(cli: &Cli, file: &RegistrationNames) -> RegistrationNames {
    let pick = |flag: &Vec<String>, fallback: &Vec<String>| {
        if flag.is_empty() {
            fallback.clone()
        } else {
            flag.clone()
        }
    };
    RegistrationNames::new(
        pick(&cli.direct, &file.direct),
        pick(&cli.auction, &file.auction),
        pick(&cli.address_bound, &file.address_bound),
    )
}

/// Print progress until every handle to the bus is gone.
async fn print_events(mut receiver: broadcast::Receiver<EventEnvelope>) {
    loop {
        let envelope = match receiver.recv().await {
            Ok(envelope) => envelope,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match envelope.event {
            Event::ModuleDeploying { module } => println!("{}", format!("Deploying {}", module).bold()),
            Event::LibraryLinked { module, library, .. } => {
                println!("{}", format!("Linking {} into {}", library, module).cyan())
            }
            Event::ModuleDeployed { address, .. } => {
                println!("{}", "Success!".bright_green());
                println!("Contract address: {}", address);
            }
            Event::WiringStepCompleted { step } => println!("{}", step.bold()),
            Event::TransactionSubmitted { tx_hash, .. } => {
                println!("{}", format!("Tx hash: {}", tx_hash).cyan())
            }
            Event::TransactionConfirmed { .. } => {}
            Event::TransactionFailed { description, error, .. } => {
                println!("{}", format!("{} failed: {}", description, error).red())
            }
            Event::AuctionPhaseCompleted { phase, succeeded, failed } => println!(
                "Auction {}: {} succeeded, {} failed",
                phase.bold(),
                succeeded,
                failed
            ),
            Event::ClockAdvanced { seconds, simulated } => {
                let how = if simulated { "advanced" } else { "waited" };
                println!("{}", format!("Clock {} {}s", how, seconds).italic())
            }
            Event::NameRegistered { name, owner } => {
                println!("{}", format!("Registered {} to {}", name, owner).bright_green())
            }
            Event::RegistrationFailed { name, error } => {
                println!("{}", format!("Could not register {}: {}", name, error).red())
            }
            Event::Error { message, .. } => eprintln!("{}", message.red().bold()),
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rns_deploy=info,orchestrator=info,chain=info".into()),
        )
        .init();
}
