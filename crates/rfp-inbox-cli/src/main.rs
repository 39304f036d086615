//! `rfp-inbox` -- operator CLI for mailbox-driven proposal intake.
//!
//! One-shot subcommands run a single boundary operation and print its result
//! as JSON. `worker` keeps syncing the mailbox on an interval until Ctrl-C.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use rfp_inbox::analysis::requeue_pending;
use rfp_inbox::model::{NewRfp, NewVendorResponse};
use rfp_inbox::{load_config, AppConfig, Desk};

mod logging;

use logging::LogFormat;

#[derive(Parser)]
#[command(name = "rfp-inbox", about = "Mailbox-driven RFP proposal intake", version)]
struct Cli {
    /// Config file path. Without one, defaults plus environment variables are used.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent mailbox messages and create proposals from them.
    Sync,

    /// Show mailbox counters without marking anything read.
    Stats,

    /// Keep syncing on an interval and analyze proposals in the background.
    Worker {
        /// Seconds between syncs (overrides worker.syncIntervalSecs).
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Manage requests for proposal.
    Rfp {
        #[command(subcommand)]
        action: RfpCmd,
    },

    /// Manage vendor proposals.
    Proposal {
        #[command(subcommand)]
        action: ProposalCmd,
    },

    /// Rank the analyzed proposals of an RFP.
    Compare { rfp_id: String },

    /// Copy a stored attachment to a file, or to stdout.
    Attachment {
        key: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum RfpCmd {
    /// Create an RFP from a JSON file.
    Create { file: PathBuf },
    List,
    Show { id: String },
    Close { id: String },
}

#[derive(Subcommand)]
enum ProposalCmd {
    /// Submit a proposal from a JSON file.
    Submit { file: PathBuf },
    List {
        #[arg(long)]
        rfp: Option<String>,
    },
    Show { id: String },
    /// Analyze a proposal now and store the result.
    Analyze { id: String },
    Accept { id: String },
    Reject { id: String },
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("invalid environment overrides")?;
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format)?;

    let config = resolve_config(cli.config.as_deref())?;
    let assembly = Desk::from_config(&config)?;
    let desk = assembly.desk;

    // Background analyses outlive the command that queued them; the process
    // waits for them once the desk (and with it the queue sender) is dropped.
    let analysis: Option<JoinHandle<()>> = assembly
        .analysis
        .map(|(worker, rx)| tokio::spawn(worker.run(rx)));

    let result = run_command(&desk, &config, cli.command).await;

    drop(desk);
    if let Some(handle) = analysis {
        if let Err(e) = handle.await {
            error!("Analysis worker panicked: {}", e);
        }
    }
    result
}

async fn run_command(desk: &Desk, config: &AppConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Worker { interval } => {
            let interval = interval.unwrap_or(config.worker.sync_interval_secs);
            run_worker(desk, Duration::from_secs(interval.max(1))).await
        }
        Commands::Sync => print_json(&desk.sync_inbox().await?),
        Commands::Stats => print_json(&desk.inbox_stats().await?),
        Commands::Rfp { action } => match action {
            RfpCmd::Create { file } => {
                let new: NewRfp = read_json(&file)?;
                print_json(&desk.create_rfp(new)?)
            }
            RfpCmd::List => print_json(&desk.list_rfps()?),
            RfpCmd::Show { id } => print_json(&desk.get_rfp(&id)?),
            RfpCmd::Close { id } => print_json(&desk.close_rfp(&id)?),
        },
        Commands::Proposal { action } => match action {
            ProposalCmd::Submit { file } => {
                let new: NewVendorResponse = read_json(&file)?;
                print_json(&desk.submit_proposal(new)?)
            }
            ProposalCmd::List { rfp } => print_json(&desk.list_proposals(rfp.as_deref())?),
            ProposalCmd::Show { id } => print_json(&desk.get_proposal(&id)?),
            ProposalCmd::Analyze { id } => print_json(&desk.analyze_proposal(&id).await?),
            ProposalCmd::Accept { id } => print_json(&desk.accept_proposal(&id).await?),
            ProposalCmd::Reject { id } => print_json(&desk.reject_proposal(&id)?),
        },
        Commands::Compare { rfp_id } => print_json(&desk.compare_rfp(&rfp_id).await?),
        Commands::Attachment { key, output } => copy_attachment(desk, &key, output.as_deref()).await,
    }
}

async fn copy_attachment(desk: &Desk, key: &str, output: Option<&Path>) -> Result<()> {
    let mut content = desk.open_attachment(key).await?;
    info!(
        filename = %content.filename,
        bytes = content.content_length,
        media_type = %content.media_type,
        "serving attachment"
    );
    match output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
            tokio::io::copy(&mut content.file, &mut file).await?;
        }
        None => {
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut content.file, &mut stdout).await?;
        }
    }
    Ok(())
}

async fn run_worker(desk: &Desk, interval: Duration) -> Result<()> {
    if let Some(queue) = desk.analysis_queue() {
        requeue_pending(desk.database(), queue)?;
    }

    info!(interval_secs = interval.as_secs(), "worker started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match desk.sync_inbox().await {
                    Ok(summary) => info!(
                        processed = summary.processed,
                        created = summary.created,
                        errors = summary.errors,
                        "sync complete"
                    ),
                    Err(e) => warn!("sync failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }
    Ok(())
}
