use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod aggregator;
mod analyzer;
mod api;
mod classifier;
mod config;
mod dns;
mod domain;
mod error;
mod extractor;
mod fetcher;
mod frontier;
mod miner;
mod models;
mod patterns;
mod processor;
mod scorer;
mod sitemap;
mod social;

use config::{Config, ConfigOverrides};
use miner::ContactMiner;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine contacts for one company domain or homepage URL
    Mine {
        /// Domain ("acme.com") or homepage URL
        input: String,
    },
    /// Process a JSON file containing company records
    Process {
        /// Path to the input JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the output JSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of companies mined concurrently (defaults to the configured value)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let directives = format!(
        "{},hyper=warn,reqwest=warn,warp=warn,trust_dns_proto=warn,trust_dns_resolver=warn",
        level
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Arc::new(Config::load(&cli.overrides)?);
    let miner = Arc::new(ContactMiner::new(config.clone()).context("Failed to initialize miner")?);

    match cli.command {
        Commands::Mine { input } => {
            info!("Mining contacts for {}", input);
            let report = miner
                .mine(&input)
                .await
                .with_context(|| format!("Mining failed for '{}'", input))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Process {
            input,
            output,
            workers,
        } => {
            info!("Processing companies from {} to {}", input.display(), output.display());
            let workers = workers.unwrap_or(config.batch_concurrency);
            process_file(miner, input, output, workers).await?;
        }
        Commands::Serve { port } => {
            api::start_api_server(miner, port).await;
        }
    }

    Ok(())
}

async fn process_file(
    miner: Arc<ContactMiner>,
    input: PathBuf,
    output: PathBuf,
    workers: usize,
) -> Result<()> {
    let input_data = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read input file {}", input.display()))?;
    let records: Vec<models::CompanyRecord> = serde_json::from_str(&input_data)
        .with_context(|| format!("Failed to parse company records from {}", input.display()))?;

    info!("Loaded {} companies from {}", records.len(), input.display());

    let progress_bar = indicatif::ProgressBar::new(records.len() as u64);
    progress_bar.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let results =
        processor::process_batch(miner, records, workers, Some(progress_bar.clone())).await;

    progress_bar.finish_with_message("Processing complete");

    let found = results.iter().filter(|r| r.primary_email.is_some()).count();
    let output_data = serde_json::to_string_pretty(&results)?;
    std::fs::write(&output, output_data)
        .with_context(|| format!("Failed to write results to {}", output.display()))?;

    info!(
        "Wrote {} results to {} ({} with a primary contact)",
        results.len(),
        output.display(),
        found
    );

    Ok(())
}
