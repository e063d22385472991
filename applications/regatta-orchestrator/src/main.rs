//! Regatta - region price arbitrage and workload relocation
//!
//! ## Usage
//!
//! ```bash
//! # Run the price sampling loop until Ctrl+C
//! regatta feed
//!
//! # One sampling pass, then print current observations
//! regatta prices
//!
//! # Cost/benefit check for relocating between two regions
//! regatta evaluate US-East EU-West
//!
//! # Evaluate and, if admitted, execute the relocation
//! regatta migrate US-East EU-West
//! regatta migrate US-East EU-West --force --settle-secs 5
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use regatta_orchestrator::{
    dryrun, Config, DryRunVerdict, LogObserver, MemoryStore, MigrationOrchestrator,
    MigrationRequest, Observation, ObservationStore, PriceFeed,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Regatta: region price arbitrage and workload relocation
#[derive(Parser)]
#[command(name = "regatta")]
#[command(about = "Region price arbitrage and workload relocation", long_about = None)]
struct Cli {
    /// Path to a JSON configuration file (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the price sampling loop until Ctrl+C
    Feed,

    /// Take one sampling pass and print current observations
    Prices,

    /// Evaluate the cost/benefit of relocating between two regions
    Evaluate {
        /// Region the workload currently runs in
        source_region: String,

        /// Candidate region to relocate to
        target_region: String,
    },

    /// Evaluate and, if admitted, execute the relocation
    Migrate {
        /// Region the workload currently runs in
        source_region: String,

        /// Region to relocate to
        target_region: String,

        /// Skip the dry-run gate
        #[arg(long)]
        force: bool,

        /// Override the settle delay between phases (seconds)
        #[arg(long)]
        settle_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regatta=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let store: Arc<dyn ObservationStore> = Arc::new(MemoryStore::new());
    let feed = PriceFeed::new(Arc::new(config.registry()), store)
        .with_intervals(config.feed.sample_interval(), config.feed.observation_ttl());

    match cli.command {
        Commands::Feed => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            info!("Sampling started; Ctrl+C to stop");

            tokio::select! {
                _ = feed.run_sampling(shutdown_rx) => {}
                _ = tokio::signal::ctrl_c() => {
                    let _ = shutdown_tx.send(true);
                }
            }
            Ok(())
        }

        Commands::Prices => {
            feed.sample_once().await?;
            let observations = feed.observations().await?;
            println!("{}", serde_json::to_string_pretty(&observations)?);
            Ok(())
        }

        Commands::Evaluate {
            source_region,
            target_region,
        } => {
            let (verdict, _, _) =
                evaluate_regions(&feed, &config, &source_region, &target_region).await?;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(())
        }

        Commands::Migrate {
            source_region,
            target_region,
            force,
            settle_secs,
        } => {
            let (verdict, source, target) =
                evaluate_regions(&feed, &config, &source_region, &target_region).await?;

            if !verdict.admitted && !force {
                warn!(reason = %verdict.reason, "Migration vetoed by dry-run");
                println!("{}", serde_json::to_string_pretty(&verdict)?);
                return Ok(());
            }
            if force {
                warn!("Dry-run gate skipped (--force)");
            }

            let settle_delay = settle_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.orchestrator.settle_delay());

            let orchestrator = MigrationOrchestrator::new(config.build_clients())
                .with_namespace(&config.orchestrator.namespace)
                .with_settle_delay(settle_delay)
                .with_active_replicas(config.orchestrator.active_replicas)
                .with_observer(Arc::new(LogObserver));

            let request = MigrationRequest::new(&source.context_id, &target.context_id);

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Cancellation requested");
                    let _ = cancel_tx.send(true);
                }
            });

            let report = orchestrator.migrate(cancel_rx, &request).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

/// Sample once, then evaluate the relocation between two named regions
///
/// Self-comparison is rejected here, before the pure evaluator is invoked.
async fn evaluate_regions(
    feed: &PriceFeed,
    config: &Config,
    source_region: &str,
    target_region: &str,
) -> anyhow::Result<(DryRunVerdict, Observation, Observation)> {
    if source_region == target_region {
        anyhow::bail!("source and target regions must differ");
    }

    feed.sample_once().await?;
    let observations = feed.observations().await?;

    let source = find_observation(&observations, source_region)?;
    let target = find_observation(&observations, target_region)?;

    let verdict = dryrun::evaluate(&source, &target, &config.cost_model);
    info!(
        source = %source.region,
        target = %target.region,
        admitted = verdict.admitted,
        egress_cost = verdict.egress_cost,
        projected_savings = verdict.projected_savings,
        "Dry-run evaluated"
    );

    Ok((verdict, source, target))
}

fn find_observation(observations: &[Observation], region: &str) -> anyhow::Result<Observation> {
    observations
        .iter()
        .find(|o| o.region == region)
        .cloned()
        .ok_or_else(|| {
            anyhow::anyhow!(
                "unknown region {region}; configured regions: {}",
                observations
                    .iter()
                    .map(|o| o.region.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
}
