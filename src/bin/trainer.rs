use anyhow::{bail, Result};
use clap::Parser;
use navirec::services::training::synthetic::SyntheticSpec;
use navirec::services::training::{TrainingService, TrainingStats};
use navirec::{init_tracing, Config};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Offline training for the transition model and the item index", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Session sequences JSON; trains the transition model
    #[arg(long)]
    sessions: Option<String>,

    /// Interaction records JSON; requires --catalog
    #[arg(long)]
    interactions: Option<String>,

    /// Item catalog JSON
    #[arg(long)]
    catalog: Option<String>,

    /// Size of the user id range; defaults to the highest id seen plus one
    #[arg(long)]
    num_users: Option<usize>,

    /// Generate seeded synthetic data into this directory and train on it
    #[arg(long)]
    synthetic: Option<String>,

    /// Catalog size for --synthetic
    #[arg(long, default_value_t = 10_000)]
    num_items: usize,

    /// Interaction log length for --synthetic
    #[arg(long, default_value_t = 100_000)]
    num_interactions: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing().await;

    info!("Starting navirec training run");

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    info!("Training configuration loaded: {:?}", config.training);

    let service = TrainingService::new(Arc::new(config.clone()));

    // The pipeline is pure CPU work; keep it off the async workers
    let stats = tokio::task::spawn_blocking(move || -> Result<TrainingStats> {
        if let Some(dir) = &args.synthetic {
            let defaults = SyntheticSpec::default();
            let spec = SyntheticSpec {
                num_users: args.num_users.unwrap_or(defaults.num_users),
                num_items: args.num_items,
                num_interactions: args.num_interactions,
                seed: config.training.seed,
                ..defaults
            };
            return Ok(service.run_synthetic(&spec, dir)?);
        }

        if args.sessions.is_none() && args.interactions.is_none() {
            bail!("nothing to train: pass --sessions, --interactions/--catalog or --synthetic");
        }

        let started = Instant::now();
        let mut stats = TrainingStats::default();
        if let Some(sessions) = &args.sessions {
            service.run_transitions(sessions, &mut stats)?;
        }
        if let Some(interactions) = &args.interactions {
            let Some(catalog) = &args.catalog else {
                bail!("--interactions requires --catalog");
            };
            service.run_snapshot(interactions, catalog, args.num_users, &mut stats)?;
        }
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(stats)
    })
    .await??;

    info!("Training complete: {}", serde_json::to_string(&stats)?);
    Ok(())
}
