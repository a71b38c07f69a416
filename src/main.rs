use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use histoseg::data::{channel_stats, png_files};
use histoseg::train::BarProgress;
use histoseg::{JsonExperimentStore, JsonlTelemetry, PixelNetwork, TrainConfig, TrainingOrchestrator};

/// Train pixel-segmentation networks on histopathology tiles.
#[derive(Parser)]
#[command(name = "histoseg", version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a training job described by a JSON config.
    Train {
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured epoch count.
        #[arg(long)]
        epochs: Option<usize>,

        /// Override the configured replica count.
        #[arg(long)]
        replicas: Option<usize>,

        /// Override the configured output directory.
        #[arg(long)]
        save_path: Option<PathBuf>,

        /// Hide the per-step progress bar.
        #[arg(long)]
        no_progress: bool,
    },
    /// Print per-channel mean and std of the PNG tiles in a folder.
    Stats {
        #[arg(short, long)]
        dir: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn train(
    config_path: PathBuf,
    epochs: Option<usize>,
    replicas: Option<usize>,
    save_path: Option<PathBuf>,
    no_progress: bool,
) -> Result<()> {
    let mut config = TrainConfig::load_json(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(epochs) = epochs {
        config.epochs = epochs;
    }
    if let Some(replicas) = replicas {
        config.replicas = replicas;
    }
    if let Some(save_path) = save_path {
        config.save_path = save_path;
    }

    let model = PixelNetwork::from_spec(&config.network_spec(), config.seed);
    let (mut train_loader, mut valid_loader) = config.loaders().context("building data loaders")?;
    let telemetry_path = config.telemetry_path.clone();

    let mut orchestrator = TrainingOrchestrator::new(model, config, JsonExperimentStore)?;
    if let Some(path) = telemetry_path {
        orchestrator = orchestrator.with_telemetry(Box::new(JsonlTelemetry::new(path)));
    }
    if !no_progress {
        orchestrator = orchestrator.with_progress(Box::new(BarProgress::default()));
    }

    let outcome = orchestrator.fit(train_loader.as_mut(), valid_loader.as_mut())?;

    match &outcome.best {
        Some(best) => info!(
            epoch = best.epoch,
            weighted_sum = best.weighted_sum,
            path = %best.location.display(),
            "best checkpoint"
        ),
        None => info!("run ended before the first checkpoint epoch"),
    }
    info!(path = %outcome.final_location.display(), epochs = outcome.history.len(), "final model saved");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Train { config, epochs, replicas, save_path, no_progress } => {
            train(config, epochs, replicas, save_path, no_progress)
        }
        Command::Stats { dir } => {
            let files = png_files(&dir).with_context(|| format!("listing {}", dir.display()))?;
            let stats = channel_stats(&files)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}
