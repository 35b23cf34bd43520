//! gridzero CLI: train, inspect, pack, and export policy-value models
//! from self-play game-record streams.

mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipeline::{ExportArgs, PackArgs, StatsArgs, SynthArgs, TrainArgs};

#[derive(Parser)]
#[command(name = "gridzero", version, about = "Policy-value network training pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the policy-value network on one or more record streams.
    Train {
        /// Input record streams (JSONL or packed Parquet).
        #[arg(long, required = true, num_args = 1..)]
        streams: Vec<PathBuf>,

        /// Extra replay streams merged into the training corpus.
        #[arg(long, num_args = 1..)]
        replay: Vec<PathBuf>,

        /// Held-out streams scored after each epoch.
        #[arg(long, num_args = 1..)]
        validation: Vec<PathBuf>,

        /// Run-config TOML file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Residual blocks in the tower.
        #[arg(long)]
        blocks: Option<usize>,

        /// Channels per convolution.
        #[arg(long)]
        channels: Option<usize>,

        /// Additional epochs to run in this invocation.
        #[arg(long)]
        epochs: Option<usize>,

        /// Samples per gradient step.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Adam learning rate.
        #[arg(long)]
        learning_rate: Option<f64>,

        /// Adam weight decay.
        #[arg(long)]
        weight_decay: Option<f64>,

        /// Batches a background thread may gather ahead; 0 disables prefetch.
        #[arg(long)]
        prefetch: Option<usize>,

        /// Shuffle seed for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,

        /// Checkpoint output directory.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Resume from this checkpoint directory (model + optimizer + meta).
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Also write a portable export of the final model here.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Compute device: auto, cpu, or gpu.
        #[arg(long, default_value = "auto")]
        device: String,
    },

    /// Validate streams and print corpus statistics.
    Stats {
        /// Input record streams.
        #[arg(long, required = true, num_args = 1..)]
        streams: Vec<PathBuf>,

        /// Emit machine-readable JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Validate streams and pack them into a fast-reload Parquet container.
    Pack {
        /// Input record streams.
        #[arg(long, required = true, num_args = 1..)]
        streams: Vec<PathBuf>,

        /// Output Parquet path.
        #[arg(long)]
        output: PathBuf,
    },

    /// Export a checkpoint as a portable inference artifact.
    Export {
        /// Checkpoint directory containing model.mpk.
        #[arg(long)]
        checkpoint: PathBuf,

        /// Output artifact directory.
        #[arg(long)]
        output: PathBuf,

        /// Run-config TOML file (architecture must match the checkpoint).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Residual blocks in the tower.
        #[arg(long)]
        blocks: Option<usize>,

        /// Channels per convolution.
        #[arg(long)]
        channels: Option<usize>,
    },

    /// Generate a synthetic record stream for smoke runs.
    Synth {
        /// Number of records to generate.
        #[arg(long, default_value_t = 1000)]
        count: usize,

        /// Output JSONL path.
        #[arg(long)]
        output: PathBuf,

        /// RNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            streams,
            replay,
            validation,
            config,
            blocks,
            channels,
            epochs,
            batch_size,
            learning_rate,
            weight_decay,
            prefetch,
            seed,
            output,
            resume,
            export,
            device,
        } => pipeline::run_train(TrainArgs {
            streams,
            replay,
            validation,
            config,
            blocks,
            channels,
            epochs,
            batch_size,
            learning_rate,
            weight_decay,
            prefetch,
            seed,
            output,
            resume,
            export,
            device,
        }),
        Command::Stats { streams, json } => pipeline::run_stats(StatsArgs { streams, json }),
        Command::Pack { streams, output } => pipeline::run_pack(PackArgs { streams, output }),
        Command::Export {
            checkpoint,
            output,
            config,
            blocks,
            channels,
        } => pipeline::run_export(ExportArgs {
            checkpoint,
            output,
            config,
            blocks,
            channels,
        }),
        Command::Synth {
            count,
            output,
            seed,
        } => pipeline::run_synth(SynthArgs {
            count,
            output,
            seed,
        }),
    }
}
