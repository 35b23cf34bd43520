//! Subcommand pipelines: training on a chosen backend, corpus
//! inspection, Parquet packing, checkpoint export, and synthetic data.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use burn::backend::ndarray::{NdArray, NdArrayDevice};
use burn::backend::Autodiff;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use pvnet::export::export_model;
use pvnet::training::data::{compute_stats, load_streams, CorpusStats, LoadReport};
use pvnet::training::trainer::train;
use replay::{GameRecord, POLICY_LEN, STATE_LEN};

use crate::config::{
    build_network_config, build_training_config, load_run_toml, RunToml, TrainingCliOverrides,
};

/// Arguments for the `train` subcommand.
#[derive(Debug)]
pub struct TrainArgs {
    pub streams: Vec<PathBuf>,
    pub replay: Vec<PathBuf>,
    pub validation: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub blocks: Option<usize>,
    pub channels: Option<usize>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub weight_decay: Option<f64>,
    pub prefetch: Option<usize>,
    pub seed: Option<u64>,
    pub output: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    pub export: Option<PathBuf>,
    pub device: String,
}

/// Arguments for the `stats` subcommand.
#[derive(Debug)]
pub struct StatsArgs {
    pub streams: Vec<PathBuf>,
    pub json: bool,
}

/// Arguments for the `pack` subcommand.
#[derive(Debug)]
pub struct PackArgs {
    pub streams: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Arguments for the `export` subcommand.
#[derive(Debug)]
pub struct ExportArgs {
    pub checkpoint: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub blocks: Option<usize>,
    pub channels: Option<usize>,
}

/// Arguments for the `synth` subcommand.
#[derive(Debug)]
pub struct SynthArgs {
    pub count: usize,
    pub output: PathBuf,
    pub seed: u64,
}

/// Resolve the `--device` flag and run training on that backend.
pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    match args.device.as_str() {
        "cpu" => run_train_on::<Autodiff<NdArray<f32>>>(&args, &NdArrayDevice::default()),
        "gpu" => run_train_gpu(&args),
        "auto" => {
            if cfg!(feature = "gpu") {
                run_train_gpu(&args)
            } else {
                run_train_on::<Autodiff<NdArray<f32>>>(&args, &NdArrayDevice::default())
            }
        }
        other => anyhow::bail!("Unknown device {other:?}: expected auto, cpu, or gpu"),
    }
}

#[cfg(feature = "gpu")]
fn run_train_gpu(args: &TrainArgs) -> anyhow::Result<()> {
    use burn::backend::wgpu::{Wgpu, WgpuDevice};
    run_train_on::<Autodiff<Wgpu>>(args, &WgpuDevice::default())
}

#[cfg(not(feature = "gpu"))]
fn run_train_gpu(_args: &TrainArgs) -> anyhow::Result<()> {
    anyhow::bail!("GPU requested but this binary was built without the `gpu` feature")
}

fn run_train_on<B>(args: &TrainArgs, device: &B::Device) -> anyhow::Result<()>
where
    B: AutodiffBackend,
    B::InnerBackend: Backend<Device = B::Device>,
{
    let start = Instant::now();

    // 1. Resolve configs: defaults < TOML < CLI flags
    let run_toml = match &args.config {
        Some(path) => load_run_toml(path)?,
        None => RunToml::default(),
    };
    let net_config = build_network_config(&run_toml.network, args.blocks, args.channels);
    let train_config = build_training_config(
        &run_toml.training,
        TrainingCliOverrides {
            epochs: args.epochs,
            batch_size: args.batch_size,
            learning_rate: args.learning_rate,
            weight_decay: args.weight_decay,
            prefetch_batches: args.prefetch,
            seed: args.seed,
            checkpoint_dir: args
                .output
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        },
    );

    // 2. Load and validate the training corpus (primary + replay merged)
    let mut inputs = args.streams.clone();
    inputs.extend(args.replay.iter().cloned());
    let (corpus, report) = load_streams(&inputs)?;

    let val_corpus = if args.validation.is_empty() {
        None
    } else {
        let (val, val_report) = load_streams(&args.validation)?;
        tracing::info!(
            accepted = val_report.accepted(),
            rejected = val_report.rejected(),
            "Validation corpus loaded"
        );
        Some(Arc::new(val))
    };

    // 3. Initialize the model and run the epoch loop
    let model = net_config.init::<B>(device);
    tracing::info!(
        blocks = net_config.blocks,
        channels = net_config.channels,
        parameters = model.num_params(),
        "Initialized model"
    );

    train::<B, _>(
        &train_config,
        model,
        Arc::new(corpus),
        val_corpus,
        device,
        args.resume.as_deref(),
    )?;

    // 4. Optional portable export of the final checkpoint
    if let Some(export_dir) = &args.export {
        let final_dir = PathBuf::from(&train_config.checkpoint_dir).join("final");
        export_model::<B::InnerBackend>(&final_dir, export_dir, &net_config, device)?;
    }

    println!("\n--- Training Summary ---");
    println!(
        "Samples: {} accepted, {} rejected",
        report.accepted(),
        report.rejected()
    );
    println!("Checkpoints: {}", train_config.checkpoint_dir);
    if let Some(export_dir) = &args.export {
        println!("Export: {}", export_dir.display());
    }
    println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    report: &'a LoadReport,
    stats: &'a CorpusStats,
}

/// Load streams, compute corpus statistics, and print them.
pub fn run_stats(args: StatsArgs) -> anyhow::Result<()> {
    let (corpus, report) = load_streams(&args.streams)?;
    let stats = compute_stats(&corpus)?;

    if args.json {
        let output = StatsOutput {
            report: &report,
            stats: &stats,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("--- Corpus Statistics ---");
    println!("{stats}");
    println!("streams:");
    for stream in &report.streams {
        println!(
            "  {}: {} accepted, {} rejected",
            stream.path.display(),
            stream.accepted,
            stream.rejected
        );
    }
    let reasons = report.reasons();
    if !reasons.is_empty() {
        println!("rejections:");
        for (kind, count) in reasons {
            println!("  {kind}: {count}");
        }
    }

    Ok(())
}

/// Load streams and write the corpus as a Parquet container.
pub fn run_pack(args: PackArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let (corpus, report) = load_streams(&args.streams)?;
    let path = corpus.save_container(&args.output)?;

    println!("--- Pack Summary ---");
    println!("Records: {}", corpus.len());
    if report.rejected() > 0 {
        println!("Rejected: {}", report.rejected());
    }
    println!("Output: {}", path.display());
    println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}

/// Re-save a checkpointed model as a portable inference artifact.
pub fn run_export(args: ExportArgs) -> anyhow::Result<()> {
    let run_toml = match &args.config {
        Some(path) => load_run_toml(path)?,
        None => RunToml::default(),
    };
    let net_config = build_network_config(&run_toml.network, args.blocks, args.channels);

    let device = NdArrayDevice::default();
    export_model::<NdArray<f32>>(&args.checkpoint, &args.output, &net_config, &device)?;

    println!("--- Export Summary ---");
    println!("Checkpoint: {}", args.checkpoint.display());
    println!("Output: {}", args.output.display());

    Ok(())
}

/// Generate a uniform-random record stream for smoke runs.
pub fn run_synth(args: SynthArgs) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let file = std::fs::File::create(&args.output)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", args.output.display()))?;
    let mut writer = std::io::BufWriter::new(file);

    let bar = ProgressBar::new(args.count as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .expect("valid progress bar template")
            .progress_chars("=> "),
    );
    bar.set_message("generating");

    for _ in 0..args.count {
        let record = synthetic_record(&mut rng);
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        bar.inc(1);
    }
    bar.finish_with_message("done");
    writer.flush()?;

    println!("--- Synth Summary ---");
    println!("Records: {}", args.count);
    println!("Output: {}", args.output.display());

    Ok(())
}

/// One random record: state in [-1, 1), normalized policy, value from
/// {-1, 0, 1}.
fn synthetic_record(rng: &mut StdRng) -> GameRecord {
    let state: Vec<f32> = (0..STATE_LEN).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let mut policy: Vec<f32> = (0..POLICY_LEN).map(|_| rng.gen_range(0.0..1.0f32)).collect();
    let sum: f32 = policy.iter().sum();
    for p in policy.iter_mut() {
        *p /= sum;
    }
    let value = [-1.0, 0.0, 1.0][rng.gen_range(0..3)];

    GameRecord {
        state,
        policy,
        value,
    }
}
