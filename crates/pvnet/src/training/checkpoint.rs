//! Checkpoint store.
//!
//! A checkpoint is one directory holding three files: `model.mpk`
//! (weights), `optimizer.mpk` (optimizer state), and `meta.json` (step
//! and epoch counters plus a free-form metadata blob). `meta.json` is
//! written last, so its presence marks a complete save. Loading anything
//! less than the full unit goes through [`load_model_only`], which is
//! the explicit path for export and evaluation.

use std::path::Path;

use burn::module::{AutodiffModule, Module};
use burn::optim::Optimizer;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

/// Counters and context saved alongside the weights.
///
/// `metadata` is an arbitrary JSON blob; the trainer stores its config
/// snapshot there so a checkpoint records how it was produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub step: u64,
    pub epoch: usize,
    pub metadata: serde_json::Value,
}

/// Save model weights, optimizer state, and metadata into `dir`.
///
/// The directory is created if needed. Weights and optimizer state go
/// through the named-MessagePack recorder at full precision; `meta.json`
/// is written after both succeed.
pub fn save_checkpoint<B, M, O>(
    dir: &Path,
    model: &M,
    optimizer: &O,
    meta: &CheckpointMeta,
) -> anyhow::Result<()>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", dir.display()))?;
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();

    model
        .clone()
        .save_file(dir.join("model"), &recorder)
        .map_err(|e| anyhow::anyhow!("Failed to save model to {}: {e}", dir.display()))?;

    recorder
        .record(optimizer.to_record(), dir.join("optimizer"))
        .map_err(|e| anyhow::anyhow!("Failed to save optimizer to {}: {e}", dir.display()))?;

    let meta_path = dir.join("meta.json");
    serde_json::to_writer_pretty(
        std::fs::File::create(&meta_path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", meta_path.display()))?,
        meta,
    )
    .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", meta_path.display()))?;

    Ok(())
}

/// Restore a full checkpoint from `dir` onto a freshly initialized model
/// and optimizer, returning both along with the saved metadata.
pub fn load_checkpoint<B, M, O>(
    dir: &Path,
    model: M,
    optimizer: O,
    device: &B::Device,
) -> anyhow::Result<(M, O, CheckpointMeta)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();

    let model = model
        .load_file(dir.join("model"), &recorder, device)
        .map_err(|e| anyhow::anyhow!("Failed to load model from {}: {e}", dir.display()))?;

    let optim_record = recorder
        .load(dir.join("optimizer"), device)
        .map_err(|e| anyhow::anyhow!("Failed to load optimizer from {}: {e}", dir.display()))?;
    let optimizer = optimizer.load_record(optim_record);

    let meta_path = dir.join("meta.json");
    let meta: CheckpointMeta = serde_json::from_reader(
        std::fs::File::open(&meta_path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", meta_path.display()))?,
    )
    .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", meta_path.display()))?;

    Ok((model, optimizer, meta))
}

/// Load only the weights from a checkpoint, ignoring optimizer state
/// and metadata.
pub fn load_model_only<B, M>(dir: &Path, model: M, device: &B::Device) -> anyhow::Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let model = model
        .load_file(
            dir.join("model"),
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            device,
        )
        .map_err(|e| anyhow::anyhow!("Failed to load model from {}: {e}", dir.display()))?;
    Ok(model)
}
