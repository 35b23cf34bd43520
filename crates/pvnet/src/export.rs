//! Export surface: turn a checkpoint into a portable inference artifact.
//!
//! An export directory holds the full-precision named record
//! (`model.mpk`) plus `manifest.json` describing the fixed I/O contract
//! and the architecture knobs needed to rebuild the graph. Consumers run
//! the network on a non-autodiff backend, which is what switches batch
//! norm to its inference statistics.

use std::path::Path;

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::Serialize;

use replay::{BOARD_SIDE, POLICY_LEN, STATE_PLANES};

use crate::model::tower::{PolicyValueNet, PolicyValueNetConfig};
use crate::training::checkpoint::load_model_only;

/// One named tensor in the exported graph's I/O contract.
///
/// `None` marks the dynamic batch dimension.
#[derive(Debug, Serialize)]
pub struct TensorSpec {
    pub name: &'static str,
    pub shape: Vec<Option<usize>>,
}

/// Contents of `manifest.json`.
#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub format: &'static str,
    pub input: TensorSpec,
    pub outputs: Vec<TensorSpec>,
    pub blocks: usize,
    pub channels: usize,
    pub parameters: usize,
}

/// Export a trained model as a portable artifact directory.
///
/// Loads weights from `checkpoint_dir` (model only; optimizer state is
/// not needed for inference) onto a fresh network built from `config`,
/// then writes `model.mpk` and `manifest.json` into `out_dir`.
pub fn export_model<B: Backend>(
    checkpoint_dir: &Path,
    out_dir: &Path,
    config: &PolicyValueNetConfig,
    device: &B::Device,
) -> anyhow::Result<()> {
    let model: PolicyValueNet<B> =
        load_model_only(checkpoint_dir, config.init::<B>(device), device)?;
    let parameters = model.num_params();

    std::fs::create_dir_all(out_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", out_dir.display()))?;

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .save_file(out_dir.join("model"), &recorder)
        .map_err(|e| anyhow::anyhow!("Failed to write weights to {}: {e}", out_dir.display()))?;

    let manifest = ExportManifest {
        format: "burn-namedmpk/full-precision",
        input: TensorSpec {
            name: "state",
            shape: vec![
                None,
                Some(STATE_PLANES),
                Some(BOARD_SIDE),
                Some(BOARD_SIDE),
            ],
        },
        outputs: vec![
            TensorSpec {
                name: "policy",
                shape: vec![None, Some(POLICY_LEN)],
            },
            TensorSpec {
                name: "value",
                shape: vec![None, Some(1)],
            },
        ],
        blocks: config.blocks,
        channels: config.channels,
        parameters,
    };
    let manifest_path = out_dir.join("manifest.json");
    serde_json::to_writer_pretty(
        std::fs::File::create(&manifest_path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", manifest_path.display()))?,
        &manifest,
    )
    .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", manifest_path.display()))?;

    tracing::info!(
        dir = %out_dir.display(),
        parameters,
        "Exported model artifact"
    );
    Ok(())
}
