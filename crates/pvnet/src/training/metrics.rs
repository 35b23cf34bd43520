//! Evaluation metrics and the per-run training history.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use replay::POLICY_LEN;

/// Three-way sign: zero is its own class, unlike `f32::signum`.
fn sign(x: f32) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Index of the first maximum in `row`.
fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, &x) in row.iter().enumerate() {
        if x > row[best] {
            best = i;
        }
    }
    best
}

/// Fraction of positions where the predicted value has the same sign as
/// the recorded outcome. Zero counts as its own sign, so a drawn outcome
/// only matches a prediction of exactly zero.
pub fn value_sign_accuracy(predicted: &[f32], target: &[f32]) -> f32 {
    debug_assert_eq!(predicted.len(), target.len());
    if predicted.is_empty() {
        return 0.0;
    }
    let matches = predicted
        .iter()
        .zip(target)
        .filter(|(p, t)| sign(**p) == sign(**t))
        .count();
    matches as f32 / predicted.len() as f32
}

/// Fraction of positions where the highest-scoring predicted move is also
/// the highest-weighted target move. Both slices are flattened rows of
/// [`POLICY_LEN`]; ties resolve to the first maximum.
pub fn policy_top1_agreement(logits: &[f32], targets: &[f32]) -> f32 {
    debug_assert_eq!(logits.len(), targets.len());
    debug_assert_eq!(logits.len() % POLICY_LEN, 0);
    let rows = logits.len() / POLICY_LEN;
    if rows == 0 {
        return 0.0;
    }
    let matches = logits
        .chunks_exact(POLICY_LEN)
        .zip(targets.chunks_exact(POLICY_LEN))
        .filter(|(l, t)| argmax(l) == argmax(t))
        .count();
    matches as f32 / rows as f32
}

/// Mean losses and evaluation metrics for one completed epoch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub train_loss: f64,
    pub policy_loss: f64,
    pub value_loss: f64,
    pub val_loss: Option<f64>,
    pub val_value_sign_accuracy: Option<f64>,
    pub val_policy_top1: Option<f64>,
    pub duration_secs: f64,
}

/// Append-only record of epoch summaries, saved as JSON alongside
/// checkpoints so runs can be compared after the fact.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochSummary>,
}

impl TrainingHistory {
    pub fn push(&mut self, summary: EpochSummary) {
        self.epochs.push(summary);
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", path.display()))?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| anyhow::anyhow!("Failed to write training history: {e}"))?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?;
        let history = serde_json::from_reader(file)
            .map_err(|e| anyhow::anyhow!("Failed to parse training history: {e}"))?;
        Ok(history)
    }
}
