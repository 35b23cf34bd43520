//! Epoch-driven training loop for the policy-value network.
//!
//! Ties together the batch source, loss terms, metrics, and checkpoint
//! store. Each invocation runs a configured number of additional epochs:
//! forward, joint loss, backward, one Adam step per batch, a checkpoint
//! at every epoch boundary, and an optional gradient-free validation
//! pass when a held-out corpus is supplied.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::model::bridge::{policies_to_tensor, states_to_tensor, tensor_to_vec, values_to_tensor};
use crate::model::PolicyValueModel;
use crate::training::batch::BatchSource;
use crate::training::checkpoint::{load_checkpoint, save_checkpoint, CheckpointMeta};
use crate::training::data::Corpus;
use crate::training::loss::{policy_cross_entropy, value_mse};
use crate::training::metrics::{
    policy_top1_agreement, value_sign_accuracy, EpochSummary, TrainingHistory,
};

/// Hyperparameters for one training invocation.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Number of additional epochs to run in this invocation.
    #[config(default = 10)]
    pub epochs: usize,
    /// Samples per gradient step.
    #[config(default = 256)]
    pub batch_size: usize,
    /// Constant Adam learning rate.
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Adam weight decay.
    #[config(default = 1e-4)]
    pub weight_decay: f64,
    /// Draw a fresh random sample order each epoch.
    #[config(default = true)]
    pub shuffle: bool,
    /// Batches a background thread may gather ahead; 0 disables prefetch.
    #[config(default = 0)]
    pub prefetch_batches: usize,
    /// Steps between running-average log lines; 0 disables interval logs.
    #[config(default = 50)]
    pub log_interval: usize,
    /// Permutation seed. `None` draws from entropy.
    pub seed: Option<u64>,
    /// Directory receiving per-epoch and final checkpoints.
    #[config(default = "String::from(\"checkpoints\")")]
    pub checkpoint_dir: String,
}

/// Running sums of per-step losses over a logging interval or an epoch.
struct RunningLoss {
    total: f64,
    policy: f64,
    value: f64,
    count: usize,
}

impl RunningLoss {
    fn new() -> Self {
        Self {
            total: 0.0,
            policy: 0.0,
            value: 0.0,
            count: 0,
        }
    }

    fn update(&mut self, total: f64, policy: f64, value: f64) {
        self.total += total;
        self.policy += policy;
        self.value += value;
        self.count += 1;
    }

    fn means(&self) -> (f64, f64, f64) {
        if self.count == 0 {
            return (0.0, 0.0, 0.0);
        }
        let n = self.count as f64;
        (self.total / n, self.policy / n, self.value / n)
    }

    fn display(&self) -> String {
        if self.count == 0 {
            return "no data".to_string();
        }
        let (total, policy, value) = self.means();
        format!("loss={total:.4} policy={policy:.4} value={value:.4}")
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Run the training loop.
///
/// Epochs count from where the checkpoint left off: resuming with
/// `epochs = 0` saves a final checkpoint with the restored counters
/// untouched.
///
/// # Arguments
/// - `config`: training hyperparameters
/// - `model`: initialized model (consumed and returned updated)
/// - `corpus`: validated training samples
/// - `val_corpus`: optional held-out samples for per-epoch evaluation
/// - `device`: burn device for tensor operations
/// - `resume_from`: if `Some(dir)`, restore model, optimizer, and
///   counters from that checkpoint before training
///
/// # Returns
/// The trained model.
pub fn train<B, M>(
    config: &TrainingConfig,
    mut model: M,
    corpus: Arc<Corpus>,
    val_corpus: Option<Arc<Corpus>>,
    device: &B::Device,
    resume_from: Option<&Path>,
) -> anyhow::Result<M>
where
    B: AutodiffBackend,
    B::InnerBackend: Backend<Device = B::Device>,
    M: PolicyValueModel<B> + AutodiffModule<B>,
    M::InnerModule: PolicyValueModel<B::InnerBackend>,
{
    std::fs::create_dir_all(&config.checkpoint_dir)?;

    let mut batches = BatchSource::new(
        Arc::clone(&corpus),
        config.batch_size,
        config.shuffle,
        config.prefetch_batches,
        config.seed,
    )?;
    let mut val_batches = match &val_corpus {
        Some(val) => Some(BatchSource::new(Arc::clone(val), config.batch_size, false, 0, None)?),
        None => None,
    };

    let mut optimizer = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay as f32)))
        .init();

    let mut global_step: u64 = 0;
    let mut start_epoch: usize = 0;

    // Resume from checkpoint if requested
    if let Some(dir) = resume_from {
        let (m, o, meta) = load_checkpoint(dir, model, optimizer, device)?;
        model = m;
        optimizer = o;
        global_step = meta.step;
        start_epoch = meta.epoch;
        tracing::info!(
            step = global_step,
            epoch = start_epoch,
            from = %dir.display(),
            "Resumed training from checkpoint"
        );
    }

    let history_path = Path::new(&config.checkpoint_dir).join("training_history.json");
    let mut history = if history_path.exists() {
        TrainingHistory::load(&history_path)?
    } else {
        TrainingHistory::default()
    };

    let config_snapshot = serde_json::to_value(config)
        .map_err(|e| anyhow::anyhow!("Failed to serialize training config: {e}"))?;

    let total_epochs = start_epoch + config.epochs;
    let train_start = Instant::now();

    tracing::info!(
        samples = batches.num_samples(),
        batches_per_epoch = batches.batches_per_epoch(),
        epochs = config.epochs,
        lr = config.learning_rate,
        "Starting training"
    );

    for epoch in start_epoch..total_epochs {
        let epoch_start = Instant::now();
        let mut epoch_avg = RunningLoss::new();
        let mut interval_avg = RunningLoss::new();

        for batch in batches.epoch() {
            let states = states_to_tensor::<B>(&batch.states, device);
            let targets = policies_to_tensor::<B>(&batch.policies, device);
            let outcomes = values_to_tensor::<B>(&batch.values, device);

            // Forward pass + joint loss
            let (logits, value) = model.forward(states);
            let policy_loss = policy_cross_entropy(logits, targets);
            let value_loss = value_mse(value, outcomes);

            // Extract scalar values before backward
            let policy_val: f64 = policy_loss.clone().into_scalar().elem();
            let value_val: f64 = value_loss.clone().into_scalar().elem();
            let total_loss = policy_loss + value_loss;
            let total_val: f64 = total_loss.clone().into_scalar().elem();

            if !total_val.is_finite() {
                anyhow::bail!(
                    "Non-finite loss at step {global_step} (epoch {}): \
                     total={total_val} policy={policy_val} value={value_val}",
                    epoch + 1
                );
            }

            // Backward + optimizer step
            let grads = GradientsParams::from_grads(total_loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
            global_step += 1;

            epoch_avg.update(total_val, policy_val, value_val);
            interval_avg.update(total_val, policy_val, value_val);
            tracing::debug!(
                step = global_step,
                loss = total_val,
                policy = policy_val,
                value = value_val,
                "Step complete"
            );

            // Log running averages at intervals
            if config.log_interval > 0 && global_step % config.log_interval as u64 == 0 {
                tracing::info!(
                    step = global_step,
                    epoch = epoch + 1,
                    "avg({}) {}",
                    interval_avg.count,
                    interval_avg.display()
                );
                interval_avg.reset();
            }
        }

        let (train_loss, policy_loss, value_loss) = epoch_avg.means();
        let mut summary = EpochSummary {
            epoch: epoch + 1,
            train_loss,
            policy_loss,
            value_loss,
            val_loss: None,
            val_value_sign_accuracy: None,
            val_policy_top1: None,
            duration_secs: epoch_start.elapsed().as_secs_f64(),
        };

        // Gradient-free validation pass on the inner backend
        if let Some(val) = val_batches.as_mut() {
            let eval = evaluate::<B::InnerBackend, M::InnerModule>(&model.valid(), val, device);
            summary.val_loss = Some(eval.loss);
            summary.val_value_sign_accuracy = Some(eval.value_sign_accuracy);
            summary.val_policy_top1 = Some(eval.policy_top1);
            tracing::info!(
                epoch = epoch + 1,
                val_loss = format!("{:.4}", eval.loss),
                sign_acc = format!("{:.3}", eval.value_sign_accuracy),
                top1 = format!("{:.3}", eval.policy_top1),
                "Validation pass"
            );
        }

        tracing::info!(
            epoch = epoch + 1,
            total_epochs,
            loss = format!("{train_loss:.4}"),
            policy = format!("{policy_loss:.4}"),
            value = format!("{value_loss:.4}"),
            secs = format!("{:.1}", summary.duration_secs),
            "Epoch complete"
        );
        history.push(summary);

        let epoch_dir = Path::new(&config.checkpoint_dir).join(format!("epoch_{}", epoch + 1));
        save_checkpoint(
            &epoch_dir,
            &model,
            &optimizer,
            &CheckpointMeta {
                step: global_step,
                epoch: epoch + 1,
                metadata: config_snapshot.clone(),
            },
        )?;
        tracing::info!(
            epoch = epoch + 1,
            dir = %epoch_dir.display(),
            "Checkpoint saved (model + optimizer + meta)"
        );
    }

    // Save final checkpoint (model + optimizer + meta)
    let final_dir = Path::new(&config.checkpoint_dir).join("final");
    save_checkpoint(
        &final_dir,
        &model,
        &optimizer,
        &CheckpointMeta {
            step: global_step,
            epoch: total_epochs,
            metadata: config_snapshot,
        },
    )?;
    history.save(&history_path)?;

    tracing::info!(
        steps = global_step,
        epochs = config.epochs,
        elapsed_secs = format!("{:.1}", train_start.elapsed().as_secs_f64()),
        "Training complete. Final checkpoint saved (model + optimizer + meta)."
    );

    Ok(model)
}

/// Metrics from one gradient-free pass over a held-out batch source.
pub struct EvalMetrics {
    pub loss: f64,
    pub value_sign_accuracy: f64,
    pub policy_top1: f64,
}

/// Evaluate a model over every batch of one pass, without gradients.
///
/// Losses average per batch; the auxiliary metrics weight each batch by
/// its sample count so a short final batch does not skew them.
pub fn evaluate<B, M>(model: &M, batches: &mut BatchSource, device: &B::Device) -> EvalMetrics
where
    B: Backend,
    M: PolicyValueModel<B>,
{
    let mut avg = RunningLoss::new();
    let mut sign_acc = 0.0f64;
    let mut top1 = 0.0f64;
    let mut samples = 0usize;

    for batch in batches.epoch() {
        let states = states_to_tensor::<B>(&batch.states, device);
        let targets = policies_to_tensor::<B>(&batch.policies, device);
        let outcomes = values_to_tensor::<B>(&batch.values, device);

        let (logits, value) = model.forward(states);
        let policy_val: f64 = policy_cross_entropy(logits.clone(), targets)
            .into_scalar()
            .elem();
        let value_val: f64 = value_mse(value.clone(), outcomes).into_scalar().elem();
        avg.update(policy_val + value_val, policy_val, value_val);

        let n = batch.len();
        sign_acc += value_sign_accuracy(&tensor_to_vec(value), &batch.values) as f64 * n as f64;
        top1 += policy_top1_agreement(&tensor_to_vec(logits), &batch.policies) as f64 * n as f64;
        samples += n;
    }

    let (loss, _, _) = avg.means();
    EvalMetrics {
        loss,
        value_sign_accuracy: if samples > 0 {
            sign_acc / samples as f64
        } else {
            0.0
        },
        policy_top1: if samples > 0 {
            top1 / samples as f64
        } else {
            0.0
        },
    }
}
