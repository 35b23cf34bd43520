//! Loss terms for joint policy/value training.
//!
//! The trainer minimizes `policy_cross_entropy + value_mse` with no
//! relative weighting; both terms are plain batch means.

use burn::prelude::*;
use burn::tensor::activation::log_softmax;

/// Cross-entropy between move logits and a target distribution.
///
/// Targets are full distributions (search visit frequencies), not one-hot
/// labels, so the term is `-sum(target * log_softmax(logits))` per sample,
/// averaged over the batch.
///
/// # Arguments
/// * `logits` - Raw network outputs, shape `[batch, moves]`
/// * `targets` - Target probabilities, shape `[batch, moves]`, rows sum to 1
///
/// # Returns
/// Scalar loss tensor.
pub fn policy_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (targets * log_probs).sum_dim(1).neg().mean()
}

/// Mean squared error between predicted and recorded game outcomes.
///
/// # Arguments
/// * `predicted` - Network value estimates, shape `[batch]`
/// * `target` - Recorded outcomes in `[-1, 1]`, shape `[batch]`
///
/// # Returns
/// Scalar loss tensor.
pub fn value_mse<B: Backend>(predicted: Tensor<B, 1>, target: Tensor<B, 1>) -> Tensor<B, 1> {
    (predicted - target).powf_scalar(2.0).mean()
}
