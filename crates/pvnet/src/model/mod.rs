//! Model components: the policy-value forward seam, the residual-tower
//! implementer, and the bridge between flat sample columns and burn tensors.

pub mod bridge;
pub mod tower;

use burn::module::Module;
use burn::prelude::*;

use replay::{BOARD_SIDE, POLICY_LEN, STATE_PLANES};

/// The forward mapping every trainable model must expose.
///
/// Input: board states of shape `(batch, 10, 6, 6)`. Outputs: raw move
/// logits of shape `(batch, 188)` (softmax is applied by the consumer)
/// and a scalar value estimate in `[-1, 1]` of shape `(batch,)`.
///
/// The trainer and checkpoint store are generic over this trait, so the
/// shipped [`tower::PolicyValueNet`] can be swapped for any other
/// architecture with the same I/O contract.
pub trait PolicyValueModel<B: Backend>: Module<B> {
    /// Map a batch of board states to (move logits, value estimates).
    fn forward(&self, states: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 1>);
}

/// Fixed input shape for a batch of `n` states: `[n, 10, 6, 6]`.
pub fn state_shape(batch: usize) -> [usize; 4] {
    [batch, STATE_PLANES, BOARD_SIDE, BOARD_SIDE]
}

/// Fixed policy output shape for a batch of `n` states: `[n, 188]`.
pub fn policy_shape(batch: usize) -> [usize; 2] {
    [batch, POLICY_LEN]
}
