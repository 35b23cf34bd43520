//! Policy-value network training for self-play game records.
//!
//! Provides a trainable residual-tower model mapping board tensors to
//! (move logits, scalar value), the epoch/step training loop with its
//! dual policy + value objective, and the checkpoint/export lifecycle.
//! Self-play data enters through the `replay` crate.

pub mod export;
pub mod model;
pub mod training;
