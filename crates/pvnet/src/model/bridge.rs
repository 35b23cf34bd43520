//! Tensor bridge: conversions between the flat `f32` columns produced by
//! the batch source and burn tensors on the training device.
//!
//! Batches travel as contiguous row-major slices (`replay` geometry); this
//! module is the device-transfer boundary where they become tensors, and
//! where predictions come back out for CPU-side metrics.

use burn::prelude::*;
use burn::tensor::TensorData;

use replay::{POLICY_LEN, STATE_LEN};

use crate::model::{policy_shape, state_shape};

/// Convert a flat batch of board states to a 4D tensor `(n, 10, 6, 6)`.
///
/// # Panics
/// Panics if `states` is empty or its length is not a multiple of 360.
pub fn states_to_tensor<B: Backend>(states: &[f32], device: &B::Device) -> Tensor<B, 4> {
    assert!(!states.is_empty(), "state batch must not be empty");
    assert_eq!(
        states.len() % STATE_LEN,
        0,
        "state batch length {} is not a whole number of {STATE_LEN}-element boards",
        states.len()
    );
    let n = states.len() / STATE_LEN;
    Tensor::from_data(TensorData::new(states.to_vec(), state_shape(n)), device)
}

/// Convert a flat batch of policy targets to a 2D tensor `(n, 188)`.
///
/// # Panics
/// Panics if `policies` is empty or its length is not a multiple of 188.
pub fn policies_to_tensor<B: Backend>(policies: &[f32], device: &B::Device) -> Tensor<B, 2> {
    assert!(!policies.is_empty(), "policy batch must not be empty");
    assert_eq!(
        policies.len() % POLICY_LEN,
        0,
        "policy batch length {} is not a whole number of {POLICY_LEN}-element distributions",
        policies.len()
    );
    let n = policies.len() / POLICY_LEN;
    Tensor::from_data(TensorData::new(policies.to_vec(), policy_shape(n)), device)
}

/// Convert a batch of value targets to a 1D tensor `(n,)`.
///
/// # Panics
/// Panics if `values` is empty.
pub fn values_to_tensor<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 1> {
    assert!(!values.is_empty(), "value batch must not be empty");
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
}

/// Extract f32 values from a tensor of any rank, row-major.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().to_vec::<f32>().unwrap()
}
