//! Training pipeline: corpus loading with diagnostics, batch sourcing,
//! the dual policy/value loss, monitoring metrics with history, the
//! epoch/step trainer, and the checkpoint store.

pub mod batch;
pub mod checkpoint;
pub mod data;
pub mod loss;
pub mod metrics;
pub mod trainer;
