//! Reads validated samples back from a Parquet corpus container.

use std::path::Path;

use arrow::array::{Array, FixedSizeListArray, Float32Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::types::{Sample, POLICY_LEN, STATE_LEN};

/// Static methods for reading corpus containers.
pub struct SampleReader;

impl SampleReader {
    /// Read every sample from a container.
    ///
    /// The container holds codec-accepted data, so nothing is
    /// re-validated; column shapes are still checked because a wrong
    /// file is a decode error, not a per-record rejection.
    pub fn read_all(path: &Path) -> anyhow::Result<Vec<Sample>> {
        let file = std::fs::File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut samples = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;
            let mut batch_samples = extract_samples_from_batch(&batch)?;
            samples.append(&mut batch_samples);
        }

        tracing::debug!(
            count = samples.len(),
            path = %path.display(),
            "Read corpus container"
        );

        Ok(samples)
    }
}

/// Extract samples from a single Arrow RecordBatch.
fn extract_samples_from_batch(batch: &RecordBatch) -> anyhow::Result<Vec<Sample>> {
    let states = batch
        .column(0)
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| anyhow::anyhow!("Column 0 (states) is not FixedSizeListArray"))?;
    if states.value_length() != STATE_LEN as i32 {
        anyhow::bail!(
            "states column has row width {}, expected {STATE_LEN}",
            states.value_length()
        );
    }

    let policies = batch
        .column(1)
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| anyhow::anyhow!("Column 1 (policies) is not FixedSizeListArray"))?;
    if policies.value_length() != POLICY_LEN as i32 {
        anyhow::bail!(
            "policies column has row width {}, expected {POLICY_LEN}",
            policies.value_length()
        );
    }

    let values = batch
        .column(2)
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| anyhow::anyhow!("Column 2 (values) is not Float32Array"))?;

    let mut samples = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let state_row = states.value(i);
        let state_row = state_row
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| anyhow::anyhow!("states items are not Float32"))?;

        let policy_row = policies.value(i);
        let policy_row = policy_row
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| anyhow::anyhow!("policies items are not Float32"))?;

        samples.push(Sample::from_trusted_parts(
            state_row.values().to_vec(),
            policy_row.values().to_vec(),
            values.value(i),
        ));
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::SampleWriter;
    use tempfile::TempDir;

    fn make_sample(i: usize) -> Sample {
        // Mix of magnitudes and signs so a lossy round-trip would show up.
        let state: Vec<f32> = (0..STATE_LEN)
            .map(|j| ((i * 31 + j * 7) as f32 - 500.0) * 0.3125)
            .collect();
        let mut policy = vec![0.0_f32; POLICY_LEN];
        policy[i % POLICY_LEN] = 0.75;
        policy[(i + 1) % POLICY_LEN] = 0.25;
        Sample::from_trusted_parts(state, policy, (i % 3) as f32 - 1.0)
    }

    #[test]
    fn test_roundtrip_is_bit_exact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("roundtrip.parquet");

        let originals: Vec<Sample> = (0..100).map(make_sample).collect();
        let mut writer = SampleWriter::new(path.clone());
        writer.record_all(originals.clone());
        writer.finish().unwrap();

        let reloaded = SampleReader::read_all(&path).unwrap();
        assert_eq!(reloaded.len(), 100);
        for (original, loaded) in originals.iter().zip(&reloaded) {
            assert_eq!(original.state(), loaded.state());
            assert_eq!(original.policy(), loaded.policy());
            assert_eq!(original.value(), loaded.value());
        }
    }

    #[test]
    fn test_read_empty_container() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.parquet");
        SampleWriter::new(path.clone()).finish().unwrap();

        let samples = SampleReader::read_all(&path).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_read_missing_file_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("does_not_exist.parquet");
        assert!(SampleReader::read_all(&path).is_err());
    }
}
