//! Writes validated samples to a Parquet corpus container.
//!
//! The container is the fast-reload form of a corpus: three row-aligned
//! columns (`states`, `policies`, `values`) holding codec-accepted data,
//! so reloading skips per-record validation entirely.

use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, FixedSizeListBuilder, Float32Array, Float32Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::types::{Sample, POLICY_LEN, STATE_LEN};

fn float_list(len: usize) -> DataType {
    DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), len as i32)
}

/// Arrow schema for the corpus container (three columns, row-aligned).
pub fn container_schema() -> Schema {
    Schema::new(vec![
        Field::new("states", float_list(STATE_LEN), false),
        Field::new("policies", float_list(POLICY_LEN), false),
        Field::new("values", DataType::Float32, false),
    ])
}

/// Buffers validated samples and writes them to a Parquet container.
pub struct SampleWriter {
    samples: Vec<Sample>,
    output_path: PathBuf,
}

impl SampleWriter {
    /// Create a new writer that will write to the given path.
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            samples: Vec::new(),
            output_path,
        }
    }

    /// Buffer a single sample.
    pub fn record(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Buffer multiple samples.
    pub fn record_all(&mut self, samples: Vec<Sample>) {
        self.samples.extend(samples);
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Write all buffered samples to the Parquet container and return the
    /// output path.
    pub fn finish(self) -> anyhow::Result<PathBuf> {
        let schema = Arc::new(container_schema());

        let batch = if self.samples.is_empty() {
            RecordBatch::new_empty(schema.clone())
        } else {
            build_record_batch(&self.samples)?
        };

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let file = std::fs::File::create(&self.output_path)?;
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::info!(
            samples = self.samples.len(),
            path = %self.output_path.display(),
            "Wrote corpus container"
        );

        Ok(self.output_path)
    }
}

/// Build an Arrow RecordBatch from validated samples.
fn build_record_batch(samples: &[Sample]) -> anyhow::Result<RecordBatch> {
    let schema = Arc::new(container_schema());

    let mut states = FixedSizeListBuilder::new(Float32Builder::new(), STATE_LEN as i32);
    let mut policies = FixedSizeListBuilder::new(Float32Builder::new(), POLICY_LEN as i32);
    for sample in samples {
        states.values().append_slice(sample.state());
        states.append(true);
        policies.values().append_slice(sample.policy());
        policies.append(true);
    }
    let values: Float32Array = samples.iter().map(|s| Some(s.value())).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(states.finish()),
        Arc::new(policies.finish()),
        Arc::new(values),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_sample(i: usize) -> Sample {
        let state: Vec<f32> = (0..STATE_LEN).map(|j| (i * STATE_LEN + j) as f32 * 0.001).collect();
        let mut policy = vec![0.0_f32; POLICY_LEN];
        policy[i % POLICY_LEN] = 1.0;
        Sample::from_trusted_parts(state, policy, (i % 3) as f32 - 1.0)
    }

    #[test]
    fn test_container_schema_shape() {
        let schema = container_schema();
        assert_eq!(schema.fields().len(), 3);
        assert_eq!(schema.field(0).name(), "states");
        assert_eq!(schema.field(1).name(), "policies");
        assert_eq!(schema.field(2).name(), "values");
        assert!(matches!(
            schema.field(0).data_type(),
            DataType::FixedSizeList(_, 360)
        ));
        assert!(matches!(
            schema.field(1).data_type(),
            DataType::FixedSizeList(_, 188)
        ));
    }

    #[test]
    fn test_write_empty_container() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.parquet");
        let writer = SampleWriter::new(path.clone());
        assert!(writer.is_empty());
        let result = writer.finish().unwrap();
        assert_eq!(result, path);
        assert!(path.exists());
    }

    #[test]
    fn test_write_and_verify_file_exists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.parquet");
        let mut writer = SampleWriter::new(path.clone());

        for i in 0..10 {
            writer.record(make_sample(i));
        }
        assert_eq!(writer.len(), 10);

        let result = writer.finish().unwrap();
        assert!(result.exists());
        assert!(std::fs::metadata(&result).unwrap().len() > 0);
    }
}
