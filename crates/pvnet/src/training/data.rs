//! Corpus loading and diagnostics for self-play record streams.
//!
//! Runs every JSONL line through the `replay` codec, accumulates accepted
//! samples into flat column storage, and accounts for rejections per
//! stream. Parquet containers produced by the pack step reload through
//! the same entry point without re-validation.

use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::Serialize;

use replay::{decode_line, Sample, SampleReader, SampleWriter, POLICY_LEN, STATE_LEN};

/// Epsilon inside the entropy logarithm, avoiding ln(0) at p = 0.
const ENTROPY_EPS: f64 = 1e-8;

/// Column storage for accepted samples.
///
/// States, policies, and values live in parallel flat arrays aligned by
/// sample position. The corpus is read-only once loading finishes; batch
/// sources share it behind an `Arc` without further synchronization.
#[derive(Debug, Default)]
pub struct Corpus {
    states: Vec<f32>,
    policies: Vec<f32>,
    values: Vec<f32>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one accepted sample.
    pub fn push(&mut self, sample: &Sample) {
        self.states.extend_from_slice(sample.state());
        self.policies.extend_from_slice(sample.policy());
        self.values.push(sample.value());
    }

    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut corpus = Self::new();
        for sample in samples {
            corpus.push(sample);
        }
        corpus
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Flat 360-element state of sample `i`.
    pub fn state(&self, i: usize) -> &[f32] {
        &self.states[i * STATE_LEN..(i + 1) * STATE_LEN]
    }

    /// 188-element policy target of sample `i`.
    pub fn policy(&self, i: usize) -> &[f32] {
        &self.policies[i * POLICY_LEN..(i + 1) * POLICY_LEN]
    }

    /// Value target of sample `i`.
    pub fn value(&self, i: usize) -> f32 {
        self.values[i]
    }

    /// Persist the corpus to a fast-reload Parquet container.
    ///
    /// Contents are already validated, so reloading the container skips
    /// the codec entirely.
    pub fn save_container(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let mut writer = SampleWriter::new(path.to_path_buf());
        for i in 0..self.len() {
            writer.record(Sample::from_trusted_parts(
                self.state(i).to_vec(),
                self.policy(i).to_vec(),
                self.value(i),
            ));
        }
        writer.finish()
    }
}

/// Acceptance accounting for one loaded stream.
#[derive(Clone, Debug, Serialize)]
pub struct StreamReport {
    pub path: PathBuf,
    pub accepted: usize,
    pub rejected: usize,
    /// Rejection counts keyed by `RejectReason::kind()`.
    pub reasons: BTreeMap<&'static str, usize>,
}

/// Aggregate accounting across every stream of one load.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LoadReport {
    pub streams: Vec<StreamReport>,
}

impl LoadReport {
    pub fn accepted(&self) -> usize {
        self.streams.iter().map(|s| s.accepted).sum()
    }

    pub fn rejected(&self) -> usize {
        self.streams.iter().map(|s| s.rejected).sum()
    }

    /// Rejection counts merged across streams, keyed by reason kind.
    pub fn reasons(&self) -> BTreeMap<&'static str, usize> {
        let mut merged = BTreeMap::new();
        for stream in &self.streams {
            for (kind, count) in &stream.reasons {
                *merged.entry(*kind).or_insert(0) += count;
            }
        }
        merged
    }
}

/// Load every stream through the sample codec into one corpus.
///
/// Streams are concatenated positionally with no deduplication. A
/// `.parquet` path takes the fast-reload route (contents are trusted and
/// counted as accepted); anything else is decoded line by line, counting
/// and logging rejected records without aborting the stream. A stream
/// that cannot be opened, or that yields zero accepted samples, fails
/// the whole load.
pub fn load_streams(paths: &[PathBuf]) -> anyhow::Result<(Corpus, LoadReport)> {
    if paths.is_empty() {
        anyhow::bail!("No input streams given");
    }

    let mut corpus = Corpus::new();
    let mut report = LoadReport::default();

    for path in paths {
        let stream = if is_container(path) {
            load_container_stream(path, &mut corpus)?
        } else {
            load_jsonl_stream(path, &mut corpus)?
        };
        if stream.accepted == 0 {
            anyhow::bail!(
                "Stream {} produced no valid samples ({} records rejected)",
                path.display(),
                stream.rejected
            );
        }
        tracing::info!(
            stream = %path.display(),
            accepted = stream.accepted,
            rejected = stream.rejected,
            "Stream loaded"
        );
        report.streams.push(stream);
    }

    tracing::info!(
        streams = report.streams.len(),
        accepted = report.accepted(),
        rejected = report.rejected(),
        "Corpus loaded"
    );
    Ok((corpus, report))
}

fn is_container(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("parquet"))
        .unwrap_or(false)
}

fn load_jsonl_stream(path: &Path, corpus: &mut Corpus) -> anyhow::Result<StreamReport> {
    let file = std::fs::File::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open record stream {}: {e}", path.display()))?;
    let reader = std::io::BufReader::new(file);

    let mut accepted = 0;
    let mut rejected = 0;
    let mut reasons: BTreeMap<&'static str, usize> = BTreeMap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match decode_line(&line) {
            Ok(sample) => {
                corpus.push(&sample);
                accepted += 1;
            }
            Err(reason) => {
                rejected += 1;
                *reasons.entry(reason.kind()).or_insert(0) += 1;
                tracing::warn!(
                    stream = %path.display(),
                    line = idx + 1,
                    "Rejected record: {reason}"
                );
            }
        }
    }

    Ok(StreamReport {
        path: path.to_path_buf(),
        accepted,
        rejected,
        reasons,
    })
}

fn load_container_stream(path: &Path, corpus: &mut Corpus) -> anyhow::Result<StreamReport> {
    let samples = SampleReader::read_all(path)?;
    for sample in &samples {
        corpus.push(sample);
    }
    Ok(StreamReport {
        path: path.to_path_buf(),
        accepted: samples.len(),
        rejected: 0,
        reasons: BTreeMap::new(),
    })
}

/// Diagnostic summary of a loaded corpus.
///
/// Computed on demand after loading so an operator can spot a broken
/// upstream generator (all-zero states, always-zero values, collapsed
/// policies) before spending a training run on it. Never mutates or
/// filters the corpus.
#[derive(Clone, Debug, Serialize)]
pub struct CorpusStats {
    pub samples: usize,
    pub state_min: f32,
    pub state_max: f32,
    pub state_mean: f64,
    pub state_std: f64,
    pub policy_sum_min: f64,
    pub policy_sum_max: f64,
    /// Mean over samples of the largest policy component.
    pub policy_mean_peak: f64,
    /// Mean over samples of the Shannon entropy `-Σ p·ln(p + 1e-8)`.
    pub policy_mean_entropy: f64,
    /// Fraction of values above 0.5.
    pub win_rate: f64,
    /// Fraction of values below -0.5.
    pub loss_rate: f64,
    /// Fraction of values in [-0.5, 0.5].
    pub draw_rate: f64,
    pub value_mean: f64,
}

/// Run the diagnostic statistics pass over a corpus.
pub fn compute_stats(corpus: &Corpus) -> anyhow::Result<CorpusStats> {
    if corpus.is_empty() {
        anyhow::bail!("Cannot compute statistics over an empty corpus");
    }
    let n = corpus.len();

    let mut state_min = f32::INFINITY;
    let mut state_max = f32::NEG_INFINITY;
    let mut state_sum = 0.0f64;
    let mut state_sq_sum = 0.0f64;
    for &x in &corpus.states {
        state_min = state_min.min(x);
        state_max = state_max.max(x);
        let x = x as f64;
        state_sum += x;
        state_sq_sum += x * x;
    }
    let state_count = corpus.states.len() as f64;
    let state_mean = state_sum / state_count;
    let state_var = (state_sq_sum / state_count - state_mean * state_mean).max(0.0);

    let mut policy_sum_min = f64::INFINITY;
    let mut policy_sum_max = f64::NEG_INFINITY;
    let mut peak_sum = 0.0f64;
    let mut entropy_sum = 0.0f64;
    for i in 0..n {
        let mut sum = 0.0f64;
        let mut peak = 0.0f64;
        let mut entropy = 0.0f64;
        for &p in corpus.policy(i) {
            let p = p as f64;
            sum += p;
            peak = peak.max(p);
            entropy -= p * (p + ENTROPY_EPS).ln();
        }
        policy_sum_min = policy_sum_min.min(sum);
        policy_sum_max = policy_sum_max.max(sum);
        peak_sum += peak;
        entropy_sum += entropy;
    }

    let mut wins = 0usize;
    let mut losses = 0usize;
    let mut value_sum = 0.0f64;
    for &v in &corpus.values {
        if v > 0.5 {
            wins += 1;
        } else if v < -0.5 {
            losses += 1;
        }
        value_sum += v as f64;
    }
    let draws = n - wins - losses;

    Ok(CorpusStats {
        samples: n,
        state_min,
        state_max,
        state_mean,
        state_std: state_var.sqrt(),
        policy_sum_min,
        policy_sum_max,
        policy_mean_peak: peak_sum / n as f64,
        policy_mean_entropy: entropy_sum / n as f64,
        win_rate: wins as f64 / n as f64,
        loss_rate: losses as f64 / n as f64,
        draw_rate: draws as f64 / n as f64,
        value_mean: value_sum / n as f64,
    })
}

impl fmt::Display for CorpusStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples: {}", self.samples)?;
        writeln!(
            f,
            "state:   min={:.4} max={:.4} mean={:.4} std={:.4}",
            self.state_min, self.state_max, self.state_mean, self.state_std
        )?;
        writeln!(
            f,
            "policy:  sum=[{:.6}, {:.6}] mean_peak={:.4} mean_entropy={:.4}",
            self.policy_sum_min, self.policy_sum_max, self.policy_mean_peak, self.policy_mean_entropy
        )?;
        write!(
            f,
            "value:   win={:.1}% loss={:.1}% draw={:.1}% mean={:.4}",
            self.win_rate * 100.0,
            self.loss_rate * 100.0,
            self.draw_rate * 100.0,
            self.value_mean
        )
    }
}
