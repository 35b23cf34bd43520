//! Batch source: turns a shared corpus into per-epoch sequences of
//! fixed-size batches, optionally gathered ahead by a background thread.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use replay::{POLICY_LEN, STATE_LEN};

use crate::training::data::Corpus;

/// One gathered batch: row-major columns for `len()` samples.
#[derive(Clone, Debug)]
pub struct Minibatch {
    pub states: Vec<f32>,
    pub policies: Vec<f32>,
    pub values: Vec<f32>,
}

impl Minibatch {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Restartable source of batches over a read-only corpus.
///
/// Every call to [`epoch`](Self::epoch) starts one full pass: each sample
/// appears exactly once, the final batch may be short, and when shuffling
/// is on the pass uses a fresh permutation from the source's own RNG.
pub struct BatchSource {
    corpus: Arc<Corpus>,
    batch_size: usize,
    shuffle: bool,
    prefetch: usize,
    rng: StdRng,
}

impl BatchSource {
    /// Create a batch source over a shared corpus.
    ///
    /// `prefetch` is the number of batches a background thread may gather
    /// ahead of the consumer; 0 keeps gathering fully synchronous. The
    /// consumer sees batches in permutation order either way. `seed`
    /// pins the permutation sequence; `None` draws from entropy.
    pub fn new(
        corpus: Arc<Corpus>,
        batch_size: usize,
        shuffle: bool,
        prefetch: usize,
        seed: Option<u64>,
    ) -> anyhow::Result<Self> {
        if batch_size == 0 {
            anyhow::bail!("Batch size must be at least 1");
        }
        if corpus.is_empty() {
            anyhow::bail!("Cannot build batches over an empty corpus");
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            corpus,
            batch_size,
            shuffle,
            prefetch,
            rng,
        })
    }

    /// Number of samples underneath.
    pub fn num_samples(&self) -> usize {
        self.corpus.len()
    }

    /// Batches per pass: `ceil(samples / batch_size)`.
    pub fn batches_per_epoch(&self) -> usize {
        self.corpus.len().div_ceil(self.batch_size)
    }

    /// Start one pass over the corpus.
    pub fn epoch(&mut self) -> EpochBatches {
        let mut order: Vec<usize> = (0..self.corpus.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }

        let inner = if self.prefetch == 0 {
            EpochInner::Sync {
                corpus: Arc::clone(&self.corpus),
                order,
                batch_size: self.batch_size,
                cursor: 0,
            }
        } else {
            let (sender, receiver) = mpsc::sync_channel(self.prefetch);
            let corpus = Arc::clone(&self.corpus);
            let batch_size = self.batch_size;
            let handle = thread::spawn(move || {
                for chunk in order.chunks(batch_size) {
                    let batch = gather(&corpus, chunk);
                    if sender.send(batch).is_err() {
                        break; // Receiver dropped
                    }
                }
            });
            EpochInner::Prefetched {
                receiver,
                _handle: handle,
            }
        };
        EpochBatches { inner }
    }
}

/// Iterator over one epoch's batches, in permutation order.
pub struct EpochBatches {
    inner: EpochInner,
}

enum EpochInner {
    Sync {
        corpus: Arc<Corpus>,
        order: Vec<usize>,
        batch_size: usize,
        cursor: usize,
    },
    Prefetched {
        receiver: mpsc::Receiver<Minibatch>,
        _handle: thread::JoinHandle<()>,
    },
}

impl Iterator for EpochBatches {
    type Item = Minibatch;

    fn next(&mut self) -> Option<Minibatch> {
        match &mut self.inner {
            EpochInner::Sync {
                corpus,
                order,
                batch_size,
                cursor,
            } => {
                if *cursor >= order.len() {
                    return None;
                }
                let end = (*cursor + *batch_size).min(order.len());
                let batch = gather(corpus, &order[*cursor..end]);
                *cursor = end;
                Some(batch)
            }
            EpochInner::Prefetched { receiver, .. } => receiver.recv().ok(),
        }
    }
}

fn gather(corpus: &Corpus, indices: &[usize]) -> Minibatch {
    let mut states = Vec::with_capacity(indices.len() * STATE_LEN);
    let mut policies = Vec::with_capacity(indices.len() * POLICY_LEN);
    let mut values = Vec::with_capacity(indices.len());
    for &i in indices {
        states.extend_from_slice(corpus.state(i));
        policies.extend_from_slice(corpus.policy(i));
        values.push(corpus.value(i));
    }
    Minibatch {
        states,
        policies,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay::Sample;

    /// Corpus of `n` samples whose value encodes the sample index.
    fn indexed_corpus(n: usize) -> Arc<Corpus> {
        let samples: Vec<Sample> = (0..n)
            .map(|i| {
                Sample::from_trusted_parts(
                    vec![i as f32; STATE_LEN],
                    vec![1.0 / POLICY_LEN as f32; POLICY_LEN],
                    i as f32 / n as f32,
                )
            })
            .collect();
        Arc::new(Corpus::from_samples(&samples))
    }

    fn collect_values(batches: EpochBatches) -> Vec<f32> {
        batches.flat_map(|b| b.values).collect()
    }

    #[test]
    fn test_sequential_epoch_covers_all_in_order() {
        let corpus = indexed_corpus(10);
        let mut source = BatchSource::new(corpus, 3, false, 0, None).unwrap();
        assert_eq!(source.batches_per_epoch(), 4);

        let batches: Vec<Minibatch> = source.epoch().collect();
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[3].len(), 1, "final batch should be short");
        assert_eq!(batches[1].states.len(), 3 * STATE_LEN);
        assert_eq!(batches[1].policies.len(), 3 * POLICY_LEN);

        let values: Vec<f32> = batches.into_iter().flat_map(|b| b.values).collect();
        let expected: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_shuffled_epochs_use_fresh_permutations() {
        let corpus = indexed_corpus(32);
        let mut source = BatchSource::new(corpus, 1, true, 0, Some(42)).unwrap();

        let first = collect_values(source.epoch());
        let second = collect_values(source.epoch());

        assert_ne!(first, second, "two epochs drew the same permutation");

        // Both epochs still cover every sample exactly once
        let mut sorted_first = first.clone();
        sorted_first.sort_by(f32::total_cmp);
        let mut sorted_second = second;
        sorted_second.sort_by(f32::total_cmp);
        assert_eq!(sorted_first, sorted_second);
        assert_eq!(sorted_first.len(), 32);
    }

    #[test]
    fn test_same_seed_same_permutations() {
        let corpus = indexed_corpus(16);
        let mut a = BatchSource::new(Arc::clone(&corpus), 4, true, 0, Some(7)).unwrap();
        let mut b = BatchSource::new(corpus, 4, true, 0, Some(7)).unwrap();

        assert_eq!(collect_values(a.epoch()), collect_values(b.epoch()));
        assert_eq!(collect_values(a.epoch()), collect_values(b.epoch()));
    }

    #[test]
    fn test_prefetch_preserves_order() {
        let corpus = indexed_corpus(25);
        let mut sync = BatchSource::new(Arc::clone(&corpus), 4, false, 0, None).unwrap();
        let mut prefetched = BatchSource::new(corpus, 4, false, 2, None).unwrap();

        let direct = collect_values(sync.epoch());
        let ahead = collect_values(prefetched.epoch());
        assert_eq!(direct, ahead);
        assert_eq!(ahead.len(), 25);
    }

    #[test]
    fn test_dropping_prefetched_epoch_early() {
        let corpus = indexed_corpus(100);
        let mut source = BatchSource::new(corpus, 5, false, 2, None).unwrap();

        let mut batches = source.epoch();
        let _first = batches.next().unwrap();
        drop(batches);

        // Source stays usable for a full fresh pass
        assert_eq!(collect_values(source.epoch()).len(), 100);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let corpus = indexed_corpus(4);
        assert!(BatchSource::new(corpus, 0, false, 0, None).is_err());
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let corpus = Arc::new(Corpus::new());
        assert!(BatchSource::new(corpus, 8, false, 0, None).is_err());
    }
}
