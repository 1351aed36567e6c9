//! Domain dataset: loads persisted chunks and samples shuffled epochs.
//!
//! Chunks are immutable once published, so loading can fan out across
//! reader threads without locking. Sampling yields each stored transition
//! exactly once per epoch in a freshly randomized order; the two domains
//! of a translation problem are sampled independently (unpaired), matched
//! only by batch size.

use std::path::{Path, PathBuf};

use crossbeam_channel::unbounded;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::chunk::{list_chunk_files, read_chunk, ChunkData};
use super::{DatasetError, DomainSpec};
use crate::core::transition::{Transition, TransitionBatch};

/// In-memory dataset over one domain's persisted chunks.
///
/// Column storage is flattened row-major, concatenated in chunk order, so
/// index `i` addresses the `i`-th transition ever persisted to the domain.
#[derive(Debug)]
pub struct DomainDataset {
    spec: DomainSpec,
    prev_obs: Vec<f32>,
    action: Vec<f32>,
    obs: Vec<f32>,
    len: usize,
}

impl DomainDataset {
    /// Open a domain directory, loading chunks on the calling thread.
    pub fn open(dir: impl AsRef<Path>, spec: DomainSpec) -> Result<Self, DatasetError> {
        Self::open_with_workers(dir, spec, 1)
    }

    /// Open a domain directory, loading chunks across `num_workers` threads.
    ///
    /// Fails with [`DatasetError::DimensionMismatch`] if any chunk was
    /// collected with dimensions other than the declared ones, and with
    /// [`DatasetError::Empty`] if the directory holds no chunks.
    pub fn open_with_workers(
        dir: impl AsRef<Path>,
        spec: DomainSpec,
        num_workers: usize,
    ) -> Result<Self, DatasetError> {
        if spec.obs_dim == 0 {
            return Err(DatasetError::Config(format!(
                "domain '{}': obs_dim must be > 0",
                spec.name
            )));
        }

        let dir = dir.as_ref();
        let files = list_chunk_files(dir)?;
        if files.is_empty() {
            return Err(DatasetError::Empty(dir.to_path_buf()));
        }

        let chunks = load_chunks(&files, num_workers.max(1))?;

        let mut dataset = Self {
            spec: spec.clone(),
            prev_obs: Vec::new(),
            action: Vec::new(),
            obs: Vec::new(),
            len: 0,
        };
        for (path, chunk) in files.iter().map(|(_, p)| p).zip(chunks) {
            if (chunk.obs_dim, chunk.action_dim) != (spec.obs_dim, spec.action_dim) {
                return Err(DatasetError::DimensionMismatch {
                    expected: (spec.obs_dim, spec.action_dim),
                    found: (chunk.obs_dim, chunk.action_dim),
                    chunk: path.clone(),
                });
            }
            dataset.prev_obs.extend_from_slice(&chunk.prev_obs);
            dataset.action.extend_from_slice(&chunk.action);
            dataset.obs.extend_from_slice(&chunk.obs);
            dataset.len += chunk.len;
        }
        Ok(dataset)
    }

    /// Domain identity and dimensionality.
    pub fn spec(&self) -> &DomainSpec {
        &self.spec
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of batches one epoch yields at the given batch size
    /// (the final batch may be short).
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.len.div_ceil(batch_size)
    }

    /// Reconstruct the transition at `index` (chunk-concatenation order).
    pub fn transition(&self, index: usize) -> Transition {
        let o = self.spec.obs_dim;
        let a = self.spec.action_dim;
        Transition::new(
            self.prev_obs[index * o..(index + 1) * o].to_vec(),
            self.action[index * a..(index + 1) * a].to_vec(),
            self.obs[index * o..(index + 1) * o].to_vec(),
        )
    }

    /// One randomized pass over the dataset.
    ///
    /// Every stored transition appears exactly once; order is reshuffled
    /// from `rng` on every call, so successive epochs differ. The iterator
    /// is finite and the dataset can be iterated indefinitely.
    pub fn epoch_batches(&self, batch_size: usize, rng: &mut StdRng) -> EpochBatches<'_> {
        assert!(batch_size > 0, "batch_size must be > 0");
        let mut indices: Vec<usize> = (0..self.len).collect();
        indices.shuffle(rng);
        EpochBatches {
            dataset: self,
            indices,
            cursor: 0,
            batch_size,
        }
    }
}

/// Finite iterator over one shuffled epoch of [`TransitionBatch`]es.
pub struct EpochBatches<'a> {
    dataset: &'a DomainDataset,
    indices: Vec<usize>,
    cursor: usize,
    batch_size: usize,
}

impl Iterator for EpochBatches<'_> {
    type Item = TransitionBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.indices.len());
        let spec = &self.dataset.spec;
        let mut batch =
            TransitionBatch::with_capacity(end - self.cursor, spec.obs_dim, spec.action_dim);
        for &index in &self.indices[self.cursor..end] {
            batch.push(&self.dataset.transition(index));
        }
        self.cursor = end;
        Some(batch)
    }
}

/// Decode chunk files, preserving input order.
///
/// With more than one worker, file paths are distributed over a channel
/// and decoded in parallel; immutable chunks make concurrent reads safe.
fn load_chunks(
    files: &[(u64, PathBuf)],
    num_workers: usize,
) -> Result<Vec<ChunkData>, DatasetError> {
    if num_workers <= 1 || files.len() <= 1 {
        return files.iter().map(|(_, path)| read_chunk(path)).collect();
    }

    let (task_tx, task_rx) = unbounded::<(usize, PathBuf)>();
    let (result_tx, result_rx) = unbounded::<(usize, Result<ChunkData, DatasetError>)>();

    for (i, (_, path)) in files.iter().enumerate() {
        // Receiver outlives all senders, so send cannot fail here.
        let _ = task_tx.send((i, path.clone()));
    }
    drop(task_tx);

    std::thread::scope(|scope| {
        for _ in 0..num_workers.min(files.len()) {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok((i, path)) = task_rx.recv() {
                    let result = read_chunk(&path);
                    if result_tx.send((i, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<ChunkData>> = (0..files.len()).map(|_| None).collect();
    while let Ok((i, result)) = result_rx.recv() {
        slots[i] = Some(result?);
    }
    slots
        .into_iter()
        .map(|slot| {
            slot.ok_or_else(|| DatasetError::Decode("chunk loader worker dropped a task".into()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::chunk::write_chunk;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn spec() -> DomainSpec {
        DomainSpec::new("sim-world", 1, 0)
    }

    /// Persist `n` transitions whose obs value equals their global index.
    fn write_indexed(dir: &Path, n: usize, chunk_size: usize) {
        let transitions: Vec<Transition> = (0..n)
            .map(|i| Transition::new(vec![i as f32], vec![], vec![i as f32]))
            .collect();
        for (seq, chunk) in transitions.chunks(chunk_size).enumerate() {
            write_chunk(dir, seq as u64, 1, 0, chunk).unwrap();
        }
    }

    #[test]
    fn test_open_preserves_chunk_order() {
        let dir = tempdir().unwrap();
        write_indexed(dir.path(), 10, 4);

        let dataset = DomainDataset::open(dir.path(), spec()).unwrap();
        assert_eq!(dataset.len(), 10);
        for i in 0..10 {
            assert_eq!(dataset.transition(i).obs, vec![i as f32]);
        }
    }

    #[test]
    fn test_parallel_load_matches_sequential() {
        let dir = tempdir().unwrap();
        write_indexed(dir.path(), 64, 8);

        let sequential = DomainDataset::open(dir.path(), spec()).unwrap();
        let parallel = DomainDataset::open_with_workers(dir.path(), spec(), 4).unwrap();
        assert_eq!(sequential.obs, parallel.obs);
        assert_eq!(sequential.len(), parallel.len());
    }

    #[test]
    fn test_epoch_covers_every_transition_once() {
        let dir = tempdir().unwrap();
        write_indexed(dir.path(), 100, 32);
        let dataset = DomainDataset::open(dir.path(), spec()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let mut seen: Vec<f32> = dataset
            .epoch_batches(16, &mut rng)
            .flat_map(|b| b.obs)
            .collect();
        assert_eq!(seen.len(), 100);
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expected: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_epochs_reshuffle() {
        let dir = tempdir().unwrap();
        write_indexed(dir.path(), 100, 100);
        let dataset = DomainDataset::open(dir.path(), spec()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let first: Vec<f32> = dataset
            .epoch_batches(100, &mut rng)
            .flat_map(|b| b.obs)
            .collect();
        let second: Vec<f32> = dataset
            .epoch_batches(100, &mut rng)
            .flat_map(|b| b.obs)
            .collect();
        assert_ne!(first, second);
    }

    #[test]
    fn test_short_final_batch() {
        let dir = tempdir().unwrap();
        write_indexed(dir.path(), 10, 10);
        let dataset = DomainDataset::open(dir.path(), spec()).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let sizes: Vec<usize> = dataset.epoch_batches(4, &mut rng).map(|b| b.len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(dataset.num_batches(4), 3);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = tempdir().unwrap();
        write_indexed(dir.path(), 4, 4);

        let wrong = DomainSpec::new("sim-world", 3, 0);
        match DomainDataset::open(dir.path(), wrong) {
            Err(DatasetError::DimensionMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, (3, 0));
                assert_eq!(found, (1, 0));
            }
            other => panic!("expected dimension mismatch, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn test_empty_directory_rejected() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            DomainDataset::open(dir.path(), spec()),
            Err(DatasetError::Empty(_))
        ));
    }
}
