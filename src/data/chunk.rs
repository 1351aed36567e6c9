//! Chunk file format: an immutable, fixed-size batch of transitions.
//!
//! Each chunk is a bincode-serialized [`ChunkData`] compressed with zstd,
//! written to a temporary file and published by rename so a chunk is never
//! visible half-written. Chunk boundaries carry no semantic meaning; they
//! exist only to amortize write and decode cost.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::DatasetError;
use crate::core::transition::Transition;

/// Zstd compression level for chunk payloads.
const CHUNK_COMPRESSION_LEVEL: i32 = 3;

/// On-disk payload of one chunk: flattened column storage plus the
/// dimensionality it was collected with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkData {
    /// Observation dimension of every transition in the chunk
    pub obs_dim: usize,
    /// Action dimension of every transition in the chunk
    pub action_dim: usize,
    /// Number of transitions
    pub len: usize,
    /// Flattened previous observations `[len * obs_dim]`
    pub prev_obs: Vec<f32>,
    /// Flattened actions `[len * action_dim]`
    pub action: Vec<f32>,
    /// Flattened observations `[len * obs_dim]`
    pub obs: Vec<f32>,
}

impl ChunkData {
    /// Build chunk data from an ordered slice of transitions.
    pub fn from_transitions(
        obs_dim: usize,
        action_dim: usize,
        transitions: &[Transition],
    ) -> Self {
        let len = transitions.len();
        let mut data = Self {
            obs_dim,
            action_dim,
            len,
            prev_obs: Vec::with_capacity(len * obs_dim),
            action: Vec::with_capacity(len * action_dim),
            obs: Vec::with_capacity(len * obs_dim),
        };
        for t in transitions {
            data.prev_obs.extend_from_slice(&t.prev_obs);
            data.action.extend_from_slice(&t.action);
            data.obs.extend_from_slice(&t.obs);
        }
        data
    }

    /// Reconstruct the `index`-th transition.
    pub fn transition(&self, index: usize) -> Transition {
        let o = self.obs_dim;
        let a = self.action_dim;
        Transition::new(
            self.prev_obs[index * o..(index + 1) * o].to_vec(),
            self.action[index * a..(index + 1) * a].to_vec(),
            self.obs[index * o..(index + 1) * o].to_vec(),
        )
    }

    /// Iterate over all transitions in stored order.
    pub fn transitions(&self) -> impl Iterator<Item = Transition> + '_ {
        (0..self.len).map(move |i| self.transition(i))
    }
}

/// File name for the chunk with sequence number `seq`.
pub fn chunk_file_name(seq: u64) -> String {
    format!("chunk_{:08}.bin", seq)
}

/// Write a chunk to `dir`, publishing it atomically.
///
/// The payload is staged under a `.tmp-` prefix and renamed into place,
/// so readers never observe a partial chunk.
pub fn write_chunk(
    dir: &Path,
    seq: u64,
    obs_dim: usize,
    action_dim: usize,
    transitions: &[Transition],
) -> io::Result<PathBuf> {
    let data = ChunkData::from_transitions(obs_dim, action_dim, transitions);
    let encoded = bincode::serialize(&data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    let compressed = zstd::encode_all(encoded.as_slice(), CHUNK_COMPRESSION_LEVEL)?;

    let file_name = chunk_file_name(seq);
    let tmp_path = dir.join(format!(".tmp-{}", file_name));
    let final_path = dir.join(&file_name);

    fs::write(&tmp_path, &compressed)?;
    fs::rename(&tmp_path, &final_path)?;
    Ok(final_path)
}

/// Read and decode one chunk file.
pub fn read_chunk(path: &Path) -> Result<ChunkData, DatasetError> {
    let compressed = fs::read(path)?;
    let encoded = zstd::decode_all(compressed.as_slice())
        .map_err(|e| DatasetError::Decode(format!("{}: {}", path.display(), e)))?;
    let data: ChunkData = bincode::deserialize(&encoded)
        .map_err(|e| DatasetError::Decode(format!("{}: {}", path.display(), e)))?;

    let expected = (data.len * data.obs_dim, data.len * data.action_dim);
    if data.prev_obs.len() != expected.0
        || data.obs.len() != expected.0
        || data.action.len() != expected.1
    {
        return Err(DatasetError::Decode(format!(
            "{}: inconsistent chunk payload lengths",
            path.display()
        )));
    }
    Ok(data)
}

/// List chunk files in `dir`, sorted by sequence number.
///
/// Temporary (`.tmp-` prefixed) and unrelated files are ignored.
pub fn list_chunk_files(dir: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut chunks = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(seq) = name
            .strip_prefix("chunk_")
            .and_then(|s| s.strip_suffix(".bin"))
            .and_then(|s| s.parse::<u64>().ok())
        else {
            continue;
        };
        chunks.push((seq, path));
    }
    chunks.sort_by_key(|(seq, _)| *seq);
    Ok(chunks)
}

/// Next free sequence number in `dir` (0 for a fresh directory).
///
/// Lets a stopped collection run resume without clobbering earlier chunks.
pub fn next_chunk_seq(dir: &Path) -> io::Result<u64> {
    Ok(list_chunk_files(dir)?
        .last()
        .map(|(seq, _)| seq + 1)
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_transitions(n: usize) -> Vec<Transition> {
        (0..n)
            .map(|i| {
                let base = i as f32;
                Transition::new(
                    vec![base, base + 0.1, base + 0.2],
                    vec![],
                    vec![base + 1.0, base + 1.1, base + 1.2],
                )
            })
            .collect()
    }

    #[test]
    fn test_chunk_round_trip() {
        let dir = tempdir().unwrap();
        let transitions = sample_transitions(10);

        let path = write_chunk(dir.path(), 0, 3, 0, &transitions).unwrap();
        let data = read_chunk(&path).unwrap();

        assert_eq!(data.len, 10);
        assert_eq!(data.obs_dim, 3);
        assert_eq!(data.action_dim, 0);
        let restored: Vec<Transition> = data.transitions().collect();
        assert_eq!(restored, transitions);
    }

    #[test]
    fn test_no_tmp_files_left_behind() {
        let dir = tempdir().unwrap();
        write_chunk(dir.path(), 3, 3, 0, &sample_transitions(4)).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["chunk_00000003.bin"]);
    }

    #[test]
    fn test_list_chunk_files_sorted() {
        let dir = tempdir().unwrap();
        for seq in [2u64, 0, 1] {
            write_chunk(dir.path(), seq, 3, 0, &sample_transitions(1)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let seqs: Vec<u64> = list_chunk_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|(seq, _)| seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(next_chunk_seq(dir.path()).unwrap(), 3);
    }

    #[test]
    fn test_read_chunk_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk_00000000.bin");
        fs::write(&path, b"not a chunk").unwrap();

        assert!(matches!(read_chunk(&path), Err(DatasetError::Decode(_))));
    }
}
