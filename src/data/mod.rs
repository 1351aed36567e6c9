//! Persisted transition storage: chunk files and domain datasets.
//!
//! A domain is a directory of immutable chunk files sharing one
//! observation/action dimensionality. Chunks are write-once artifacts
//! (published by rename), so any number of readers may load them
//! concurrently without coordination.

pub mod chunk;
pub mod dataset;

pub use chunk::{chunk_file_name, list_chunk_files, read_chunk, write_chunk, ChunkData};
pub use dataset::{DomainDataset, EpochBatches};

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity and dimensionality of one observation domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSpec {
    /// Semantic name, e.g. "sim-world" or "real-world"
    pub name: String,
    /// Observation vector dimension
    pub obs_dim: usize,
    /// Action vector dimension (0 for action-free domains)
    pub action_dim: usize,
}

impl DomainSpec {
    /// Create a new domain spec.
    pub fn new(name: impl Into<String>, obs_dim: usize, action_dim: usize) -> Self {
        Self {
            name: name.into(),
            obs_dim,
            action_dim,
        }
    }

    /// Dimension of the full transition vector: `2 * obs_dim + action_dim`.
    pub fn transition_dim(&self) -> usize {
        2 * self.obs_dim + self.action_dim
    }
}

/// Error type for dataset and chunk operations.
#[derive(Debug)]
pub enum DatasetError {
    /// IO error while reading chunk storage.
    Io(io::Error),
    /// Chunk file exists but could not be decoded.
    Decode(String),
    /// Declared dimensions do not match what is stored on disk.
    DimensionMismatch {
        /// `(obs_dim, action_dim)` declared by the caller
        expected: (usize, usize),
        /// `(obs_dim, action_dim)` found in the chunk
        found: (usize, usize),
        /// Offending chunk file
        chunk: PathBuf,
    },
    /// The storage directory contains no chunks.
    Empty(PathBuf),
    /// Invalid configuration (e.g. zero observation dimension).
    Config(String),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Io(e) => write!(f, "IO error: {}", e),
            DatasetError::Decode(e) => write!(f, "Chunk decode error: {}", e),
            DatasetError::DimensionMismatch {
                expected,
                found,
                chunk,
            } => write!(
                f,
                "Dimension mismatch in {}: declared (obs={}, action={}), stored (obs={}, action={})",
                chunk.display(),
                expected.0,
                expected.1,
                found.0,
                found.1
            ),
            DatasetError::Empty(dir) => {
                write!(f, "No chunk files found in {}", dir.display())
            }
            DatasetError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for DatasetError {}

impl From<io::Error> for DatasetError {
    fn from(e: io::Error) -> Self {
        DatasetError::Io(e)
    }
}
