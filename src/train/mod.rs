//! Offline training: checkpoint lifecycle and the cycle-consistency
//! optimization loop.

pub mod checkpoint;
pub mod trainer;

pub use checkpoint::{
    list_checkpoints, load_checkpoint, load_latest_checkpoint, save_checkpoint, CheckpointError,
    CheckpointMetadata, ConfigSnapshot,
};
pub use trainer::{DomainSource, LrSchedule, Trainer, TrainerConfig};

use std::fmt;

use crate::data::DatasetError;

/// Errors surfaced by the trainer.
#[derive(Debug)]
pub enum TrainError {
    /// Invalid trainer configuration.
    Config(String),
    /// A domain dataset could not be opened.
    Dataset(DatasetError),
    /// A checkpoint could not be saved or restored.
    Checkpoint(CheckpointError),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainError::Config(e) => write!(f, "Config error: {}", e),
            TrainError::Dataset(e) => write!(f, "Dataset error: {}", e),
            TrainError::Checkpoint(e) => write!(f, "Checkpoint error: {}", e),
        }
    }
}

impl std::error::Error for TrainError {}

impl From<DatasetError> for TrainError {
    fn from(e: DatasetError) -> Self {
        TrainError::Dataset(e)
    }
}

impl From<CheckpointError> for TrainError {
    fn from(e: CheckpointError) -> Self {
        TrainError::Checkpoint(e)
    }
}
