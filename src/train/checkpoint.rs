//! Checkpoint lifecycle: versioned, immutable snapshots of the
//! translation model plus training metadata.
//!
//! On-disk layout: `checkpoint_{epoch:06}/` directories, each holding
//! `metadata.json` and `model.bin` (Burn binary record). A checkpoint is
//! staged under a `.tmp-` prefix and published by a single rename, so a
//! partially written checkpoint is never discoverable. "Latest" resolution
//! is a sorted scan with a validation predicate: the highest-numbered
//! artifact is never trusted until its metadata parses and its record
//! loads.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::data::DomainSpec;
use crate::model::{TranslationModel, TranslationModelConfig};

/// Current metadata format version.
const METADATA_FORMAT_VERSION: u32 = 1;

/// Error type for checkpoint operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Metadata missing, unparsable, or inconsistent.
    Metadata(String),
    /// Burn recorder error while saving or loading parameters.
    Record(String),
    /// No checkpoint in the directory passed validation.
    NoValidCheckpoint(PathBuf),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Metadata(e) => write!(f, "Metadata error: {}", e),
            CheckpointError::Record(e) => write!(f, "Record error: {}", e),
            CheckpointError::NoValidCheckpoint(dir) => {
                write!(f, "No valid checkpoint found in {}", dir.display())
            }
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// Snapshot of the training configuration stored with every checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Mini-batch size per optimization step.
    pub batch_size: usize,
    /// Cycle-consistency loss weight.
    pub lambda_cycle: f64,
    /// Base learning rate (before the schedule multiplier).
    pub learning_rate: f64,
    /// Data-loading parallelism.
    pub num_workers: usize,
}

/// Metadata written alongside every checkpoint's parameter record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Metadata format version.
    pub format_version: u32,
    /// Number of completed training epochs (the checkpoint identifier).
    pub epoch: usize,
    /// Domain A identity and dimensions.
    pub domain_a: DomainSpec,
    /// Domain B identity and dimensions.
    pub domain_b: DomainSpec,
    /// Shared latent dimension.
    pub latent_dim: usize,
    /// Hidden layer width of the model's MLPs.
    pub hidden_dim: usize,
    /// Training configuration at save time.
    pub config: ConfigSnapshot,
}

impl CheckpointMetadata {
    /// Model configuration implied by this metadata.
    pub fn model_config(&self) -> TranslationModelConfig {
        TranslationModelConfig::new(
            self.domain_a.transition_dim(),
            self.domain_b.transition_dim(),
            self.latent_dim,
        )
        .with_hidden_dim(self.hidden_dim)
    }

    fn validate(&self) -> Result<(), CheckpointError> {
        if self.format_version != METADATA_FORMAT_VERSION {
            return Err(CheckpointError::Metadata(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        if self.latent_dim == 0 || self.hidden_dim == 0 {
            return Err(CheckpointError::Metadata(
                "latent_dim and hidden_dim must be > 0".into(),
            ));
        }
        if self.domain_a.obs_dim == 0 || self.domain_b.obs_dim == 0 {
            return Err(CheckpointError::Metadata("obs_dim must be > 0".into()));
        }
        if self.domain_a.name == self.domain_b.name {
            return Err(CheckpointError::Metadata(format!(
                "domains must be distinct, both named '{}'",
                self.domain_a.name
            )));
        }
        Ok(())
    }
}

fn checkpoint_dir_name(epoch: usize) -> String {
    format!("checkpoint_{:06}", epoch)
}

/// Persist a checkpoint with atomic publish semantics.
///
/// Parameters and metadata are written into a `.tmp-` staging directory
/// and renamed into place; an interrupted save leaves only an ignorable
/// staging directory behind.
pub fn save_checkpoint<B: Backend>(
    checkpoint_dir: &Path,
    model: &TranslationModel<B>,
    metadata: &CheckpointMetadata,
) -> Result<PathBuf, CheckpointError> {
    metadata.validate()?;
    fs::create_dir_all(checkpoint_dir)?;

    let name = checkpoint_dir_name(metadata.epoch);
    let staging = checkpoint_dir.join(format!(".tmp-{}", name));
    let target = checkpoint_dir.join(&name);

    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CheckpointError::Metadata(e.to_string()))?;
    fs::write(staging.join("metadata.json"), json)?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(staging.join("model"), &recorder)
        .map_err(|e| CheckpointError::Record(e.to_string()))?;

    // Re-saving the same epoch replaces the previous artifact.
    if target.exists() {
        fs::remove_dir_all(&target)?;
    }
    fs::rename(&staging, &target)?;
    Ok(target)
}

/// List checkpoint directories by epoch, unvalidated, ascending.
///
/// Staging (`.tmp-`) directories and unrelated entries are ignored.
pub fn list_checkpoints(checkpoint_dir: &Path) -> io::Result<Vec<(usize, PathBuf)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(checkpoint_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(epoch) = name
            .strip_prefix("checkpoint_")
            .and_then(|s| s.parse::<usize>().ok())
        else {
            continue;
        };
        found.push((epoch, path));
    }
    found.sort_by_key(|(epoch, _)| *epoch);
    Ok(found)
}

/// Load one specific checkpoint directory.
pub fn load_checkpoint<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(TranslationModel<B>, CheckpointMetadata), CheckpointError> {
    let raw = fs::read_to_string(path.join("metadata.json"))?;
    let metadata: CheckpointMetadata =
        serde_json::from_str(&raw).map_err(|e| CheckpointError::Metadata(e.to_string()))?;
    metadata.validate()?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let template = metadata.model_config().init::<B>(device);
    let model = template
        .load_file(path.join("model"), &recorder, device)
        .map_err(|e| CheckpointError::Record(e.to_string()))?;
    Ok((model, metadata))
}

/// Resolve and load the latest valid checkpoint in a directory.
///
/// Candidates are visited in descending epoch order; corrupt or partial
/// ones are skipped, so injecting a broken artifact with a higher epoch
/// than a valid one does not change the result. Fails with
/// [`CheckpointError::NoValidCheckpoint`] when the directory is missing,
/// empty, or contains only invalid candidates.
pub fn load_latest_checkpoint<B: Backend>(
    checkpoint_dir: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(TranslationModel<B>, CheckpointMetadata), CheckpointError> {
    let checkpoint_dir = checkpoint_dir.as_ref();
    if !checkpoint_dir.is_dir() {
        return Err(CheckpointError::NoValidCheckpoint(
            checkpoint_dir.to_path_buf(),
        ));
    }

    let mut candidates = list_checkpoints(checkpoint_dir)?;
    candidates.reverse();
    for (_, path) in candidates {
        match load_checkpoint::<B>(&path, device) {
            Ok(loaded) => return Ok(loaded),
            // Invalid candidate: keep scanning older checkpoints.
            Err(_) => continue,
        }
    }
    Err(CheckpointError::NoValidCheckpoint(
        checkpoint_dir.to_path_buf(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    fn metadata(epoch: usize) -> CheckpointMetadata {
        CheckpointMetadata {
            format_version: METADATA_FORMAT_VERSION,
            epoch,
            domain_a: DomainSpec::new("sim-world", 3, 0),
            domain_b: DomainSpec::new("real-world", 3, 0),
            latent_dim: 4,
            hidden_dim: 16,
            config: ConfigSnapshot {
                batch_size: 32,
                lambda_cycle: 10.0,
                learning_rate: 1e-3,
                num_workers: 1,
            },
        }
    }

    fn save_at(dir: &Path, epoch: usize) {
        let meta = metadata(epoch);
        let model = meta.model_config().init::<TestBackend>(&Default::default());
        save_checkpoint(dir, &model, &meta).unwrap();
    }

    #[test]
    fn test_save_then_load_latest() {
        let dir = tempdir().unwrap();
        save_at(dir.path(), 10);

        let (model, meta) =
            load_latest_checkpoint::<TestBackend>(dir.path(), &Default::default()).unwrap();
        assert_eq!(meta.epoch, 10);
        assert_eq!(meta.domain_a.name, "sim-world");
        assert_eq!(model.latent_dim(), 4);
    }

    #[test]
    fn test_latest_is_maximum_epoch() {
        let dir = tempdir().unwrap();
        for epoch in [10, 30, 20] {
            save_at(dir.path(), epoch);
        }

        let (_, meta) =
            load_latest_checkpoint::<TestBackend>(dir.path(), &Default::default()).unwrap();
        assert_eq!(meta.epoch, 30);

        let epochs: Vec<usize> = list_checkpoints(dir.path())
            .unwrap()
            .into_iter()
            .map(|(e, _)| e)
            .collect();
        assert_eq!(epochs, vec![10, 20, 30]);
    }

    #[test]
    fn test_corrupt_checkpoint_is_skipped() {
        let dir = tempdir().unwrap();
        save_at(dir.path(), 10);

        // Higher-numbered checkpoint with a garbage parameter record.
        let bad = dir.path().join("checkpoint_000099");
        fs::create_dir_all(&bad).unwrap();
        let json = serde_json::to_string(&metadata(99)).unwrap();
        fs::write(bad.join("metadata.json"), json).unwrap();
        fs::write(bad.join("model.bin"), b"garbage").unwrap();

        let (_, meta) =
            load_latest_checkpoint::<TestBackend>(dir.path(), &Default::default()).unwrap();
        assert_eq!(meta.epoch, 10);
    }

    #[test]
    fn test_missing_metadata_is_skipped() {
        let dir = tempdir().unwrap();
        save_at(dir.path(), 5);
        fs::create_dir_all(dir.path().join("checkpoint_000007")).unwrap();

        let (_, meta) =
            load_latest_checkpoint::<TestBackend>(dir.path(), &Default::default()).unwrap();
        assert_eq!(meta.epoch, 5);
    }

    #[test]
    fn test_empty_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_latest_checkpoint::<TestBackend>(dir.path(), &Default::default()),
            Err(CheckpointError::NoValidCheckpoint(_))
        ));
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            load_latest_checkpoint::<TestBackend>(&missing, &Default::default()),
            Err(CheckpointError::NoValidCheckpoint(_))
        ));
    }

    #[test]
    fn test_staging_directories_ignored() {
        let dir = tempdir().unwrap();
        save_at(dir.path(), 3);
        // Leftover from an interrupted save.
        fs::create_dir_all(dir.path().join(".tmp-checkpoint_000042")).unwrap();

        let (_, meta) =
            load_latest_checkpoint::<TestBackend>(dir.path(), &Default::default()).unwrap();
        assert_eq!(meta.epoch, 3);
    }

    #[test]
    fn test_metadata_validation() {
        let mut meta = metadata(0);
        meta.latent_dim = 0;
        assert!(meta.validate().is_err());

        let mut meta = metadata(0);
        meta.domain_b.name = "sim-world".into();
        assert!(meta.validate().is_err());
    }
}
