//! Collection lifecycle wrapper around the chunk writer.
//!
//! `add_transition` accepts flattened, batched observation rows straight
//! from a vectorized world (one call per physics step) and fans them out
//! into per-environment transitions. All persistence happens off the
//! calling thread.

use std::path::PathBuf;
use std::time::Duration;

use super::writer::{ChunkWriter, CollectionStats, WriterConfig};
use super::CollectError;
use crate::core::transition::Transition;

/// Configuration for a [`TransitionCollector`].
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Directory receiving this domain's chunk files.
    pub data_dir: PathBuf,
    /// Observation dimension per environment instance.
    pub obs_dim: usize,
    /// Action dimension per environment instance (0 for action-free).
    pub action_dim: usize,
    /// In-memory buffer capacity, in transitions.
    pub buffer_size: usize,
    /// Transitions per persisted chunk.
    pub chunk_size: usize,
    /// Write attempts per chunk before collection fails.
    pub retry_limit: usize,
    /// Initial retry backoff (doubled per attempt).
    pub retry_backoff: Duration,
}

impl CollectorConfig {
    /// Create a config with default buffering parameters.
    pub fn new(data_dir: impl Into<PathBuf>, obs_dim: usize, action_dim: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            obs_dim,
            action_dim,
            buffer_size: 1000,
            chunk_size: 5000,
            retry_limit: 5,
            retry_backoff: Duration::from_millis(50),
        }
    }

    /// Set the in-memory buffer capacity.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the per-chunk retry budget.
    pub fn with_retry_limit(mut self, retry_limit: usize) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Set the initial retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            data_dir: self.data_dir.clone(),
            obs_dim: self.obs_dim,
            action_dim: self.action_dim,
            chunk_size: self.chunk_size,
            buffer_size: self.buffer_size,
            retry_limit: self.retry_limit,
            retry_backoff: self.retry_backoff,
        }
    }
}

/// Collects `(prev_obs, action, obs)` triples from a running physics loop.
///
/// Decoupled from the stepping cadence: `add_transition` only queues data,
/// and `stop_collection` guarantees everything accepted is durable before
/// it returns.
pub struct TransitionCollector {
    config: CollectorConfig,
    writer: Option<ChunkWriter>,
}

impl TransitionCollector {
    /// Create a collector; nothing is persisted until collection starts.
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            writer: None,
        }
    }

    /// The collector's configuration.
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Whether collection is currently active.
    pub fn is_collecting(&self) -> bool {
        self.writer.is_some()
    }

    /// Begin accepting transitions.
    pub fn start_collection(&mut self) -> Result<(), CollectError> {
        if self.writer.is_some() {
            return Err(CollectError::Config("collection already active".into()));
        }
        let mut writer = ChunkWriter::new(self.config.writer_config());
        writer.start()?;
        self.writer = Some(writer);
        Ok(())
    }

    /// Queue one physics step worth of batched transitions.
    ///
    /// Slices are flattened row-major over environment instances: `obs`
    /// and `prev_obs` hold `n * obs_dim` floats and `action` holds
    /// `n * action_dim` floats for the same `n`. Each environment's row
    /// becomes one transition, submitted in environment order.
    pub fn add_transition(
        &self,
        prev_obs: &[f32],
        action: &[f32],
        obs: &[f32],
    ) -> Result<(), CollectError> {
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| CollectError::Config("collection not started".into()))?;

        let (obs_dim, action_dim) = (self.config.obs_dim, self.config.action_dim);
        if obs.is_empty() || obs.len() % obs_dim != 0 {
            return Err(CollectError::Config(format!(
                "obs length {} is not a positive multiple of obs_dim {}",
                obs.len(),
                obs_dim
            )));
        }
        let n_envs = obs.len() / obs_dim;
        if prev_obs.len() != obs.len() {
            return Err(CollectError::Config(format!(
                "prev_obs length {} != obs length {}",
                prev_obs.len(),
                obs.len()
            )));
        }
        if action.len() != n_envs * action_dim {
            return Err(CollectError::Config(format!(
                "action length {} != n_envs {} * action_dim {}",
                action.len(),
                n_envs,
                action_dim
            )));
        }

        for env in 0..n_envs {
            writer.add(Transition::new(
                prev_obs[env * obs_dim..(env + 1) * obs_dim].to_vec(),
                action[env * action_dim..(env + 1) * action_dim].to_vec(),
                obs[env * obs_dim..(env + 1) * obs_dim].to_vec(),
            ))?;
        }
        Ok(())
    }

    /// Stop collecting and flush every accepted transition to storage.
    ///
    /// Idempotent: a second call, or a call with no prior start, is a
    /// no-op returning default stats. Operator interruption routes through
    /// here as a normal termination path.
    pub fn stop_collection(&mut self) -> Result<CollectionStats, CollectError> {
        match self.writer.take() {
            Some(mut writer) => writer.stop(),
            None => Ok(CollectionStats::default()),
        }
    }
}
