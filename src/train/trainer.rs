//! Trainer: couples two domain datasets to the translation model.
//!
//! Each optimization step draws one mini-batch from each domain. The two
//! draws are matched in size but never paired in time (the domains were
//! collected independently), which is exactly the setting cycle
//! consistency exists for. The composite loss is
//!
//! ```text
//! loss = mse(dec_a(enc_a(xa)), xa) + mse(dec_b(enc_b(xb)), xb)
//!      + lambda_cycle * ( l1(dec_a(enc_b(dec_b(enc_a(xa)))), xa)
//!                       + l1(dec_b(enc_a(dec_a(enc_b(xb)))), xb) )
//! ```
//!
//! Reconstruction is mean-squared error; the cycle term is an L1 penalty
//! in observation space. With `lambda_cycle = 0` training degenerates to
//! two independent autoencoders and the cycle term is skipped entirely.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::checkpoint::{
    load_latest_checkpoint, save_checkpoint, CheckpointError, CheckpointMetadata, ConfigSnapshot,
};
use super::TrainError;
use crate::core::transition::TransitionBatch;
use crate::data::{DomainDataset, DomainSpec};
use crate::metrics::{ConsoleLogger, MetricsLogger, TrainingSnapshot};
use crate::model::{TranslationModel, TranslationModelConfig};

/// Learning-rate schedule: maps an epoch index to a multiplier applied to
/// the base learning rate.
pub type LrSchedule = Arc<dyn Fn(usize) -> f64 + Send + Sync>;

/// One domain's training data source: a chunk directory plus the declared
/// identity and dimensions it must match.
#[derive(Debug, Clone)]
pub struct DomainSource {
    /// Directory containing the domain's chunk files.
    pub data_dir: PathBuf,
    /// Declared domain identity and dimensions.
    pub spec: DomainSpec,
}

impl DomainSource {
    /// Create a new domain source.
    pub fn new(data_dir: impl Into<PathBuf>, spec: DomainSpec) -> Self {
        Self {
            data_dir: data_dir.into(),
            spec,
        }
    }
}

/// Trainer configuration. Unset options keep the documented defaults.
#[derive(Clone)]
pub struct TrainerConfig {
    /// Mini-batch size per optimization step. Default: 128.
    pub batch_size: usize,
    /// Weight of the cycle-consistency loss relative to reconstruction.
    /// Default: 10.0. Zero disables the cross-domain signal.
    pub lambda_cycle: f64,
    /// Base learning rate. Default: 1e-3.
    pub lr: f64,
    /// Epoch-indexed learning-rate multiplier. Default: constant 1.0.
    pub lr_lambda: LrSchedule,
    /// Data-loading parallelism when opening datasets. Default: 2.
    pub num_workers: usize,
    /// Hidden layer width of the model's MLPs. Default: 128.
    pub hidden_dim: usize,
    /// Checkpoint directory. Default: "./checkpoints".
    pub checkpoint_dir: PathBuf,
    /// Seed for epoch shuffling. Default: 42.
    pub shuffle_seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 128,
            lambda_cycle: 10.0,
            lr: 1e-3,
            lr_lambda: Arc::new(|_| 1.0),
            num_workers: 2,
            hidden_dim: 128,
            checkpoint_dir: PathBuf::from("./checkpoints"),
            shuffle_seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mini-batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the cycle-consistency weight.
    pub fn with_lambda_cycle(mut self, lambda_cycle: f64) -> Self {
        self.lambda_cycle = lambda_cycle;
        self
    }

    /// Set the base learning rate.
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set the learning-rate schedule.
    pub fn with_lr_lambda<F>(mut self, lr_lambda: F) -> Self
    where
        F: Fn(usize) -> f64 + Send + Sync + 'static,
    {
        self.lr_lambda = Arc::new(lr_lambda);
        self
    }

    /// Set the data-loading parallelism.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set the hidden layer width.
    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    /// Set the checkpoint directory.
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// Set the shuffle seed.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = seed;
        self
    }

    fn validate(&self) -> Result<(), TrainError> {
        if self.batch_size == 0 {
            return Err(TrainError::Config("batch_size must be > 0".into()));
        }
        if self.hidden_dim == 0 {
            return Err(TrainError::Config("hidden_dim must be > 0".into()));
        }
        if !self.lambda_cycle.is_finite() || self.lambda_cycle < 0.0 {
            return Err(TrainError::Config(
                "lambda_cycle must be finite and >= 0".into(),
            ));
        }
        if !self.lr.is_finite() || self.lr <= 0.0 {
            return Err(TrainError::Config("lr must be finite and > 0".into()));
        }
        Ok(())
    }

    fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            batch_size: self.batch_size,
            lambda_cycle: self.lambda_cycle,
            learning_rate: self.lr,
            num_workers: self.num_workers,
        }
    }
}

impl fmt::Debug for TrainerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainerConfig")
            .field("batch_size", &self.batch_size)
            .field("lambda_cycle", &self.lambda_cycle)
            .field("lr", &self.lr)
            .field("lr_lambda", &"<schedule fn>")
            .field("num_workers", &self.num_workers)
            .field("hidden_dim", &self.hidden_dim)
            .field("checkpoint_dir", &self.checkpoint_dir)
            .field("shuffle_seed", &self.shuffle_seed)
            .finish()
    }
}

/// Offline trainer for the translation model.
///
/// Owns the model's live parameters for the duration of training;
/// deployment reads parameters only through published checkpoints.
pub struct Trainer<B: AutodiffBackend> {
    source_a: DomainSource,
    source_b: DomainSource,
    latent_dim: usize,
    device: B::Device,
    config: TrainerConfig,
    logger: Box<dyn MetricsLogger>,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a trainer over two independently collected domains.
    pub fn new(
        source_a: DomainSource,
        source_b: DomainSource,
        latent_dim: usize,
        device: B::Device,
    ) -> Self {
        Self {
            source_a,
            source_b,
            latent_dim,
            device,
            config: TrainerConfig::default(),
            logger: Box::new(ConsoleLogger::new(1)),
        }
    }

    /// Replace the default configuration.
    pub fn configure(&mut self, config: TrainerConfig) {
        self.config = config;
    }

    /// Replace the default console logger.
    pub fn set_logger(&mut self, logger: Box<dyn MetricsLogger>) {
        self.logger = logger;
    }

    /// The active configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run the optimization loop for up to `num_epochs` total epochs,
    /// publishing a checkpoint every `save_freq` epochs and after the
    /// final one.
    ///
    /// If the checkpoint directory already holds a valid checkpoint for
    /// these domains, training resumes from it instead of restarting from
    /// random initialization; epochs already covered by the checkpoint
    /// are not repeated. Returns one [`TrainingSnapshot`] per epoch run.
    pub fn train(
        &mut self,
        num_epochs: usize,
        save_freq: usize,
    ) -> Result<Vec<TrainingSnapshot>, TrainError> {
        self.config.validate()?;
        if save_freq == 0 {
            return Err(TrainError::Config("save_freq must be > 0".into()));
        }
        if self.latent_dim == 0 {
            return Err(TrainError::Config("latent_dim must be > 0".into()));
        }
        if self.source_a.spec.name == self.source_b.spec.name {
            return Err(TrainError::Config(format!(
                "domains must be distinct, both named '{}'",
                self.source_a.spec.name
            )));
        }

        let workers = self.config.num_workers.max(1);
        let dataset_a = DomainDataset::open_with_workers(
            &self.source_a.data_dir,
            self.source_a.spec.clone(),
            workers,
        )?;
        let dataset_b = DomainDataset::open_with_workers(
            &self.source_b.data_dir,
            self.source_b.spec.clone(),
            workers,
        )?;

        let (mut model, start_epoch) = self.restore_or_init()?;
        if start_epoch >= num_epochs {
            return Ok(Vec::new());
        }

        let mut optim = AdamConfig::new().init::<B, TranslationModel<B>>();
        let mse = MseLoss::new();
        let lambda = self.config.lambda_cycle;
        let batch_size = self.config.batch_size;

        // Independent shuffle streams per domain; offset by the resume
        // epoch so a resumed run does not replay the same epoch orders.
        let seed = self.config.shuffle_seed.wrapping_add(start_epoch as u64);
        let mut rng_a = StdRng::seed_from_u64(seed);
        let mut rng_b = StdRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);

        let mut history = Vec::with_capacity(num_epochs - start_epoch);
        for epoch in start_epoch..num_epochs {
            let lr = self.config.lr * (self.config.lr_lambda)(epoch);

            let mut iter_a = dataset_a.epoch_batches(batch_size, &mut rng_a);
            let mut iter_b = dataset_b.epoch_batches(batch_size, &mut rng_b);

            let mut sums = (0.0f32, 0.0f32, 0.0f32, 0.0f32); // total, rec_a, rec_b, cycle
            let mut batches = 0usize;

            while let (Some(batch_a), Some(batch_b)) = (iter_a.next(), iter_b.next()) {
                let xa = to_tensor::<B>(&batch_a, &self.source_a.spec, &self.device);
                let xb = to_tensor::<B>(&batch_b, &self.source_b.spec, &self.device);

                let za = model.encode_a(xa.clone());
                let zb = model.encode_b(xb.clone());
                let recon_a = mse.forward(model.decode_a(za.clone()), xa.clone(), Reduction::Mean);
                let recon_b = mse.forward(model.decode_b(zb.clone()), xb.clone(), Reduction::Mean);

                let (loss, cycle_value) = if lambda > 0.0 {
                    let cycled_a = model.decode_a(model.encode_b(model.decode_b(za)));
                    let cycled_b = model.decode_b(model.encode_a(model.decode_a(zb)));
                    let cycle = (cycled_a - xa).abs().mean() + (cycled_b - xb).abs().mean();
                    let cycle_value = scalar(&cycle);
                    (
                        recon_a.clone() + recon_b.clone() + cycle.mul_scalar(lambda),
                        cycle_value,
                    )
                } else {
                    (recon_a.clone() + recon_b.clone(), 0.0)
                };

                sums.0 += scalar(&loss);
                sums.1 += scalar(&recon_a);
                sums.2 += scalar(&recon_b);
                sums.3 += cycle_value;
                batches += 1;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(lr, model, grads);
            }

            let n = batches.max(1) as f32;
            let snapshot = TrainingSnapshot::new(epoch, batches, sums.0 / n)
                .with_losses(sums.1 / n, sums.2 / n, sums.3 / n)
                .with_learning_rate(lr);
            self.logger.log(&snapshot);
            history.push(snapshot);

            let completed = epoch + 1;
            if completed % save_freq == 0 || completed == num_epochs {
                let metadata = self.metadata(completed);
                save_checkpoint(&self.config.checkpoint_dir, &model, &metadata)?;
            }
        }
        self.logger.flush();
        Ok(history)
    }

    /// Resume from the latest valid checkpoint, or initialize fresh
    /// parameters when none exists.
    fn restore_or_init(&self) -> Result<(TranslationModel<B>, usize), TrainError> {
        match load_latest_checkpoint::<B>(&self.config.checkpoint_dir, &self.device) {
            Ok((model, metadata)) => {
                self.verify_resume(&metadata)?;
                Ok((model, metadata.epoch))
            }
            Err(CheckpointError::NoValidCheckpoint(_)) => {
                let model = TranslationModelConfig::new(
                    self.source_a.spec.transition_dim(),
                    self.source_b.spec.transition_dim(),
                    self.latent_dim,
                )
                .with_hidden_dim(self.config.hidden_dim)
                .init(&self.device);
                Ok((model, 0))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A checkpoint is only resumable when it describes the same problem.
    fn verify_resume(&self, metadata: &CheckpointMetadata) -> Result<(), TrainError> {
        if metadata.domain_a != self.source_a.spec || metadata.domain_b != self.source_b.spec {
            return Err(TrainError::Config(format!(
                "checkpoint domains ({}, {}) do not match configured domains ({}, {})",
                metadata.domain_a.name,
                metadata.domain_b.name,
                self.source_a.spec.name,
                self.source_b.spec.name
            )));
        }
        if metadata.latent_dim != self.latent_dim {
            return Err(TrainError::Config(format!(
                "checkpoint latent_dim {} != configured latent_dim {}",
                metadata.latent_dim, self.latent_dim
            )));
        }
        if metadata.hidden_dim != self.config.hidden_dim {
            return Err(TrainError::Config(format!(
                "checkpoint hidden_dim {} != configured hidden_dim {}",
                metadata.hidden_dim, self.config.hidden_dim
            )));
        }
        Ok(())
    }

    fn metadata(&self, epoch: usize) -> CheckpointMetadata {
        CheckpointMetadata {
            format_version: 1,
            epoch,
            domain_a: self.source_a.spec.clone(),
            domain_b: self.source_b.spec.clone(),
            latent_dim: self.latent_dim,
            hidden_dim: self.config.hidden_dim,
            config: self.config.snapshot(),
        }
    }
}

/// Assemble a `[len, transition_dim]` tensor from a batch.
fn to_tensor<B: Backend>(
    batch: &TransitionBatch,
    spec: &DomainSpec,
    device: &B::Device,
) -> Tensor<B, 2> {
    let rows = batch.to_rows(spec.obs_dim, spec.action_dim);
    Tensor::<B, 1>::from_floats(rows.as_slice(), device)
        .reshape([batch.len, spec.transition_dim()])
}

fn scalar<B: Backend>(tensor: &Tensor<B, 1>) -> f32 {
    tensor.clone().into_scalar().elem()
}
