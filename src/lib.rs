//! # World Translation: Cycle-Consistent Sim-to-Real Transition Mapping
//!
//! Learns a bidirectional mapping between the transition distributions of
//! two worlds (e.g. a simulator and a physical system) from unpaired
//! observation logs, then translates live state between them at
//! deployment time.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Collection (per world, independent)                         │
//! │  World ──step──▶ TransitionCollector ──channel──▶            │
//! │                      chunk-writer thread ──▶ chunk_*.bin     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Training (offline)                                          │
//! │  DomainDataset A ─┐                                          │
//! │                   ├─▶ Trainer ──▶ TranslationModel           │
//! │  DomainDataset B ─┘       │   (enc/dec per domain,           │
//! │                           │    shared latent space)          │
//! │                           ▼                                  │
//! │                   checkpoint_NNNNNN/                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Deployment                                                  │
//! │  load_latest_checkpoint ──▶ WorldTranslator::translate       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Collection never blocks the stepping loop on disk I/O: transitions
//! flow through a bounded channel to a dedicated writer thread that
//! compresses and persists fixed-size chunks. Training pairs two chunk
//! directories and optimizes per-domain reconstruction plus a
//! cycle-consistency penalty, so no paired samples are ever required.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use world_translation::{
//!     CollectorConfig, DomainSource, DomainSpec, Trainer, TrainerConfig,
//!     TransitionCollector, WorldTranslator,
//! };
//!
//! // Collect, once per world:
//! let mut collector = TransitionCollector::new(CollectorConfig::new("data/sim", 3, 0));
//! collector.start_collection()?;
//! collector.add_transition(&prev_obs, &[], &obs)?;
//! let stats = collector.stop_collection()?;
//!
//! // Train:
//! let mut trainer: Trainer<B> = Trainer::new(
//!     DomainSource::new("data/sim", DomainSpec::new("sim-world", 3, 0)),
//!     DomainSource::new("data/real", DomainSpec::new("real-world", 3, 0)),
//!     256,
//!     device,
//! );
//! trainer.configure(TrainerConfig::new().with_batch_size(128));
//! trainer.train(200, 10)?;
//!
//! // Deploy:
//! let translator = WorldTranslator::<B>::from_checkpoint_dir("checkpoints", device)?;
//! let real_obs = translator.translate("sim-world", "real-world", &prev, &[], &obs)?;
//! ```

pub mod core;
pub mod collect;
pub mod data;
pub mod model;
pub mod train;
pub mod deploy;
pub mod metrics;
pub mod world;

// Re-export main types
pub use crate::core::{Transition, TransitionBatch};
pub use collect::{CollectError, CollectionStats, CollectorConfig, TransitionCollector};
pub use data::{DatasetError, DomainDataset, DomainSpec};
pub use deploy::{TranslateError, WorldTranslator};
pub use metrics::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, NullLogger, TrainingSnapshot};
pub use model::{TranslationModel, TranslationModelConfig};
pub use train::{
    load_latest_checkpoint, CheckpointError, CheckpointMetadata, DomainSource, Trainer,
    TrainerConfig, TrainError,
};
pub use world::{drive_collection, drive_translated, BallWorld, World, BALL_OBS_DIM};
