//! Online transition collection: bounded buffering plus background
//! chunked persistence.
//!
//! The driving physics loop calls [`TransitionCollector::add_transition`]
//! once per step; transitions queue on a bounded in-memory buffer and a
//! background thread assembles and writes chunks, so disk I/O never runs
//! on the stepping thread. A full buffer blocks the producer
//! (backpressure) instead of dropping data.

pub mod collector;
pub mod writer;


pub use collector::{CollectorConfig, TransitionCollector};
pub use writer::{ChunkWriter, CollectionStats, WriterConfig};

use std::fmt;
use std::io;

/// Error type for collection operations.
#[derive(Debug)]
pub enum CollectError {
    /// Invalid configuration or lifecycle misuse (not retried).
    Config(String),
    /// IO error while preparing storage.
    Io(io::Error),
    /// The background writer exhausted its retry budget and gave up.
    ///
    /// Transitions accepted after this point would be lost, so collection
    /// fails fast instead of dropping them silently.
    WriterFailed(String),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::Config(e) => write!(f, "Configuration error: {}", e),
            CollectError::Io(e) => write!(f, "IO error: {}", e),
            CollectError::WriterFailed(e) => write!(f, "Chunk writer failed: {}", e),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<io::Error> for CollectError {
    fn from(e: io::Error) -> Self {
        CollectError::Io(e)
    }
}
