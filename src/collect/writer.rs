//! Background chunk writer with a bounded in-memory buffer.
//!
//! Producers push transitions onto a bounded channel; a single writer
//! thread drains it, assembling chunks of `chunk_size` transitions and
//! persisting each with bounded-backoff retries. While retries are in
//! flight the channel doubles as the retry queue: producers keep filling
//! it and block once it saturates, so no transition is ever dropped
//! without an explicit error.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use super::CollectError;
use crate::core::transition::Transition;
use crate::data::chunk::{next_chunk_seq, write_chunk};

/// Configuration for the chunk writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Directory receiving chunk files.
    pub data_dir: PathBuf,
    /// Observation dimension of incoming transitions.
    pub obs_dim: usize,
    /// Action dimension of incoming transitions.
    pub action_dim: usize,
    /// Transitions per persisted chunk.
    pub chunk_size: usize,
    /// Capacity of the in-memory buffer between producer and writer.
    pub buffer_size: usize,
    /// Write attempts per chunk before the writer gives up.
    pub retry_limit: usize,
    /// Initial backoff between retries (doubled per attempt).
    pub retry_backoff: Duration,
}

/// Totals reported by a finished writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Transitions durably persisted.
    pub transitions_persisted: usize,
    /// Chunk files written (the last one may be partial).
    pub chunks_written: usize,
}

/// Bounded buffer plus background persistence thread.
///
/// `add` never performs I/O on the caller's thread; it blocks only when
/// the buffer is full. `stop` flushes everything accepted before it was
/// called, including a final partial chunk.
pub struct ChunkWriter {
    config: WriterConfig,
    tx: Option<Sender<Transition>>,
    handle: Option<JoinHandle<Result<CollectionStats, CollectError>>>,
    failed: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<String>>>,
}

impl ChunkWriter {
    /// Create a writer; no thread is spawned until [`ChunkWriter::start`].
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            tx: None,
            handle: None,
            failed: Arc::new(AtomicBool::new(false)),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin accepting transitions and spawn the persistence thread.
    ///
    /// Chunk numbering continues from any chunks already present in the
    /// data directory, so interrupted runs can resume.
    pub fn start(&mut self) -> Result<(), CollectError> {
        if self.handle.is_some() {
            return Err(CollectError::Config("writer already started".into()));
        }
        if self.config.obs_dim == 0 {
            return Err(CollectError::Config("obs_dim must be > 0".into()));
        }
        if self.config.chunk_size == 0 || self.config.buffer_size == 0 {
            return Err(CollectError::Config(
                "chunk_size and buffer_size must be > 0".into(),
            ));
        }

        std::fs::create_dir_all(&self.config.data_dir)?;
        let start_seq = next_chunk_seq(&self.config.data_dir)?;

        let (tx, rx) = bounded(self.config.buffer_size);
        let config = self.config.clone();
        let failed = self.failed.clone();
        let failure = self.failure.clone();

        let handle = std::thread::Builder::new()
            .name("chunk-writer".to_string())
            .spawn(move || writer_loop(rx, config, start_seq, failed, failure))
            .map_err(|e| CollectError::Config(format!("failed to spawn writer thread: {}", e)))?;

        self.tx = Some(tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Queue one transition for persistence.
    ///
    /// Blocks only when the buffer is full (producer outpacing storage).
    /// Fails fast with [`CollectError::WriterFailed`] once the background
    /// writer has given up.
    pub fn add(&self, transition: Transition) -> Result<(), CollectError> {
        if self.failed.load(Ordering::Acquire) {
            return Err(self.failure_error());
        }
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| CollectError::Config("writer not started".into()))?;
        tx.send(transition).map_err(|_| self.failure_error())
    }

    /// Flush all buffered transitions and terminate the writer thread.
    ///
    /// Idempotent: calling twice, or without a prior start, is a no-op
    /// returning the default stats.
    pub fn stop(&mut self) -> Result<CollectionStats, CollectError> {
        self.tx = None; // disconnects the channel; writer drains and flushes
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| CollectError::WriterFailed("writer thread panicked".into()))?,
            None => Ok(CollectionStats::default()),
        }
    }

    fn failure_error(&self) -> CollectError {
        let detail = self
            .failure
            .lock()
            .clone()
            .unwrap_or_else(|| "writer terminated".into());
        CollectError::WriterFailed(detail)
    }
}

impl Drop for ChunkWriter {
    fn drop(&mut self) {
        // Best effort flush when the owner forgets to stop.
        let _ = self.stop();
    }
}

fn writer_loop(
    rx: Receiver<Transition>,
    config: WriterConfig,
    start_seq: u64,
    failed: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<String>>>,
) -> Result<CollectionStats, CollectError> {
    let mut pending: Vec<Transition> = Vec::with_capacity(config.chunk_size);
    let mut seq = start_seq;
    let mut stats = CollectionStats::default();

    let mut fail = |rx: &Receiver<Transition>, e: CollectError| {
        *failure.lock() = Some(e.to_string());
        failed.store(true, Ordering::Release);
        // Unblock producers stuck on a saturated buffer before surfacing
        // the error; their data is reported lost, not silently dropped.
        while rx.try_recv().is_ok() {}
        e
    };

    loop {
        match rx.recv() {
            Ok(transition) => {
                pending.push(transition);
                if pending.len() == config.chunk_size {
                    match persist_with_retry(&config, seq, &pending) {
                        Ok(()) => {
                            stats.transitions_persisted += pending.len();
                            stats.chunks_written += 1;
                            seq += 1;
                            pending.clear();
                        }
                        Err(e) => return Err(fail(&rx, e)),
                    }
                }
            }
            // Disconnected: every producer handle dropped, flush and exit.
            Err(_) => break,
        }
    }

    if !pending.is_empty() {
        match persist_with_retry(&config, seq, &pending) {
            Ok(()) => {
                stats.transitions_persisted += pending.len();
                stats.chunks_written += 1;
            }
            Err(e) => return Err(fail(&rx, e)),
        }
    }
    Ok(stats)
}

/// Write one chunk, retrying transient failures with doubling backoff.
fn persist_with_retry(
    config: &WriterConfig,
    seq: u64,
    transitions: &[Transition],
) -> Result<(), CollectError> {
    let mut backoff = config.retry_backoff;
    for attempt in 0..=config.retry_limit {
        match write_chunk(
            &config.data_dir,
            seq,
            config.obs_dim,
            config.action_dim,
            transitions,
        ) {
            Ok(_) => return Ok(()),
            Err(e) if attempt == config.retry_limit => {
                return Err(CollectError::WriterFailed(format!(
                    "chunk {} failed after {} attempts: {}",
                    seq,
                    config.retry_limit + 1,
                    e
                )));
            }
            Err(_) => {
                std::thread::sleep(backoff);
                backoff *= 2;
            }
        }
    }
    unreachable!("retry loop always returns");
}
