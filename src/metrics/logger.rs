//! Training loggers for translation training.
//!
//! Provides different logging backends for per-epoch training metrics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// Per-epoch training snapshot for logging.
#[derive(Debug, Clone)]
pub struct TrainingSnapshot {
    /// Completed epoch index (0-based).
    pub epoch: usize,
    /// Optimizer steps taken this epoch.
    pub batches: usize,
    /// Composite loss averaged over the epoch.
    pub total_loss: f32,
    /// Domain-A reconstruction loss (epoch mean).
    pub recon_loss_a: f32,
    /// Domain-B reconstruction loss (epoch mean).
    pub recon_loss_b: f32,
    /// Cycle-consistency loss, both directions summed (epoch mean).
    /// Zero when the cycle weight is zero.
    pub cycle_loss: f32,
    /// Learning rate used this epoch (after the schedule multiplier).
    pub learning_rate: f64,
}

impl TrainingSnapshot {
    /// Create a new training snapshot.
    pub fn new(epoch: usize, batches: usize, total_loss: f32) -> Self {
        Self {
            epoch,
            batches,
            total_loss,
            recon_loss_a: 0.0,
            recon_loss_b: 0.0,
            cycle_loss: 0.0,
            learning_rate: 0.0,
        }
    }

    /// Set the loss components.
    pub fn with_losses(mut self, recon_a: f32, recon_b: f32, cycle: f32) -> Self {
        self.recon_loss_a = recon_a;
        self.recon_loss_b = recon_b;
        self.cycle_loss = cycle;
        self
    }

    /// Set the learning rate.
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    /// Log a training snapshot.
    fn log(&mut self, snapshot: &TrainingSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Console logger with aligned columns.
pub struct ConsoleLogger {
    log_interval: usize,
    show_header: bool,
    start_time: Instant,
}

impl ConsoleLogger {
    /// Create a new console logger printing every `log_interval` epochs.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
            show_header: true,
            start_time: Instant::now(),
        }
    }

    fn print_header(&self) {
        println!(
            "{:>7} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "Epoch", "Batches", "Total", "ReconA", "ReconB", "Cycle", "LR", "Elapsed"
        );
        println!("{}", "-".repeat(80));
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        if snapshot.epoch % self.log_interval != 0 {
            return;
        }
        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        println!(
            "{:>7} {:>8} {:>10.5} {:>10.5} {:>10.5} {:>10.5} {:>10.2e} {:>7.1}s",
            snapshot.epoch,
            snapshot.batches,
            snapshot.total_loss,
            snapshot.recon_loss_a,
            snapshot.recon_loss_b,
            snapshot.cycle_loss,
            snapshot.learning_rate,
            self.start_time.elapsed().as_secs_f32()
        );
    }

    fn flush(&mut self) {
        // stdout is line-buffered, nothing to do
    }
}

/// CSV file logger for offline analysis.
pub struct CsvLogger {
    writer: BufWriter<File>,
}

impl CsvLogger {
    /// Create a new CSV logger writing to `path`.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "epoch,batches,total_loss,recon_loss_a,recon_loss_b,cycle_loss,learning_rate"
        )?;
        Ok(Self { writer })
    }
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        let _ = writeln!(
            self.writer,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.8}",
            snapshot.epoch,
            snapshot.batches,
            snapshot.total_loss,
            snapshot.recon_loss_a,
            snapshot.recon_loss_b,
            snapshot.cycle_loss,
            snapshot.learning_rate
        );
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for CsvLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Logger that discards everything. Useful in tests.
#[derive(Debug, Default)]
pub struct NullLogger;

impl MetricsLogger for NullLogger {
    fn log(&mut self, _snapshot: &TrainingSnapshot) {}
    fn flush(&mut self) {}
}

/// Multi-logger that writes to multiple backends.
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    /// Create a new multi-logger.
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
        }
    }

    /// Add a logger.
    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_training_snapshot_builders() {
        let snapshot = TrainingSnapshot::new(3, 20, 0.5)
            .with_losses(0.2, 0.25, 0.05)
            .with_learning_rate(1e-3);

        assert_eq!(snapshot.epoch, 3);
        assert_eq!(snapshot.batches, 20);
        assert!((snapshot.total_loss - 0.5).abs() < 1e-6);
        assert!((snapshot.cycle_loss - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_csv_logger_writes_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        {
            let mut logger = CsvLogger::new(&path).unwrap();
            logger.log(&TrainingSnapshot::new(0, 10, 1.25));
            logger.log(&TrainingSnapshot::new(1, 10, 0.75));
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("epoch,"));
        assert!(lines[1].starts_with("0,10,1.25"));
    }

    #[test]
    fn test_multi_logger() {
        let mut multi = MultiLogger::new().add(NullLogger).add(ConsoleLogger::new(100));
        multi.log(&TrainingSnapshot::new(0, 1, 0.0));
        multi.flush();
    }
}
