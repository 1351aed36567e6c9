//! Training metrics and logging.
//!
//! - [`ConsoleLogger`]: aligned console output
//! - [`CsvLogger`]: CSV file logging for analysis
//! - [`MultiLogger`]: combine multiple loggers
//! - [`NullLogger`]: discard everything (tests)

pub mod logger;

pub use logger::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, NullLogger, TrainingSnapshot};
