//! The ffq processor.
//!
//! Leases tasks from the `ffmpeg` queue, runs the full job pipeline
//! (admission, download, expand, execute, upload, record result), and
//! enqueues webhook notifications for completed commands.

pub mod config;
pub mod error;
pub mod executor;
pub mod processor;
pub mod resources;
pub mod workspace;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use processor::CommandProcessor;
