//! Batch engine: subprocess execution and the run loop that drives it.
mod config;
mod controller;
mod error;
mod observer;
mod runner;

pub use config::ToolConfig;
pub use controller::{BatchController, BatchReport};
pub use error::BatchError;
pub use observer::{ChannelObserver, Observer};
pub use runner::{JobRunner, ProcessJobRunner, ProgressSink};
pub use tokio_util::sync::CancellationToken;
