use std::io;

use batch_core::ControlError;
use thiserror::Error;

/// Failures reported synchronously by `BatchController::start`.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch has no items")]
    EmptyBatch,
    #[error("output directory is not set")]
    MissingOutputDir,
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error("failed to start run loop: {0}")]
    Runtime(#[from] io::Error),
}
