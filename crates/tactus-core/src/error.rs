//! Error types for tactus-core.

use tactus_midi::{BatchError, TrackId};
use thiserror::Error;

/// Error type for tactus-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),

    #[error("Track limit reached ({0} tracks)")]
    TrackLimitReached(usize),

    #[error("Render command queue is full")]
    CommandQueueFull,

    #[error("Invalid beat position: {0}. Must be finite and non-negative")]
    InvalidBeat(f64),

    #[error("Event batch: {0}")]
    Batch(#[from] BatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tactus-core operations.
pub type Result<T> = core::result::Result<T, Error>;
