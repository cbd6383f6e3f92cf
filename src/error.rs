//! Centralized error type for the tactus umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tactus_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] tactus_midi::ParseError),

    #[error("Batch: {0}")]
    Batch(#[from] tactus_midi::BatchError),
}

pub type Result<T> = std::result::Result<T, Error>;
