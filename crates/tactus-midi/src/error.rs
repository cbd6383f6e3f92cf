//! Error types for MIDI parsing and batch decoding.

use thiserror::Error;

/// Raw MIDI byte parsing failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty MIDI message")]
    Empty,

    #[error("Malformed MIDI message: {0}")]
    Malformed(String),

    #[error("Message with status 0x{0:02X} cannot be carried as a channel event")]
    Unsupported(u8),
}

impl From<midi_msg::ParseError> for ParseError {
    fn from(e: midi_msg::ParseError) -> Self {
        ParseError::Malformed(format!("{e:?}"))
    }
}

/// Serialized event batch failure.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Batch encoding failed: {0}")]
    Encode(String),

    #[error("Batch decoding failed: {0}")]
    Decode(String),

    #[error("Event {index} out of range: {reason}")]
    OutOfRange { index: usize, reason: &'static str },
}

impl From<bincode::Error> for BatchError {
    fn from(e: bincode::Error) -> Self {
        BatchError::Decode(e.to_string())
    }
}
