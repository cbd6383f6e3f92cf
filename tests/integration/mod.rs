//! Integration test modules for Tactus
//!
//! - transport: start/pause/resume/stop and tempo
//! - scheduling: beat-to-sample mapping, window delivery, clearing, overflow
//! - processing: per-track MIDI state through the sequencer
//! - batch: serialized batches from a foreign boundary
//! - driver: timer driver and multi-threaded producers

pub mod processing;
pub mod scheduling;
