//! Sequencer configuration.

use crate::{Error, Result};

/// Configuration for a [`Sequencer`](crate::Sequencer).
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    pub sample_rate: f64,
    /// Frames rendered per quantum. Also the timer driver's tick size.
    pub buffer_size: u32,
    /// Slots in the inbound event buffer.
    pub event_capacity: usize,
    /// Events the scheduler can hold waiting for their window.
    pub pending_capacity: usize,
    pub max_tracks: usize,
    pub ticks_per_quarter: u32,
    pub initial_tempo: f64,
    /// Slots in the control-to-render command queue (track changes,
    /// immediate events, panics).
    pub command_capacity: usize,
    /// Events up to this many frames behind their window still play, on the
    /// window's first frame.
    pub late_grace_frames: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            buffer_size: 256,
            event_capacity: 8192,
            pending_capacity: 8192,
            max_tracks: 128,
            ticks_per_quarter: 96,
            initial_tempo: 120.0,
            command_capacity: 1024,
            late_grace_frames: 1024,
        }
    }
}

impl SequencerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.buffer_size == 0 || self.buffer_size > 8192 {
            return Err(Error::InvalidConfig(format!(
                "buffer_size {} out of range (1-8192 frames)",
                self.buffer_size
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_capacity must be greater than zero".into(),
            ));
        }
        if self.pending_capacity == 0 {
            return Err(Error::InvalidConfig(
                "pending_capacity must be greater than zero".into(),
            ));
        }
        if self.command_capacity == 0 {
            return Err(Error::InvalidConfig(
                "command_capacity must be greater than zero".into(),
            ));
        }
        if self.max_tracks == 0 || self.max_tracks > 4096 {
            return Err(Error::InvalidConfig(format!(
                "max_tracks {} out of range (1-4096)",
                self.max_tracks
            )));
        }
        if self.ticks_per_quarter == 0 {
            return Err(Error::InvalidConfig(
                "ticks_per_quarter must be greater than zero".into(),
            ));
        }
        if !self.initial_tempo.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "initial_tempo {} is not a finite number",
                self.initial_tempo
            )));
        }
        Ok(())
    }

    /// Wall-clock length of one render quantum.
    pub fn quantum(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.buffer_size as f64 / self.sample_rate)
    }
}
