//! Fluent construction of a [`Sequencer`].

use super::Sequencer;
use crate::backend::{DiagnosticSink, TracingSink};
use crate::config::SequencerConfig;
use crate::Result;
use std::sync::Arc;

/// Builder for [`Sequencer`]. Unset fields take [`SequencerConfig`] defaults.
#[derive(Default)]
pub struct SequencerBuilder {
    config: SequencerConfig,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl SequencerBuilder {
    /// Start from an existing configuration.
    pub fn config(mut self, config: SequencerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.config.sample_rate = rate;
        self
    }

    /// Frames per render quantum.
    pub fn buffer_size(mut self, frames: u32) -> Self {
        self.config.buffer_size = frames;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn pending_capacity(mut self, capacity: usize) -> Self {
        self.config.pending_capacity = capacity;
        self
    }

    pub fn max_tracks(mut self, count: usize) -> Self {
        self.config.max_tracks = count;
        self
    }

    pub fn ticks_per_quarter(mut self, ticks: u32) -> Self {
        self.config.ticks_per_quarter = ticks;
        self
    }

    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.config.command_capacity = capacity;
        self
    }

    /// Frames an event may trail its window and still play (0 drops every late event).
    pub fn late_grace_frames(mut self, frames: u32) -> Self {
        self.config.late_grace_frames = frames;
        self
    }

    /// Initial tempo in BPM (clamped to 1-300).
    pub fn tempo(mut self, bpm: f64) -> Self {
        self.config.initial_tempo = bpm;
        self
    }

    /// Default sink for backend failures (default: [`TracingSink`]).
    pub fn diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Sequencer> {
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        Sequencer::with_sink(self.config, sink)
    }
}
