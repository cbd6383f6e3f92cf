//! Test helpers and fixtures for Tactus integration tests
//!
//! Sequencers here are driven by calling `render` by hand, so every test
//! controls exactly which sample windows are processed.

#![allow(dead_code)]


use parking_lot::Mutex;
use tactus::prelude::*;
use tactus::BackendCommand;

/// Default test sample rate
pub const TEST_SAMPLE_RATE: f64 = 44100.0;

/// Standard render quantum for deterministic testing
pub const TEST_BUFFER_SIZE: u32 = 256;

/// Samples per beat at 120 BPM and [`TEST_SAMPLE_RATE`].
pub const SAMPLES_PER_BEAT_120: i64 = 22050;

/// Create a sequencer with test defaults.
pub fn test_sequencer() -> Sequencer {
    Sequencer::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .buffer_size(TEST_BUFFER_SIZE)
        .build()
        .expect("Failed to create test sequencer")
}

/// Create a sequencer and one recording track.
pub fn sequencer_with_track() -> (Sequencer, TrackId, CommandRecorder) {
    let sequencer = test_sequencer();
    let recorder = CommandRecorder::new();
    let track = sequencer
        .add_track(recorder.clone())
        .expect("Failed to add track");
    (sequencer, track, recorder)
}

/// Render one quantum.
pub fn render_quantum(sequencer: &Sequencer) -> tactus::RenderReport {
    sequencer.render(TEST_BUFFER_SIZE)
}

/// Render quanta until the sample position reaches `position`.
/// Returns the number of scheduled events delivered along the way.
pub fn render_until(sequencer: &Sequencer, position: i64) -> usize {
    let mut delivered = 0;
    let mut guard = 0;
    while sequencer.current_sample_position() < position {
        delivered += render_quantum(sequencer).delivered;
        guard += 1;
        assert!(guard < 1_000_000, "sequencer is not advancing");
    }
    delivered
}

/// Notes of every NoteOn the recorder has seen, in order.
pub fn note_ons(recorder: &CommandRecorder) -> Vec<u8> {
    recorder
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            BackendCommand::NoteOn { note, .. } => Some(note),
            _ => None,
        })
        .collect()
}

/// Notes of every NoteOff the recorder has seen, in order.
pub fn note_offs(recorder: &CommandRecorder) -> Vec<u8> {
    recorder
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            BackendCommand::NoteOff { note, .. } => Some(note),
            _ => None,
        })
        .collect()
}

/// Install a tracing subscriber once, honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Collects backend failures for inspection.
#[derive(Default)]
pub struct CollectingSink {
    pub failures: Mutex<Vec<(TrackId, BackendCommand, tactus::BackendError)>>,
}

impl tactus::DiagnosticSink for CollectingSink {
    fn backend_failure(
        &self,
        track: TrackId,
        command: BackendCommand,
        error: &tactus::BackendError,
    ) {
        self.failures.lock().push((track, command, error.clone()));
    }
}
