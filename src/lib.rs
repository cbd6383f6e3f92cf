//! # Tactus - Real-time MIDI Sequencing
//!
//! Plays multi-track MIDI performances against a sample-accurate clock.
//!
//! ## Architecture
//!
//! Tactus is an umbrella crate that coordinates:
//! - **tactus-midi** - Event model (channel messages, scheduled events, serialized batches)
//! - **tactus-core** - Master clock, lock-free event buffer, scheduler, per-track
//!   processors and the [`Sequencer`] that ties them together
//!
//! ## Quick Start
//!
//! ```
//! use tactus::prelude::*;
//!
//! # fn main() -> tactus::Result<()> {
//! let sequencer = Sequencer::builder()
//!     .sample_rate(48000.0)
//!     .buffer_size(256)
//!     .tempo(96.0)
//!     .build()?;
//!
//! let piano = CommandRecorder::new();
//! let track = sequencer.add_track(piano.clone())?;
//!
//! sequencer.schedule_event(MidiEvent::note_on(0, 60, 100), track, 0.0)?;
//! sequencer.schedule_event(MidiEvent::note_off(0, 60, 0), track, 1.0)?;
//! sequencer.start();
//!
//! // From the audio callback, once per buffer:
//! sequencer.render(256);
//! assert_eq!(piano.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Hosts without an audio callback can hand the sequencer to a
//! [`TimerDriver`], which renders on its own thread.

/// Re-export of tactus-core for direct access
pub use tactus_core as core;

/// Re-export of tactus-midi for direct access
pub use tactus_midi as midi;

pub use tactus_core::{
    // Backends
    BackendCommand,
    BackendError,
    // Clock
    ClockMetrics,
    CommandRecorder,
    DiagnosticSink,
    FrameCounter,
    HostTimeSource,
    MasterClock,
    MidiBackend,
    // Processing
    MidiProcessor,
    NullBackend,
    ProcessorStats,
    QueueBackend,
    RenderReport,
    SchedulerStats,
    // Sequencer
    Sequencer,
    SequencerBuilder,
    SequencerConfig,
    SequencerInfo,
    TimeSource,
    TimedCommand,
    TimerDriver,
    TracingSink,
    TrackState,
    TransportState,
};

pub use tactus_midi::{cc, EventBatch, MidiEvent, MidiEventType, SequencerEvent, TrackId};

mod error;

pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Sequencer, SequencerBuilder, SequencerConfig, TimerDriver, TransportState};

    pub use crate::{CommandRecorder, MidiBackend, NullBackend};

    pub use crate::{cc, EventBatch, MidiEvent, MidiEventType, TrackId};
}
