//! Sequencing kernel: a sample-accurate master clock, a lock-free event
//! buffer, a windowed event scheduler and per-track MIDI processors, tied
//! together by [`Sequencer`].
//!
//! ```
//! use tactus_core::{CommandRecorder, Sequencer};
//! use tactus_midi::MidiEvent;
//!
//! let seq = Sequencer::builder().sample_rate(44100.0).build().unwrap();
//! let recorder = CommandRecorder::new();
//! let track = seq.add_track(recorder.clone()).unwrap();
//!
//! seq.schedule_event(MidiEvent::note_on(0, 60, 100), track, 0.0).unwrap();
//! seq.start();
//! seq.render(256);
//! assert_eq!(recorder.len(), 1);
//! ```

pub mod backend;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod lockfree;
pub mod processor;
pub mod scheduler;
pub mod sequencer;
pub mod transport;

pub use backend::{
    backend_queue, backend_queue_with_capacity, BackendCommand, BackendCommandReceiver,
    BackendError, CommandRecorder, DiagnosticSink, MidiBackend, NullBackend, QueueBackend,
    TimedCommand, TracingSink,
};
pub use buffer::{event_buffer, EventConsumer, EventProducer, Stamp, TrackGenerations};
pub use clock::{ClockMetrics, ClockState, FrameCounter, HostTimeSource, MasterClock, TimeSource};
pub use config::SequencerConfig;
pub use driver::TimerDriver;
pub use error::{Error, Result};
pub use lockfree::{AtomicDouble, AtomicFlag};
pub use processor::{ControllerBank, MidiProcessor, NoteSet, ProcessorStats, TrackState};
pub use scheduler::{
    EventScheduler, SchedulerHandle, SchedulerStats, DEFAULT_LATE_GRACE_FRAMES,
};
pub use sequencer::{RenderReport, Sequencer, SequencerBuilder, SequencerInfo};
pub use transport::{TransportCommand, TransportState};

pub use tactus_midi;
