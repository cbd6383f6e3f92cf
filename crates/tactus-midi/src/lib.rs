//! MIDI event model for the Tactus sequencing engine.
//!
//! Plain value types shared by every other Tactus crate:
//!
//! - [`MidiEvent`]: one channel message (status nibble, channel, two data bytes)
//! - [`SequencerEvent`]: a [`MidiEvent`] bound to a track and a musical position
//! - [`EventBatch`]: serialized form used to move events across a process boundary
//!
//! # Example
//!
//! ```
//! use tactus_midi::{MidiEvent, SequencerEvent};
//!
//! let on = MidiEvent::note_on(0, 60, 100);
//! assert!(on.is_note_on());
//!
//! let scheduled = SequencerEvent::new(1, on, 2.0, 44100);
//! assert_eq!(scheduled.track_id, 1);
//! ```

pub mod error;
pub use error::{BatchError, ParseError};

pub mod cc;

mod event;
pub use event::{MidiEvent, MidiEventType, MIDI_CHANNELS, PITCH_BEND_CENTER};

mod scheduled;
pub use scheduled::{SequencerEvent, TrackId};

mod batch;
pub use batch::EventBatch;

// Wire-level types behind `MidiEvent::to_midi_msg`
pub use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};
