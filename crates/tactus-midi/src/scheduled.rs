//! Events bound to a track and a position on the timeline.

use serde::{Deserialize, Serialize};

use crate::event::MidiEvent;

/// Track identifier handed out by the sequencer.
pub type TrackId = u32;

/// A [`MidiEvent`] scheduled for one track.
///
/// `sample_time` is fixed when the event is created, using the tempo in effect
/// at that moment. Later tempo changes do not move it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequencerEvent {
    pub track_id: TrackId,
    pub midi_event: MidiEvent,
    pub beat: f64,
    pub sample_time: i64,
    pub timestamp: u64,
}

impl SequencerEvent {
    #[inline]
    pub fn new(track_id: TrackId, midi_event: MidiEvent, beat: f64, sample_time: i64) -> Self {
        Self {
            track_id,
            midi_event,
            beat,
            sample_time,
            timestamp: 0,
        }
    }

    #[inline]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}
