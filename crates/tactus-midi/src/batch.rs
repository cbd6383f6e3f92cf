//! Serialized event batches for crossing a process or language boundary.

use serde::{Deserialize, Serialize};

use crate::error::BatchError;
use crate::scheduled::SequencerEvent;

/// An ordered list of scheduled events in wire form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub events: Vec<SequencerEvent>,
}

impl EventBatch {
    pub fn new(events: Vec<SequencerEvent>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, BatchError> {
        bincode::serialize(self).map_err(|e| BatchError::Encode(e.to_string()))
    }

    /// Decode and validate. Rejects events whose fields fall outside MIDI ranges
    /// or whose beat is not a finite, non-negative number.
    pub fn decode(bytes: &[u8]) -> Result<Self, BatchError> {
        let batch: EventBatch = bincode::deserialize(bytes)?;
        batch.validate()?;
        Ok(batch)
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        for (index, event) in self.events.iter().enumerate() {
            if !event.midi_event.is_in_range() {
                return Err(BatchError::OutOfRange {
                    index,
                    reason: "channel or data byte outside MIDI range",
                });
            }
            if !event.beat.is_finite() || event.beat < 0.0 {
                return Err(BatchError::OutOfRange {
                    index,
                    reason: "beat must be finite and non-negative",
                });
            }
        }
        Ok(())
    }
}

impl From<Vec<SequencerEvent>> for EventBatch {
    fn from(events: Vec<SequencerEvent>) -> Self {
        Self::new(events)
    }
}
