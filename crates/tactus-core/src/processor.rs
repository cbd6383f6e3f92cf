//! Per-track MIDI state and translation into backend commands.

use crate::backend::{BackendCommand, DiagnosticSink, MidiBackend};
use std::sync::Arc;
use tactus_midi::{cc, MidiEvent, MidiEventType, TrackId, MIDI_CHANNELS, PITCH_BEND_CENTER};

/// Set of sounding note numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteSet(u128);

impl NoteSet {
    #[inline]
    pub fn insert(&mut self, note: u8) -> bool {
        let bit = 1u128 << (note & 0x7F);
        let added = self.0 & bit == 0;
        self.0 |= bit;
        added
    }

    #[inline]
    pub fn remove(&mut self, note: u8) -> bool {
        let bit = 1u128 << (note & 0x7F);
        let removed = self.0 & bit != 0;
        self.0 &= !bit;
        removed
    }

    #[inline]
    pub fn contains(&self, note: u8) -> bool {
        note < 128 && self.0 & (1u128 << note) != 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Ascending note order.
    pub fn iter(&self) -> impl Iterator<Item = u8> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let note = bits.trailing_zeros() as u8;
            bits &= bits - 1;
            Some(note)
        })
    }
}

/// Last value seen per controller number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerBank {
    values: [u8; 128],
    assigned: u128,
}

impl Default for ControllerBank {
    fn default() -> Self {
        let mut bank = Self {
            values: [0; 128],
            assigned: 0,
        };
        bank.reset();
        bank
    }
}

impl ControllerBank {
    #[inline]
    pub fn get(&self, controller: u8) -> Option<u8> {
        let index = controller as usize;
        (index < 128 && self.assigned & (1u128 << index) != 0).then(|| self.values[index])
    }

    #[inline]
    pub fn set(&mut self, controller: u8, value: u8) {
        let index = (controller & 0x7F) as usize;
        self.values[index] = value;
        self.assigned |= 1u128 << index;
    }

    /// Forget every value and reinstate the defaults.
    pub fn reset(&mut self) {
        self.values = [0; 128];
        self.assigned = 0;
        for (controller, value) in cc::DEFAULTS {
            self.set(controller, value);
        }
    }

    /// Assigned controllers and their values, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        (0u8..128).filter_map(move |c| self.get(c).map(|v| (c, v)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackState {
    pub active_notes: NoteSet,
    pub controllers: ControllerBank,
    pub program: u8,
    pub pitch_bend: u16,
}

impl Default for TrackState {
    fn default() -> Self {
        Self {
            active_notes: NoteSet::default(),
            controllers: ControllerBank::default(),
            program: 0,
            pitch_bend: PITCH_BEND_CENTER,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub events_processed: u64,
    pub backend_failures: u64,
    /// Event types that carry no backend call.
    pub ignored: u64,
    pub active_notes: usize,
}

/// Owns one track's MIDI state and its backend. Lives on the render thread.
pub struct MidiProcessor {
    track_id: TrackId,
    state: TrackState,
    backend: Box<dyn MidiBackend>,
    sink: Arc<dyn DiagnosticSink>,
    events_processed: u64,
    backend_failures: u64,
    ignored: u64,
}

impl MidiProcessor {
    pub fn new(
        track_id: TrackId,
        backend: Box<dyn MidiBackend>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            track_id,
            state: TrackState::default(),
            backend,
            sink,
            events_processed: 0,
            backend_failures: 0,
            ignored: 0,
        }
    }

    #[inline]
    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    /// Handle `event` at the start of the current quantum.
    #[inline]
    pub fn process(&mut self, event: &MidiEvent) {
        self.process_at(0, event);
    }

    /// Handle `event`; every resulting backend call carries `sample_offset`.
    pub fn process_at(&mut self, sample_offset: u32, event: &MidiEvent) {
        self.events_processed += 1;
        let at = sample_offset;
        let channel = event.channel;
        match event.event_type {
            MidiEventType::NoteOn if event.data2 == 0 => self.note_off(at, channel, event.data1, 0),
            MidiEventType::NoteOn => self.note_on(at, channel, event.data1, event.data2),
            MidiEventType::NoteOff => self.note_off(at, channel, event.data1, event.data2),
            MidiEventType::ControlChange => {
                self.control_change(at, channel, event.data1, event.data2)
            }
            MidiEventType::ProgramChange => {
                self.state.program = event.data1;
                self.emit(
                    at,
                    BackendCommand::ProgramChange {
                        channel,
                        program: event.data1,
                    },
                );
            }
            MidiEventType::PitchBend => {
                let value = ((event.data2 as u16) << 7) | event.data1 as u16;
                self.state.pitch_bend = value;
                self.emit(at, BackendCommand::PitchBend { channel, value });
            }
            MidiEventType::PolyKeyPressure
            | MidiEventType::ChannelPressure
            | MidiEventType::SysEx => self.ignored += 1,
        }
    }

    pub fn process_all(&mut self, events: &[MidiEvent]) {
        for event in events {
            self.process(event);
        }
    }

    /// All Sound Off, All Notes Off and Reset All Controllers on every channel,
    /// at the start of the quantum.
    pub fn panic(&mut self) {
        for channel in 0..MIDI_CHANNELS {
            self.control_change(0, channel, cc::ALL_SOUND_OFF, 0);
            self.control_change(0, channel, cc::ALL_NOTES_OFF, 0);
            self.control_change(0, channel, cc::RESET_ALL_CONTROLLERS, 0);
        }
    }

    /// Back to initial state. Nothing is sent to the backend.
    pub fn reset(&mut self) {
        self.state = TrackState::default();
    }

    fn note_on(&mut self, at: u32, channel: u8, note: u8, velocity: u8) {
        self.state.active_notes.insert(note);
        self.emit(
            at,
            BackendCommand::NoteOn {
                channel,
                note,
                velocity,
            },
        );
    }

    fn note_off(&mut self, at: u32, channel: u8, note: u8, velocity: u8) {
        self.state.active_notes.remove(note);
        self.emit(
            at,
            BackendCommand::NoteOff {
                channel,
                note,
                velocity,
            },
        );
    }

    fn control_change(&mut self, at: u32, channel: u8, controller: u8, value: u8) {
        self.state.controllers.set(controller, value);

        match controller {
            cc::ALL_SOUND_OFF => self.state.active_notes.clear(),
            cc::RESET_ALL_CONTROLLERS => {
                self.state.controllers.reset();
                self.state.pitch_bend = PITCH_BEND_CENTER;
            }
            cc::ALL_NOTES_OFF => {
                let sounding = self.state.active_notes;
                for note in sounding.iter() {
                    self.emit(
                        at,
                        BackendCommand::NoteOff {
                            channel,
                            note,
                            velocity: 0,
                        },
                    );
                }
                self.state.active_notes.clear();
            }
            _ => {}
        }

        self.emit(
            at,
            BackendCommand::ControlChange {
                channel,
                controller,
                value,
            },
        );
    }

    #[inline]
    fn emit(&mut self, at: u32, command: BackendCommand) {
        if let Err(error) = command.send_to(at, self.backend.as_mut()) {
            self.backend_failures += 1;
            self.sink.backend_failure(self.track_id, command, &error);
        }
    }

    #[inline]
    pub fn active_notes(&self) -> NoteSet {
        self.state.active_notes
    }

    #[inline]
    pub fn is_note_active(&self, note: u8) -> bool {
        self.state.active_notes.contains(note)
    }

    #[inline]
    pub fn controller_value(&self, controller: u8) -> Option<u8> {
        self.state.controllers.get(controller)
    }

    #[inline]
    pub fn current_program(&self) -> u8 {
        self.state.program
    }

    #[inline]
    pub fn pitch_bend(&self) -> u16 {
        self.state.pitch_bend
    }

    #[inline]
    pub fn state(&self) -> &TrackState {
        &self.state
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            events_processed: self.events_processed,
            backend_failures: self.backend_failures,
            ignored: self.ignored,
            active_notes: self.state.active_notes.len(),
        }
    }
}

impl std::fmt::Debug for MidiProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiProcessor")
            .field("track_id", &self.track_id)
            .field("state", &self.state)
            .field("stats", &self.stats())
            .finish()
    }
}
