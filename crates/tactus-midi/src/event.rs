//! Channel message value type.

use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Number of MIDI channels.
pub const MIDI_CHANNELS: u8 = 16;

/// Pitch bend rest position (14-bit).
pub const PITCH_BEND_CENTER: u16 = 8192;

/// Message kind, valued by its status nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MidiEventType {
    NoteOff = 0x80,
    NoteOn = 0x90,
    PolyKeyPressure = 0xA0,
    ControlChange = 0xB0,
    ProgramChange = 0xC0,
    ChannelPressure = 0xD0,
    PitchBend = 0xE0,
    SysEx = 0xF0,
}

impl MidiEventType {
    #[inline]
    pub fn status_nibble(self) -> u8 {
        self as u8
    }

    /// Classify a status byte. Data bytes (high bit clear) yield `None`.
    pub fn from_status(status: u8) -> Option<Self> {
        match status & 0xF0 {
            0x80 => Some(Self::NoteOff),
            0x90 => Some(Self::NoteOn),
            0xA0 => Some(Self::PolyKeyPressure),
            0xB0 => Some(Self::ControlChange),
            0xC0 => Some(Self::ProgramChange),
            0xD0 => Some(Self::ChannelPressure),
            0xE0 => Some(Self::PitchBend),
            0xF0 => Some(Self::SysEx),
            _ => None,
        }
    }
}

/// A single MIDI-style command.
///
/// Constructors mask the channel to 4 bits and data bytes to 7 bits, so every
/// value built through them is in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MidiEvent {
    pub event_type: MidiEventType,
    pub channel: u8,
    pub data1: u8,
    pub data2: u8,
    /// Ordering/debugging hint. Never used to decide when the event fires.
    pub timestamp: u64,
}

impl MidiEvent {
    #[inline]
    pub fn new(event_type: MidiEventType, channel: u8, data1: u8, data2: u8) -> Self {
        Self {
            event_type,
            channel: channel & 0x0F,
            data1: data1 & 0x7F,
            data2: data2 & 0x7F,
            timestamp: 0,
        }
    }

    #[inline]
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(MidiEventType::NoteOn, channel, note, velocity)
    }

    #[inline]
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(MidiEventType::NoteOff, channel, note, velocity)
    }

    #[inline]
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(MidiEventType::ControlChange, channel, controller, value)
    }

    #[inline]
    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new(MidiEventType::ProgramChange, channel, program, 0)
    }

    /// 14-bit bend, LSB in `data1`, MSB in `data2`.
    #[inline]
    pub fn pitch_bend(channel: u8, value: u16) -> Self {
        let value = value.min(0x3FFF);
        Self::new(
            MidiEventType::PitchBend,
            channel,
            (value & 0x7F) as u8,
            (value >> 7) as u8,
        )
    }

    #[inline]
    pub fn channel_pressure(channel: u8, pressure: u8) -> Self {
        Self::new(MidiEventType::ChannelPressure, channel, pressure, 0)
    }

    #[inline]
    pub fn poly_key_pressure(channel: u8, note: u8, pressure: u8) -> Self {
        Self::new(MidiEventType::PolyKeyPressure, channel, note, pressure)
    }

    #[inline]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[inline]
    pub fn status_byte(&self) -> u8 {
        self.event_type.status_nibble() | (self.channel & 0x0F)
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.event_type == MidiEventType::NoteOn && self.data2 > 0
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        match self.event_type {
            MidiEventType::NoteOff => true,
            MidiEventType::NoteOn => self.data2 == 0,
            _ => false,
        }
    }

    #[inline]
    pub fn note(&self) -> Option<u8> {
        match self.event_type {
            MidiEventType::NoteOn | MidiEventType::NoteOff | MidiEventType::PolyKeyPressure => {
                Some(self.data1)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn velocity(&self) -> Option<u8> {
        match self.event_type {
            MidiEventType::NoteOn | MidiEventType::NoteOff => Some(self.data2),
            _ => None,
        }
    }

    #[inline]
    pub fn pitch_bend_value(&self) -> Option<u16> {
        (self.event_type == MidiEventType::PitchBend)
            .then(|| ((self.data2 as u16) << 7) | self.data1 as u16)
    }

    /// Channel, data bytes within their MIDI ranges.
    pub fn is_in_range(&self) -> bool {
        self.channel < MIDI_CHANNELS && self.data1 < 0x80 && self.data2 < 0x80
    }

    /// Channel voice message for this event. `None` for [`MidiEventType::SysEx`].
    pub fn to_midi_msg(&self) -> Option<MidiMsg> {
        let msg = match self.event_type {
            MidiEventType::NoteOn => ChannelVoiceMsg::NoteOn {
                note: self.data1,
                velocity: self.data2,
            },
            MidiEventType::NoteOff => ChannelVoiceMsg::NoteOff {
                note: self.data1,
                velocity: self.data2,
            },
            MidiEventType::PolyKeyPressure => ChannelVoiceMsg::PolyPressure {
                note: self.data1,
                pressure: self.data2,
            },
            MidiEventType::ControlChange => ChannelVoiceMsg::ControlChange {
                control: ControlChange::CC {
                    control: self.data1,
                    value: self.data2,
                },
            },
            MidiEventType::ProgramChange => ChannelVoiceMsg::ProgramChange {
                program: self.data1,
            },
            MidiEventType::ChannelPressure => ChannelVoiceMsg::ChannelPressure {
                pressure: self.data1,
            },
            MidiEventType::PitchBend => ChannelVoiceMsg::PitchBend {
                bend: ((self.data2 as u16) << 7) | self.data1 as u16,
            },
            MidiEventType::SysEx => return None,
        };
        Some(MidiMsg::ChannelVoice {
            channel: Channel::from_u8(self.channel & 0x0F),
            msg,
        })
    }

    /// Wire form, 2 or 3 bytes depending on the message.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ParseError> {
        self.to_midi_msg()
            .map(|msg| msg.to_midi())
            .ok_or(ParseError::Unsupported(self.status_byte()))
    }

    /// Parse one channel message. Channel mode controllers (120-127) come back
    /// as ordinary control changes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let &status = bytes.first().ok_or(ParseError::Empty)?;
        let (msg, len) = MidiMsg::from_midi(bytes)?;

        match msg {
            MidiMsg::ChannelVoice { .. } | MidiMsg::ChannelMode { .. } => {
                let event_type = MidiEventType::from_status(status)
                    .ok_or(ParseError::Unsupported(status))?;
                let data = &bytes[1..len.min(3)];
                let data1 = data.first().copied().unwrap_or(0);
                let data2 = data.get(1).copied().unwrap_or(0);
                Ok(Self::new(event_type, status & 0x0F, data1, data2))
            }
            _ => Err(ParseError::Unsupported(status)),
        }
    }
}
