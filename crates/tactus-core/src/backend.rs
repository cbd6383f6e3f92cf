//! The boundary between a track's processor and whatever makes sound.

use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::Arc;
use tactus_midi::TrackId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend rejected command (status {0})")]
    Rejected(i32),

    #[error("Backend command queue is full")]
    QueueFull,

    #[error("Backend unavailable")]
    Unavailable,
}

/// One call on a [`MidiBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCommand {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    PitchBend { channel: u8, value: u16 },
}

impl BackendCommand {
    pub fn channel(&self) -> u8 {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ProgramChange { channel, .. }
            | Self::PitchBend { channel, .. } => channel,
        }
    }

    #[inline]
    pub fn send_to(
        self,
        sample_offset: u32,
        backend: &mut dyn MidiBackend,
    ) -> Result<(), BackendError> {
        match self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => backend.note_on(sample_offset, channel, note, velocity),
            Self::NoteOff {
                channel,
                note,
                velocity,
            } => backend.note_off(sample_offset, channel, note, velocity),
            Self::ControlChange {
                channel,
                controller,
                value,
            } => backend.control_change(sample_offset, channel, controller, value),
            Self::ProgramChange { channel, program } => {
                backend.program_change(sample_offset, channel, program)
            }
            Self::PitchBend { channel, value } => backend.pitch_bend(sample_offset, channel, value),
        }
    }
}

/// A command and the frame it lands on within its render quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimedCommand {
    pub sample_offset: u32,
    pub command: BackendCommand,
}

/// Sound-producing target of one track.
///
/// Called on the render thread. Implementations must not block.
/// `sample_offset` is the frame within the current render quantum at which
/// the command takes effect.
pub trait MidiBackend: Send {
    fn note_on(
        &mut self,
        sample_offset: u32,
        channel: u8,
        note: u8,
        velocity: u8,
    ) -> Result<(), BackendError>;
    fn note_off(
        &mut self,
        sample_offset: u32,
        channel: u8,
        note: u8,
        velocity: u8,
    ) -> Result<(), BackendError>;
    fn control_change(
        &mut self,
        sample_offset: u32,
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Result<(), BackendError>;
    fn program_change(
        &mut self,
        sample_offset: u32,
        channel: u8,
        program: u8,
    ) -> Result<(), BackendError>;
    /// 14-bit value, 8192 is center.
    fn pitch_bend(&mut self, sample_offset: u32, channel: u8, value: u16)
        -> Result<(), BackendError>;
}

/// Receives backend failures. Called on the render thread.
pub trait DiagnosticSink: Send + Sync {
    fn backend_failure(&self, track: TrackId, command: BackendCommand, error: &BackendError);
}

/// Logs backend failures as warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn backend_failure(&self, track: TrackId, command: BackendCommand, error: &BackendError) {
        tracing::warn!("Track {} backend failed on {:?}: {}", track, command, error);
    }
}

/// Accepts and discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl MidiBackend for NullBackend {
    fn note_on(&mut self, _: u32, _: u8, _: u8, _: u8) -> Result<(), BackendError> {
        Ok(())
    }

    fn note_off(&mut self, _: u32, _: u8, _: u8, _: u8) -> Result<(), BackendError> {
        Ok(())
    }

    fn control_change(&mut self, _: u32, _: u8, _: u8, _: u8) -> Result<(), BackendError> {
        Ok(())
    }

    fn program_change(&mut self, _: u32, _: u8, _: u8) -> Result<(), BackendError> {
        Ok(())
    }

    fn pitch_bend(&mut self, _: u32, _: u8, _: u16) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Generates the [`MidiBackend`] methods of a type with a
/// `fn deliver(&mut self, TimedCommand) -> Result<(), BackendError>`.
macro_rules! deliver_backend_commands {
    ($ty:ty) => {
        impl MidiBackend for $ty {
            fn note_on(
                &mut self,
                sample_offset: u32,
                channel: u8,
                note: u8,
                velocity: u8,
            ) -> Result<(), BackendError> {
                self.deliver(TimedCommand {
                    sample_offset,
                    command: BackendCommand::NoteOn {
                        channel,
                        note,
                        velocity,
                    },
                })
            }

            fn note_off(
                &mut self,
                sample_offset: u32,
                channel: u8,
                note: u8,
                velocity: u8,
            ) -> Result<(), BackendError> {
                self.deliver(TimedCommand {
                    sample_offset,
                    command: BackendCommand::NoteOff {
                        channel,
                        note,
                        velocity,
                    },
                })
            }

            fn control_change(
                &mut self,
                sample_offset: u32,
                channel: u8,
                controller: u8,
                value: u8,
            ) -> Result<(), BackendError> {
                self.deliver(TimedCommand {
                    sample_offset,
                    command: BackendCommand::ControlChange {
                        channel,
                        controller,
                        value,
                    },
                })
            }

            fn program_change(
                &mut self,
                sample_offset: u32,
                channel: u8,
                program: u8,
            ) -> Result<(), BackendError> {
                self.deliver(TimedCommand {
                    sample_offset,
                    command: BackendCommand::ProgramChange { channel, program },
                })
            }

            fn pitch_bend(
                &mut self,
                sample_offset: u32,
                channel: u8,
                value: u16,
            ) -> Result<(), BackendError> {
                self.deliver(TimedCommand {
                    sample_offset,
                    command: BackendCommand::PitchBend { channel, value },
                })
            }
        }
    };
}

/// Records every command into shared storage.
///
/// Takes a lock per command, so it suits tests and offline rendering rather
/// than a live audio thread. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct CommandRecorder {
    commands: Arc<Mutex<Vec<TimedCommand>>>,
    fail_with: Option<BackendError>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records each command, then reports `error` for it.
    pub fn failing(error: BackendError) -> Self {
        Self {
            commands: Arc::default(),
            fail_with: Some(error),
        }
    }

    pub fn commands(&self) -> Vec<BackendCommand> {
        self.commands.lock().iter().map(|c| c.command).collect()
    }

    /// Commands with the frame offset each was delivered at.
    pub fn timed_commands(&self) -> Vec<TimedCommand> {
        self.commands.lock().clone()
    }

    /// Return and forget everything recorded so far.
    pub fn take(&self) -> Vec<BackendCommand> {
        std::mem::take(&mut *self.commands.lock())
            .into_iter()
            .map(|c| c.command)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    fn deliver(&mut self, command: TimedCommand) -> Result<(), BackendError> {
        self.commands.lock().push(command);
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

deliver_backend_commands!(CommandRecorder);

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Wait-free hand-off of commands to another thread.
pub struct QueueBackend {
    producer: HeapProd<TimedCommand>,
}

impl QueueBackend {
    #[inline]
    fn deliver(&mut self, command: TimedCommand) -> Result<(), BackendError> {
        self.producer
            .try_push(command)
            .map_err(|_| BackendError::QueueFull)
    }
}

deliver_backend_commands!(QueueBackend);

/// Receiving end of a [`QueueBackend`].
pub struct BackendCommandReceiver {
    consumer: HeapCons<TimedCommand>,
}

impl BackendCommandReceiver {
    #[inline]
    pub fn pop(&mut self) -> Option<TimedCommand> {
        self.consumer.try_pop()
    }

    pub fn drain_all(&mut self) -> Vec<TimedCommand> {
        let mut commands = Vec::with_capacity(self.consumer.occupied_len());
        while let Some(command) = self.consumer.try_pop() {
            commands.push(command);
        }
        commands
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.consumer.occupied_len()
    }
}

pub fn backend_queue() -> (QueueBackend, BackendCommandReceiver) {
    backend_queue_with_capacity(DEFAULT_QUEUE_CAPACITY)
}

pub fn backend_queue_with_capacity(capacity: usize) -> (QueueBackend, BackendCommandReceiver) {
    let (producer, consumer) = HeapRb::new(capacity.max(1)).split();
    (
        QueueBackend { producer },
        BackendCommandReceiver { consumer },
    )
}
