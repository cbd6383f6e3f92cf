//! Sequencer transport state machine.

/// Playback state of a [`Sequencer`](crate::Sequencer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Playing => 1,
            Self::Paused => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Playing,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }

    /// Next state for `command`, or `None` when the command does not apply.
    pub fn transition(self, command: TransportCommand) -> Option<TransportState> {
        use TransportCommand::*;
        use TransportState::*;

        match (self, command) {
            (Stopped, Play) => Some(Playing),
            (Playing, Pause) => Some(Paused),
            (Paused, Resume) => Some(Playing),
            (_, Stop) => Some(Stopped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    Resume,
    Stop,
}
