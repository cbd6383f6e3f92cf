//! Well-known controller numbers.

pub const MODULATION: u8 = 1;
pub const VOLUME: u8 = 7;
pub const PAN: u8 = 10;
pub const EXPRESSION: u8 = 11;
pub const SUSTAIN: u8 = 64;
pub const REVERB: u8 = 91;
pub const CHORUS: u8 = 93;

/// Channel mode: silence immediately, no release.
pub const ALL_SOUND_OFF: u8 = 120;
/// Channel mode: controllers back to defaults, pitch bend centered.
pub const RESET_ALL_CONTROLLERS: u8 = 121;
/// Channel mode: release every sounding note.
pub const ALL_NOTES_OFF: u8 = 123;

/// Controller values a freshly created track starts with.
pub const DEFAULTS: [(u8, u8); 7] = [
    (MODULATION, 0),
    (VOLUME, 100),
    (PAN, 64),
    (EXPRESSION, 127),
    (SUSTAIN, 0),
    (REVERB, 0),
    (CHORUS, 0),
];
