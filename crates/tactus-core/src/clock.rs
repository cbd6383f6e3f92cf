//! Sample-accurate master clock.
//!
//! All timing is expressed in samples since the last [`MasterClock::start`].
//! Writers serialize on a small mutex and publish an immutable [`ClockState`]
//! through [`ArcSwap`], so readers on the render thread never lock and never
//! observe a half-applied update.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const MIN_TEMPO: f64 = 1.0;
pub const MAX_TEMPO: f64 = 300.0;
pub const DEFAULT_TEMPO: f64 = 120.0;
pub const DEFAULT_TICKS_PER_QUARTER: u32 = 96;

/// Source of "now", in samples.
pub trait TimeSource: Send + Sync {
    fn now_samples(&self) -> i64;
}

/// Monotonic host time converted at a fixed sample rate.
#[derive(Debug, Clone)]
pub struct HostTimeSource {
    origin: Instant,
    sample_rate: f64,
}

impl HostTimeSource {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            origin: Instant::now(),
            sample_rate,
        }
    }
}

impl TimeSource for HostTimeSource {
    #[inline]
    fn now_samples(&self) -> i64 {
        (self.origin.elapsed().as_secs_f64() * self.sample_rate) as i64
    }
}

/// Frame count of an audio stream, advanced by whoever renders it.
#[derive(Debug, Default)]
pub struct FrameCounter {
    frames: AtomicI64,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn advance(&self, frames: u32) {
        self.frames.fetch_add(frames as i64, Ordering::AcqRel);
    }

    #[inline]
    pub fn set(&self, frames: i64) {
        self.frames.store(frames, Ordering::Release);
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.frames.load(Ordering::Acquire)
    }
}

impl TimeSource for FrameCounter {
    #[inline]
    fn now_samples(&self) -> i64 {
        self.get()
    }
}

/// Published clock state.
///
/// Beat positions are measured from a tempo anchor: the `(sample, beat)` pair
/// captured at the last tempo change (or `(0, 0.0)` after start/stop). A tempo
/// change therefore never moves the current beat or the sample position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockState {
    pub running: bool,
    pub start_sample_time: i64,
    pub paused_sample_time: i64,
    pub tempo_bpm: f64,
    pub samples_per_beat: f64,
    pub samples_per_tick: f64,
    pub anchor_sample: i64,
    pub anchor_beat: f64,
}

impl ClockState {
    fn new(sample_rate: f64, tempo_bpm: f64, ticks_per_quarter: u32) -> Self {
        let samples_per_beat = samples_per_beat(sample_rate, tempo_bpm);
        Self {
            running: false,
            start_sample_time: 0,
            paused_sample_time: 0,
            tempo_bpm,
            samples_per_beat,
            samples_per_tick: samples_per_beat / ticks_per_quarter as f64,
            anchor_sample: 0,
            anchor_beat: 0.0,
        }
    }

    /// Playback position given the time source's `now`.
    #[inline]
    pub fn position_at(&self, now: i64) -> i64 {
        if self.running {
            now - self.start_sample_time
        } else {
            self.paused_sample_time
        }
    }

    #[inline]
    pub fn beat_at(&self, position: i64) -> f64 {
        self.anchor_beat + (position - self.anchor_sample) as f64 / self.samples_per_beat
    }

    #[inline]
    pub fn sample_for_beat(&self, beat: f64) -> i64 {
        self.anchor_sample + ((beat - self.anchor_beat) * self.samples_per_beat).round() as i64
    }
}

/// Point-in-time summary for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockMetrics {
    pub running: bool,
    pub tempo_bpm: f64,
    pub sample_position: i64,
    pub current_beat: f64,
    pub current_tick: i64,
    pub time_to_next_beat: f64,
}

#[inline]
fn samples_per_beat(sample_rate: f64, tempo_bpm: f64) -> f64 {
    60.0 / tempo_bpm * sample_rate
}

#[inline]
fn clamp_tempo(bpm: f64) -> f64 {
    if bpm.is_nan() {
        DEFAULT_TEMPO
    } else {
        bpm.clamp(MIN_TEMPO, MAX_TEMPO)
    }
}

pub struct MasterClock {
    source: Arc<dyn TimeSource>,
    sample_rate: f64,
    ticks_per_quarter: u32,
    writer: Mutex<()>,
    state: ArcSwap<ClockState>,
}

impl MasterClock {
    /// Clock driven by host time at 120 BPM, 96 ticks per quarter.
    pub fn new(sample_rate: f64) -> Self {
        Self::with_source(
            Arc::new(HostTimeSource::new(sample_rate)),
            sample_rate,
            DEFAULT_TEMPO,
            DEFAULT_TICKS_PER_QUARTER,
        )
    }

    pub fn with_source(
        source: Arc<dyn TimeSource>,
        sample_rate: f64,
        tempo_bpm: f64,
        ticks_per_quarter: u32,
    ) -> Self {
        let ticks_per_quarter = ticks_per_quarter.max(1);
        Self {
            source,
            sample_rate,
            ticks_per_quarter,
            writer: Mutex::new(()),
            state: ArcSwap::from_pointee(ClockState::new(
                sample_rate,
                clamp_tempo(tempo_bpm),
                ticks_per_quarter,
            )),
        }
    }

    fn update(&self, f: impl FnOnce(&mut ClockState, i64) -> bool) {
        let _guard = self.writer.lock();
        let mut next = **self.state.load();
        let now = self.source.now_samples();
        if f(&mut next, now) {
            self.state.store(Arc::new(next));
        }
    }

    /// Start from position zero. No-op while already running.
    pub fn start(&self) {
        self.update(|state, now| {
            if state.running {
                return false;
            }
            state.running = true;
            state.start_sample_time = now;
            state.paused_sample_time = 0;
            state.anchor_sample = 0;
            state.anchor_beat = 0.0;
            true
        });
    }

    /// Freeze the position. No-op unless running.
    pub fn pause(&self) {
        self.update(|state, now| {
            if !state.running {
                return false;
            }
            state.paused_sample_time = now - state.start_sample_time;
            state.running = false;
            true
        });
    }

    /// Continue from the frozen position. No-op while running.
    pub fn resume(&self) {
        self.update(|state, now| {
            if state.running {
                return false;
            }
            state.start_sample_time = now - state.paused_sample_time;
            state.running = true;
            true
        });
    }

    /// Halt and reset every position value to zero.
    pub fn stop(&self) {
        self.update(|state, _| {
            state.running = false;
            state.start_sample_time = 0;
            state.paused_sample_time = 0;
            state.anchor_sample = 0;
            state.anchor_beat = 0.0;
            true
        });
    }

    /// Change tempo, clamped to [`MIN_TEMPO`, `MAX_TEMPO`]. The current beat is preserved.
    pub fn set_tempo(&self, bpm: f64) {
        let tempo = clamp_tempo(bpm);
        if tempo != bpm {
            tracing::debug!("Tempo {} clamped to {}", bpm, tempo);
        }
        let sample_rate = self.sample_rate;
        let ticks = self.ticks_per_quarter as f64;
        self.update(|state, now| {
            let position = state.position_at(now);
            let beat = state.beat_at(position);
            state.anchor_sample = position;
            state.anchor_beat = beat;
            state.tempo_bpm = tempo;
            state.samples_per_beat = samples_per_beat(sample_rate, tempo);
            state.samples_per_tick = state.samples_per_beat / ticks;
            true
        });
    }

    /// Align with an external clock whose position is `external_position`
    /// right now. Offsets of a sample or less are left alone. Only applies
    /// while running. Returns the correction applied, in samples.
    pub fn sync_to_external(&self, external_position: i64) -> i64 {
        let mut correction = 0;
        self.update(|state, now| {
            if !state.running {
                return false;
            }
            let drift = state.position_at(now) - external_position;
            if drift.abs() <= 1 {
                return false;
            }
            state.start_sample_time += drift;
            correction = drift;
            true
        });
        correction
    }

    /// How far this clock is ahead of `reference_position`, in samples.
    #[inline]
    pub fn drift_from(&self, reference_position: i64) -> i64 {
        self.current_sample_position() - reference_position
    }

    #[inline]
    pub fn snapshot(&self) -> ClockState {
        **self.state.load()
    }

    #[inline]
    pub fn tempo(&self) -> f64 {
        self.state.load().tempo_bpm
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.load().running
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn ticks_per_quarter(&self) -> u32 {
        self.ticks_per_quarter
    }

    #[inline]
    pub fn samples_per_beat(&self) -> f64 {
        self.state.load().samples_per_beat
    }

    #[inline]
    pub fn samples_per_tick(&self) -> f64 {
        self.state.load().samples_per_tick
    }

    /// Samples since start, excluding time spent paused. Zero when stopped.
    #[inline]
    pub fn current_sample_position(&self) -> i64 {
        let state = self.state.load();
        state.position_at(self.source.now_samples())
    }

    #[inline]
    pub fn current_beat(&self) -> f64 {
        let state = self.state.load();
        state.beat_at(state.position_at(self.source.now_samples()))
    }

    #[inline]
    pub fn current_tick(&self) -> i64 {
        (self.current_beat() * self.ticks_per_quarter as f64).floor() as i64
    }

    /// Uses the current tempo and anchor. Events already scheduled keep the
    /// sample time computed when they were created.
    #[inline]
    pub fn beat_to_sample_position(&self, beat: f64) -> i64 {
        self.state.load().sample_for_beat(beat)
    }

    #[inline]
    pub fn sample_position_to_beat(&self, position: i64) -> f64 {
        self.state.load().beat_at(position)
    }

    /// Seconds until the next whole beat.
    pub fn time_to_next_beat(&self) -> f64 {
        let state = self.state.load();
        let beat = state.beat_at(state.position_at(self.source.now_samples()));
        let remaining = beat.floor() + 1.0 - beat;
        remaining * state.samples_per_beat / self.sample_rate
    }

    pub fn metrics(&self) -> ClockMetrics {
        let state = self.snapshot();
        let position = state.position_at(self.source.now_samples());
        let beat = state.beat_at(position);
        ClockMetrics {
            running: state.running,
            tempo_bpm: state.tempo_bpm,
            sample_position: position,
            current_beat: beat,
            current_tick: (beat * self.ticks_per_quarter as f64).floor() as i64,
            time_to_next_beat: (beat.floor() + 1.0 - beat) * state.samples_per_beat
                / self.sample_rate,
        }
    }
}

impl std::fmt::Debug for MasterClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterClock")
            .field("sample_rate", &self.sample_rate)
            .field("ticks_per_quarter", &self.ticks_per_quarter)
            .field("state", &self.snapshot())
            .finish()
    }
}
