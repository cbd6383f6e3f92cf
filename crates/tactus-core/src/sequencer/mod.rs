//! The sequencer: transport, track registry and scheduling front end.
//!
//! Control operations take `&self` and may be called from any thread. The
//! render half lives behind its own mutex and is driven by [`Sequencer::render`],
//! either from an audio callback or from a [`TimerDriver`](crate::TimerDriver).
//! Control traffic reaches it through a bounded command channel drained at the
//! start of each render call.

mod builder;
mod registry;
mod renderer;

pub use builder::SequencerBuilder;
pub use renderer::RenderReport;

use crate::backend::{DiagnosticSink, MidiBackend, TracingSink};
use crate::buffer::{event_buffer, EventProducer, TrackGenerations};
use crate::clock::{FrameCounter, MasterClock};
use crate::config::SequencerConfig;
use crate::lockfree::AtomicFlag;
use crate::processor::MidiProcessor;
use crate::scheduler::{EventScheduler, SchedulerHandle, SchedulerStats};
use crate::transport::{TransportCommand, TransportState};
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use registry::TrackRegistry;
use renderer::{RenderCommand, RenderLinks, Renderer};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tactus_midi::{EventBatch, MidiEvent, SequencerEvent, TrackId};

/// Point-in-time summary of a sequencer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencerInfo {
    pub state: TransportState,
    pub tempo: f64,
    pub current_beat: f64,
    pub sample_position: i64,
    pub track_count: usize,
    /// Events waiting in the inbound buffer.
    pub buffered_events: usize,
    /// Free slots in the inbound buffer.
    pub available_events: usize,
    /// Events rejected because the inbound buffer was full.
    pub dropped_events: u64,
}

pub struct Sequencer {
    config: SequencerConfig,
    clock: Arc<MasterClock>,
    scheduler: SchedulerHandle,
    producer: Mutex<EventProducer>,
    generations: Arc<TrackGenerations>,
    tracks: Mutex<TrackRegistry>,
    state: AtomicU8,
    transport: Mutex<()>,
    commands: Sender<RenderCommand>,
    panic_requested: Arc<AtomicFlag>,
    retired: Receiver<Box<MidiProcessor>>,
    renderer: Mutex<Renderer>,
    sink: Arc<dyn DiagnosticSink>,
    epoch: Instant,
}

impl Sequencer {
    pub fn builder() -> SequencerBuilder {
        SequencerBuilder::default()
    }

    pub fn new(config: SequencerConfig) -> Result<Self> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// `sink` receives backend failures of every track added without its own sink.
    pub fn with_sink(config: SequencerConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        config.validate()?;

        let frames = Arc::new(FrameCounter::new());
        let clock = Arc::new(MasterClock::with_source(
            frames.clone(),
            config.sample_rate,
            config.initial_tempo,
            config.ticks_per_quarter,
        ));

        let (producer, consumer) = event_buffer(config.event_capacity, config.max_tracks);
        let generations = producer.generations().clone();
        let scheduler = EventScheduler::new(
            consumer,
            clock.clone(),
            config.pending_capacity,
            config.quantum(),
        )
        .with_late_grace(config.late_grace_frames);
        let handle = scheduler.handle();

        // Every processor the renderer retires was displaced by a queued
        // command, so this many slots always suffice.
        let (command_tx, command_rx) = bounded(config.command_capacity);
        let (retired_tx, retired_rx) = bounded(config.command_capacity + config.max_tracks);
        let panic_requested = Arc::new(AtomicFlag::new(false));
        let renderer = Renderer::new(
            scheduler,
            clock.clone(),
            frames,
            config.max_tracks,
            config.pending_capacity,
            RenderLinks {
                commands: command_rx,
                command_budget: config.command_capacity,
                retired: retired_tx,
                panic_requested: panic_requested.clone(),
            },
        );

        tracing::debug!(
            "Sequencer created: {} Hz, {} frames/quantum, {} tracks max, {} BPM",
            config.sample_rate,
            config.buffer_size,
            config.max_tracks,
            clock.tempo()
        );

        Ok(Self {
            tracks: Mutex::new(TrackRegistry::new(config.max_tracks)),
            config,
            clock,
            scheduler: handle,
            producer: Mutex::new(producer),
            generations,
            state: AtomicU8::new(TransportState::Stopped.to_u8()),
            transport: Mutex::new(()),
            commands: command_tx,
            panic_requested,
            retired: retired_rx,
            renderer: Mutex::new(renderer),
            sink,
            epoch: Instant::now(),
        })
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<MasterClock> {
        &self.clock
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    // Transport

    fn transition(&self, command: TransportCommand, apply: impl FnOnce(&Self)) -> bool {
        let _guard = self.transport.lock();
        let current = self.state();
        let Some(next) = current.transition(command) else {
            return false;
        };
        apply(self);
        self.state.store(next.to_u8(), Ordering::Release);
        tracing::debug!("Transport {:?} -> {:?}", current, next);
        true
    }

    /// Begin playback from beat zero. Only valid while stopped.
    pub fn start(&self) -> bool {
        // Scheduler runs whenever the clock does, so no window goes unpolled.
        self.transition(TransportCommand::Play, |s| {
            s.scheduler.start();
            s.clock.start();
        })
    }

    pub fn pause(&self) -> bool {
        self.transition(TransportCommand::Pause, |s| {
            s.clock.pause();
            s.scheduler.pause();
        })
    }

    pub fn resume(&self) -> bool {
        self.transition(TransportCommand::Resume, |s| {
            s.scheduler.resume();
            s.clock.resume();
        })
    }

    /// Halt, rewind to zero and silence every track. Scheduled events are kept.
    pub fn stop(&self) -> bool {
        self.transition(TransportCommand::Stop, |s| {
            s.scheduler.stop();
            s.clock.stop();
            if s.commands.try_send(RenderCommand::Panic).is_err() {
                s.panic_requested.set(true);
            }
        })
    }

    #[inline]
    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.scheduler.set_tempo(bpm);
        tracing::debug!("Tempo set to {} BPM", self.clock.tempo());
    }

    #[inline]
    pub fn tempo(&self) -> f64 {
        self.clock.tempo()
    }

    #[inline]
    pub fn current_beat(&self) -> f64 {
        self.clock.current_beat()
    }

    #[inline]
    pub fn current_sample_position(&self) -> i64 {
        self.clock.current_sample_position()
    }

    /// Align the playback position with an external clock currently at
    /// `external_position`. Returns the correction applied, in samples.
    pub fn sync_to_external(&self, external_position: i64) -> i64 {
        let correction = self.clock.sync_to_external(external_position);
        if correction != 0 {
            tracing::debug!("Clock corrected by {} samples", correction);
        }
        correction
    }

    /// How far the playback position is ahead of `reference_position`.
    #[inline]
    pub fn clock_drift(&self, reference_position: i64) -> i64 {
        self.clock.drift_from(reference_position)
    }

    // Tracks

    pub fn add_track(&self, backend: impl MidiBackend + 'static) -> Result<TrackId> {
        self.add_track_with_sink(backend, self.sink.clone())
    }

    pub fn add_track_with_sink(
        &self,
        backend: impl MidiBackend + 'static,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<TrackId> {
        self.reap_retired();

        let mut tracks = self.tracks.lock();
        let track = tracks
            .allocate()
            .ok_or(Error::TrackLimitReached(tracks.capacity()))?;

        // Anything still buffered for a previous owner of this id is stale.
        self.generations.invalidate_track(track);

        let processor = MidiProcessor::new(track, Box::new(backend), sink);
        if self
            .commands
            .try_send(RenderCommand::AddTrack(Box::new(processor)))
            .is_err()
        {
            tracks.release(track);
            return Err(Error::CommandQueueFull);
        }

        tracing::debug!("Added track {}", track);
        Ok(track)
    }

    /// Remove a track. Its pending events are discarded and its processor is
    /// dropped off the render thread.
    pub fn remove_track(&self, track: TrackId) -> Result<()> {
        self.reap_retired();

        {
            let mut tracks = self.tracks.lock();
            if !tracks.contains(track) {
                return Err(Error::UnknownTrack(track));
            }
            self.commands
                .try_send(RenderCommand::RemoveTrack(track))
                .map_err(|_| Error::CommandQueueFull)?;
            tracks.release(track);
        }
        self.generations.invalidate_track(track);
        self.sweep();

        tracing::debug!("Removed track {}", track);
        Ok(())
    }

    pub fn has_track(&self, track: TrackId) -> bool {
        self.tracks.lock().contains(track)
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.lock().ids()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.lock().len()
    }

    fn ensure_track(&self, track: TrackId) -> Result<()> {
        if self.has_track(track) {
            Ok(())
        } else {
            Err(Error::UnknownTrack(track))
        }
    }

    fn reap_retired(&self) {
        self.retired.try_iter().for_each(drop);
    }

    // Scheduling

    fn check_beat(beat: f64) -> Result<()> {
        if beat.is_finite() && beat >= 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidBeat(beat))
        }
    }

    #[inline]
    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Schedule `event` on `track` at `at_beat`.
    ///
    /// The sample time is fixed now, using the current tempo. Returns
    /// `Ok(false)` if the inbound buffer was full and the event was dropped.
    pub fn schedule_event(&self, event: MidiEvent, track: TrackId, at_beat: f64) -> Result<bool> {
        Self::check_beat(at_beat)?;
        self.ensure_track(track)?;

        let sample_time = self.clock.beat_to_sample_position(at_beat);
        let scheduled = SequencerEvent::new(track, event, at_beat, sample_time)
            .with_timestamp(self.now_nanos());
        Ok(self.producer.lock().write(scheduled))
    }

    /// Schedule several events at once, all converted with the same tempo.
    /// Nothing is written unless every entry is valid. Returns how many were
    /// accepted by the buffer.
    pub fn schedule_events(&self, events: &[(MidiEvent, TrackId, f64)]) -> Result<usize> {
        {
            let tracks = self.tracks.lock();
            for &(_, track, beat) in events {
                Self::check_beat(beat)?;
                if !tracks.contains(track) {
                    return Err(Error::UnknownTrack(track));
                }
            }
        }

        let clock = self.clock.snapshot();
        let timestamp = self.now_nanos();
        let mut producer = self.producer.lock();
        let mut accepted = 0;
        for &(event, track, beat) in events {
            let scheduled = SequencerEvent::new(track, event, beat, clock.sample_for_beat(beat))
                .with_timestamp(timestamp);
            if producer.write(scheduled) {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Schedule a decoded [`EventBatch`]. Sample times are recomputed from each
    /// event's beat at the current tempo; timestamps are kept.
    pub fn schedule_batch(&self, batch: &EventBatch) -> Result<usize> {
        batch.validate()?;
        {
            let tracks = self.tracks.lock();
            if let Some(unknown) = batch.events.iter().find(|e| !tracks.contains(e.track_id)) {
                return Err(Error::UnknownTrack(unknown.track_id));
            }
        }

        let clock = self.clock.snapshot();
        let mut producer = self.producer.lock();
        let mut accepted = 0;
        for event in &batch.events {
            let scheduled = SequencerEvent {
                sample_time: clock.sample_for_beat(event.beat),
                ..*event
            };
            if producer.write(scheduled) {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Deliver `events` to `track` at the start of the next render call,
    /// whatever the transport state.
    ///
    /// Fails with [`Error::CommandQueueFull`] at the first event that does not
    /// fit; the events before it are still delivered.
    pub fn handle_events_now(&self, track: TrackId, events: &[MidiEvent]) -> Result<()> {
        self.ensure_track(track)?;
        for &event in events {
            self.commands
                .try_send(RenderCommand::Immediate { track, event })
                .map_err(|_| Error::CommandQueueFull)?;
        }
        Ok(())
    }

    /// Discard scheduled events for one track, or for all tracks.
    pub fn clear_events(&self, track: Option<TrackId>) -> Result<()> {
        match track {
            Some(track) => {
                self.ensure_track(track)?;
                self.generations.invalidate_track(track);
            }
            None => self.generations.invalidate_all(),
        }
        self.sweep();
        Ok(())
    }

    /// Discard scheduled events at or after `from_beat`, for one track or all.
    /// The beat is converted at the current tempo.
    pub fn clear_events_from(&self, track: Option<TrackId>, from_beat: f64) -> Result<()> {
        Self::check_beat(from_beat)?;
        let from_sample = self.clock.beat_to_sample_position(from_beat);
        match track {
            Some(track) => {
                self.ensure_track(track)?;
                self.generations.invalidate_track_from(track, from_sample);
            }
            None => self.generations.invalidate_all_from(from_sample),
        }
        self.sweep();
        Ok(())
    }

    /// Discard a track's scheduled events and return its processor to its
    /// initial state. Unlike a stop, nothing is sent to the backend.
    pub fn reset_track(&self, track: TrackId) -> Result<()> {
        self.ensure_track(track)?;
        self.commands
            .try_send(RenderCommand::ResetTrack(track))
            .map_err(|_| Error::CommandQueueFull)?;
        self.generations.invalidate_track(track);
        self.sweep();
        Ok(())
    }

    /// Free inbound buffer slots.
    pub fn available_event_slots(&self) -> usize {
        self.producer.lock().available()
    }

    /// Drop cleared events from the pending set now if the render thread is
    /// idle, so their slots are free for the next write. Otherwise the next
    /// render does it.
    fn sweep(&self) {
        if let Some(mut renderer) = self.renderer.try_lock() {
            renderer.purge_stale();
        }
    }

    // Rendering

    /// Process one quantum of `frames` samples.
    ///
    /// Call from the audio callback or a [`TimerDriver`](crate::TimerDriver).
    /// Advances the sequencer's frame clock by `frames` whether or not it is
    /// playing.
    pub fn render(&self, frames: u32) -> RenderReport {
        self.renderer.lock().render(frames)
    }

    /// Run `f` against a track's processor as the render thread sees it.
    ///
    /// Returns `None` until a render call has picked the track up. Holds the
    /// render lock while `f` runs.
    pub fn inspect_track<R>(
        &self,
        track: TrackId,
        f: impl FnOnce(&MidiProcessor) -> R,
    ) -> Option<R> {
        self.renderer.lock().processor(track).map(f)
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.renderer.lock().scheduler_stats()
    }

    /// Events pulled from the buffer and waiting for their window.
    pub fn pending_count(&self) -> usize {
        self.renderer.lock().pending_count()
    }

    pub fn info(&self) -> SequencerInfo {
        let clock = self.clock.metrics();
        let (buffered_events, available_events, dropped_events) = {
            let producer = self.producer.lock();
            (producer.count(), producer.available(), producer.dropped())
        };
        SequencerInfo {
            state: self.state(),
            tempo: clock.tempo_bpm,
            current_beat: clock.current_beat,
            sample_position: clock.sample_position,
            track_count: self.track_count(),
            buffered_events,
            available_events,
            dropped_events,
        }
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
