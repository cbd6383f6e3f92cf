//! Render-thread half of the sequencer.

use crate::clock::{FrameCounter, MasterClock};
use crate::lockfree::AtomicFlag;
use crate::processor::MidiProcessor;
use crate::scheduler::{EventScheduler, SchedulerStats};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use tactus_midi::{MidiEvent, SequencerEvent, TrackId};

pub(crate) enum RenderCommand {
    AddTrack(Box<MidiProcessor>),
    RemoveTrack(TrackId),
    /// Back to initial state without sending anything.
    ResetTrack(TrackId),
    Immediate { track: TrackId, event: MidiEvent },
    Panic,
}

/// What one [`render`](crate::Sequencer::render) call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Sample position the window started at. Zero when not playing.
    pub window_start: i64,
    pub frames: u32,
    pub playing: bool,
    /// Scheduled events handed to processors.
    pub delivered: usize,
    /// Events from `handle_events_now` handed to processors.
    pub immediate: usize,
    /// Due events whose track no longer exists.
    pub dropped_unknown_track: usize,
}

/// Channels and shared flags connecting the renderer to the control side.
pub(crate) struct RenderLinks {
    pub commands: Receiver<RenderCommand>,
    pub command_budget: usize,
    pub retired: Sender<Box<MidiProcessor>>,
    pub panic_requested: Arc<AtomicFlag>,
}

pub(crate) struct Renderer {
    scheduler: EventScheduler,
    clock: Arc<MasterClock>,
    frames: Arc<FrameCounter>,
    processors: Vec<Option<Box<MidiProcessor>>>,
    links: RenderLinks,
    /// Retired processors the control side has not made room for yet.
    stranded: Vec<Box<MidiProcessor>>,
    due: Vec<SequencerEvent>,
}

impl Renderer {
    pub fn new(
        scheduler: EventScheduler,
        clock: Arc<MasterClock>,
        frames: Arc<FrameCounter>,
        max_tracks: usize,
        pending_capacity: usize,
        links: RenderLinks,
    ) -> Self {
        Self {
            scheduler,
            clock,
            frames,
            processors: (0..max_tracks).map(|_| None).collect(),
            links,
            stranded: Vec::with_capacity(max_tracks),
            due: Vec::with_capacity(pending_capacity),
        }
    }

    pub fn render(&mut self, frames: u32) -> RenderReport {
        let mut report = RenderReport {
            frames,
            ..Default::default()
        };

        self.flush_stranded();
        self.apply_commands(&mut report);

        if self.scheduler.is_running() {
            let start = self.clock.current_sample_position();
            report.window_start = start;
            report.playing = true;

            self.due.clear();
            self.scheduler
                .poll_window(start, start + frames as i64, &mut self.due);

            let last_frame = frames.saturating_sub(1) as i64;
            for event in &self.due {
                match self
                    .processors
                    .get_mut(event.track_id as usize)
                    .and_then(Option::as_mut)
                {
                    Some(processor) => {
                        // Late events within the grace land on the first frame.
                        let offset = (event.sample_time - start).clamp(0, last_frame) as u32;
                        processor.process_at(offset, &event.midi_event);
                        report.delivered += 1;
                    }
                    None => report.dropped_unknown_track += 1,
                }
            }
        } else {
            self.scheduler.purge_stale();
        }

        self.frames.advance(frames);
        report
    }

    fn apply_commands(&mut self, report: &mut RenderReport) {
        for _ in 0..self.links.command_budget {
            let Ok(command) = self.links.commands.try_recv() else {
                break;
            };
            match command {
                RenderCommand::AddTrack(processor) => {
                    let index = processor.track_id() as usize;
                    if let Some(slot) = self.processors.get_mut(index) {
                        if let Some(previous) = slot.replace(processor) {
                            self.retire(previous);
                        }
                    }
                }
                RenderCommand::RemoveTrack(track) => {
                    if let Some(processor) = self
                        .processors
                        .get_mut(track as usize)
                        .and_then(Option::take)
                    {
                        self.retire(processor);
                    }
                }
                RenderCommand::ResetTrack(track) => {
                    if let Some(processor) = self.processor_mut(track) {
                        processor.reset();
                    }
                }
                RenderCommand::Immediate { track, event } => {
                    if let Some(processor) = self.processor_mut(track) {
                        processor.process(&event);
                        report.immediate += 1;
                    }
                }
                RenderCommand::Panic => self.panic_all(),
            }
        }

        if self.links.panic_requested.swap(false) {
            self.panic_all();
        }
    }

    fn panic_all(&mut self) {
        for processor in self.processors.iter_mut().flatten() {
            processor.panic();
        }
    }

    /// Hand a processor back for dropping on the control side. If the channel
    /// is full it waits in `stranded` for the next render.
    fn retire(&mut self, processor: Box<MidiProcessor>) {
        if let Err(err) = self.links.retired.try_send(processor) {
            self.stranded.push(err.into_inner());
        }
    }

    fn flush_stranded(&mut self) {
        while let Some(processor) = self.stranded.pop() {
            if let Err(err) = self.links.retired.try_send(processor) {
                self.stranded.push(err.into_inner());
                break;
            }
        }
    }

    /// Sweep events invalidated by a clear out of the pending set.
    pub fn purge_stale(&mut self) -> usize {
        self.scheduler.purge_stale()
    }

    fn processor_mut(&mut self, track: TrackId) -> Option<&mut MidiProcessor> {
        self.processors
            .get_mut(track as usize)
            .and_then(|slot| slot.as_deref_mut())
    }

    pub fn processor(&self, track: TrackId) -> Option<&MidiProcessor> {
        self.processors
            .get(track as usize)
            .and_then(|slot| slot.as_deref())
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.pending_count()
    }
}
