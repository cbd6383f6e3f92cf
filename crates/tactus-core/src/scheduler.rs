//! Time-ordered delivery of buffered events to render windows.

use crate::buffer::{EventConsumer, Stamp};
use crate::clock::MasterClock;
use crate::lockfree::{AtomicDouble, AtomicFlag};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tactus_midi::SequencerEvent;

pub const DEFAULT_PENDING_CAPACITY: usize = 8192;

/// How far behind a window an event may be and still play, at its start.
pub const DEFAULT_LATE_GRACE_FRAMES: u32 = 1024;

struct Pending {
    event: SequencerEvent,
    stamp: Stamp,
    seq: u64,
}

impl Pending {
    #[inline]
    fn key(&self) -> (i64, u64) {
        (self.event.sample_time, self.seq)
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub delivered: u64,
    /// Delivered events that were behind their window but within the grace.
    pub late_delivered: u64,
    /// Events further behind their window than the grace allows.
    pub late_dropped: u64,
    /// Events invalidated by a clear after they left the inbound buffer.
    pub stale_dropped: u64,
}

#[derive(Debug)]
struct SchedulerControl {
    running: AtomicFlag,
    paused: AtomicFlag,
    samples_per_tick: AtomicDouble,
}

/// Control-side handle to a scheduler living on the render thread.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    control: Arc<SchedulerControl>,
    clock: Arc<MasterClock>,
    tick_interval: Duration,
}

impl SchedulerHandle {
    pub fn start(&self) {
        self.control.paused.set(false);
        self.control.running.set(true);
    }

    /// Stop delivering. Pending events are kept.
    pub fn pause(&self) {
        if self.control.running.get() {
            self.control.paused.set(true);
        }
    }

    pub fn resume(&self) {
        if self.control.running.get() {
            self.control.paused.set(false);
        }
    }

    pub fn stop(&self) {
        self.control.running.set(false);
        self.control.paused.set(false);
    }

    /// Running and not paused.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.control.running.get() && !self.control.paused.get()
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.control.paused.get()
    }

    /// Forwards to the clock and refreshes the cached tick length.
    pub fn set_tempo(&self, bpm: f64) {
        self.clock.set_tempo(bpm);
        self.control
            .samples_per_tick
            .set(self.clock.samples_per_tick());
    }

    #[inline]
    pub fn samples_per_tick(&self) -> f64 {
        self.control.samples_per_tick.get()
    }

    /// Length of one processing quantum.
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn clock(&self) -> &Arc<MasterClock> {
        &self.clock
    }
}

/// Consumer side of the event buffer plus a time-ordered pending set.
///
/// Events are pulled from the inbound buffer into a pre-allocated heap keyed by
/// `(sample_time, arrival)`. Nothing is ever pushed back into the buffer.
/// After a clear the heap is swept, so invalidated events stop holding slots
/// as soon as the scheduler next runs.
pub struct EventScheduler {
    handle: SchedulerHandle,
    inbound: EventConsumer,
    pending: BinaryHeap<Reverse<Pending>>,
    pending_capacity: usize,
    late_grace: i64,
    seen_version: u64,
    next_seq: u64,
    stats: SchedulerStats,
}

impl EventScheduler {
    pub fn new(
        inbound: EventConsumer,
        clock: Arc<MasterClock>,
        pending_capacity: usize,
        tick_interval: Duration,
    ) -> Self {
        let pending_capacity = pending_capacity.max(1);
        let handle = SchedulerHandle {
            control: Arc::new(SchedulerControl {
                running: AtomicFlag::new(false),
                paused: AtomicFlag::new(false),
                samples_per_tick: AtomicDouble::new(clock.samples_per_tick()),
            }),
            clock,
            tick_interval,
        };
        Self {
            handle,
            inbound,
            pending: BinaryHeap::with_capacity(pending_capacity),
            pending_capacity,
            late_grace: 0,
            seen_version: 0,
            next_seq: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// Deliver events up to `frames` behind their window instead of dropping them.
    pub fn with_late_grace(mut self, frames: u32) -> Self {
        self.late_grace = frames as i64;
        self
    }

    #[inline]
    pub fn late_grace(&self) -> u32 {
        self.late_grace as u32
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn start(&self) {
        self.handle.start();
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.handle.set_tempo(bpm);
    }

    #[inline]
    pub fn samples_per_tick(&self) -> f64 {
        self.handle.samples_per_tick()
    }

    #[inline]
    pub fn tick_interval(&self) -> Duration {
        self.handle.tick_interval()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            stale_dropped: self.stats.stale_dropped + self.inbound.stale_skipped(),
            ..self.stats
        }
    }

    /// Drop everything buffered or pending.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.inbound.clear();
    }

    fn drain_inbound(&mut self) {
        while self.pending.len() < self.pending_capacity {
            let Some((event, stamp)) = self.inbound.read_stamped() else {
                break;
            };
            let seq = self.next_seq;
            self.next_seq += 1;
            self.pending.push(Reverse(Pending { event, stamp, seq }));
        }
    }

    /// Drop every pending event invalidated since the last sweep, then refill
    /// from the inbound buffer. Skipping stale inbound entries frees their
    /// slots for writers. Returns how many pending events were dropped.
    ///
    /// A no-op unless a clear happened since the last call.
    pub fn purge_stale(&mut self) -> usize {
        let version = self.inbound.generations().version();
        if version == self.seen_version {
            return 0;
        }
        self.seen_version = version;

        let generations = self.inbound.generations();
        let before = self.pending.len();
        self.pending
            .retain(|Reverse(p)| generations.is_current(p.stamp, &p.event));
        let purged = before - self.pending.len();
        self.stats.stale_dropped += purged as u64;

        self.drain_inbound();
        purged
    }

    /// Append every event due in `[start, end)` to `out`, ordered by sample
    /// time then arrival. Events up to the late grace before `start` are
    /// delivered too; older ones are dropped as late. Delivers nothing unless
    /// running, but still sweeps out cleared events.
    ///
    /// `out` does not grow past its capacity as long as that capacity is at
    /// least the pending capacity.
    pub fn poll_window(&mut self, start: i64, end: i64, out: &mut Vec<SequencerEvent>) -> usize {
        self.purge_stale();
        if !self.is_running() {
            return 0;
        }

        self.drain_inbound();

        let generations = self.inbound.generations();
        let mut delivered = 0;
        loop {
            match self.pending.peek() {
                Some(Reverse(next)) if next.event.sample_time < end => {}
                _ => break,
            }
            let Some(Reverse(next)) = self.pending.pop() else {
                break;
            };

            if !generations.is_current(next.stamp, &next.event) {
                self.stats.stale_dropped += 1;
                continue;
            }
            if next.event.sample_time < start {
                if start - next.event.sample_time > self.late_grace {
                    self.stats.late_dropped += 1;
                    continue;
                }
                self.stats.late_delivered += 1;
            }

            out.push(next.event);
            delivered += 1;
        }

        self.stats.delivered += delivered as u64;
        delivered
    }
}
