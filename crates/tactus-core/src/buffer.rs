//! Lock-free SPSC event buffer between control threads and the scheduler.
//!
//! Entries carry the track and global clear generations read at write time.
//! A clear appends a sample floor to a short log and bumps the generation; the
//! consumer and the scheduler drop entries at or past the floor of any clear
//! newer than their stamp. Clears are wait-free for readers and safe from any
//! thread.

use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tactus_midi::{SequencerEvent, TrackId};

pub const DEFAULT_EVENT_CAPACITY: usize = 8192;

/// Range clears remembered per log. An entry that falls further behind than
/// this is treated as fully cleared.
pub const CLEAR_HISTORY: usize = 16;

/// Generation stamp captured when an event enters the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    global: u32,
    track: u32,
}

#[derive(Debug)]
struct ClearLog {
    generation: AtomicU32,
    floors: [AtomicI64; CLEAR_HISTORY],
}

impl ClearLog {
    fn new() -> Self {
        Self {
            generation: AtomicU32::new(0),
            floors: std::array::from_fn(|_| AtomicI64::new(i64::MIN)),
        }
    }

    #[inline]
    fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Callers serialize through `TrackGenerations::writer`.
    fn push(&self, floor: i64) {
        let next = self.generation.load(Ordering::Relaxed).wrapping_add(1);
        self.floors[next as usize % CLEAR_HISTORY].store(floor, Ordering::Release);
        self.generation.store(next, Ordering::Release);
    }

    /// Whether a clear newer than `stamp` reaches `sample_time`.
    fn clears(&self, stamp: u32, sample_time: i64) -> bool {
        let behind = self.generation().wrapping_sub(stamp);
        if behind == 0 {
            return false;
        }
        if behind as usize >= CLEAR_HISTORY {
            return true;
        }
        let hit = (1..=behind).any(|k| {
            let slot = stamp.wrapping_add(k) as usize % CLEAR_HISTORY;
            self.floors[slot].load(Ordering::Acquire) <= sample_time
        });
        // A writer lapping the log mid-scan may have replaced a floor we read.
        hit || self.generation().wrapping_sub(stamp) as usize >= CLEAR_HISTORY
    }
}

/// Invalidation logs shared by both ends of an event buffer.
#[derive(Debug)]
pub struct TrackGenerations {
    global: ClearLog,
    tracks: Box<[ClearLog]>,
    version: AtomicU64,
    writer: Mutex<()>,
}

impl TrackGenerations {
    pub fn new(max_tracks: usize) -> Self {
        Self {
            global: ClearLog::new(),
            tracks: (0..max_tracks).map(|_| ClearLog::new()).collect(),
            version: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    fn push(&self, log: &ClearLog, floor: i64) {
        let _guard = self.writer.lock();
        log.push(floor);
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Invalidate every event of `track` written so far.
    pub fn invalidate_track(&self, track: TrackId) {
        self.invalidate_track_from(track, i64::MIN);
    }

    /// Invalidate events of `track` written so far whose sample time is at or
    /// after `from_sample`.
    pub fn invalidate_track_from(&self, track: TrackId, from_sample: i64) {
        if let Some(log) = self.tracks.get(track as usize) {
            self.push(log, from_sample);
        }
    }

    /// Invalidate every event written so far.
    pub fn invalidate_all(&self) {
        self.invalidate_all_from(i64::MIN);
    }

    pub fn invalidate_all_from(&self, from_sample: i64) {
        self.push(&self.global, from_sample);
    }

    /// Bumped by every clear. Lets holders of stamped entries skip re-checking
    /// when nothing changed.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    #[inline]
    fn track_generation(&self, track: TrackId) -> u32 {
        self.tracks
            .get(track as usize)
            .map_or(0, ClearLog::generation)
    }

    #[inline]
    pub fn stamp(&self, track: TrackId) -> Stamp {
        Stamp {
            global: self.global.generation(),
            track: self.track_generation(track),
        }
    }

    /// Whether an event stamped with `stamp` survived every clear since.
    #[inline]
    pub fn is_current(&self, stamp: Stamp, event: &SequencerEvent) -> bool {
        let sample_time = event.sample_time;
        if self.global.clears(stamp.global, sample_time) {
            return false;
        }
        match self.tracks.get(event.track_id as usize) {
            Some(log) => !log.clears(stamp.track, sample_time),
            None => true,
        }
    }
}

struct Entry {
    event: SequencerEvent,
    stamp: Stamp,
}

/// Write side. Only one thread may write at a time.
pub struct EventProducer {
    producer: HeapProd<Entry>,
    generations: Arc<TrackGenerations>,
    capacity: usize,
    dropped: u64,
}

impl EventProducer {
    /// Returns `false` and drops the event when the buffer is full.
    #[inline]
    pub fn write(&mut self, event: SequencerEvent) -> bool {
        let stamp = self.generations.stamp(event.track_id);
        if self.producer.try_push(Entry { event, stamp }).is_ok() {
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    /// Events rejected because the buffer was full.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.producer.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.producer.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }

    /// Free slots left for writers.
    #[inline]
    pub fn available(&self) -> usize {
        self.producer.vacant_len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn generations(&self) -> &Arc<TrackGenerations> {
        &self.generations
    }
}

/// Read side, owned by the scheduler.
pub struct EventConsumer {
    consumer: HeapCons<Entry>,
    generations: Arc<TrackGenerations>,
    capacity: usize,
    stale: u64,
}

impl EventConsumer {
    /// Oldest live event, skipping anything invalidated by a clear.
    #[inline]
    pub fn read(&mut self) -> Option<SequencerEvent> {
        self.read_stamped().map(|(event, _)| event)
    }

    /// Like [`read`](Self::read), also returning the write-time stamp so the
    /// caller can re-check validity later.
    pub fn read_stamped(&mut self) -> Option<(SequencerEvent, Stamp)> {
        while let Some(entry) = self.consumer.try_pop() {
            if self.generations.is_current(entry.stamp, &entry.event) {
                return Some((entry.event, entry.stamp));
            }
            self.stale += 1;
        }
        None
    }

    /// Discard everything currently buffered.
    pub fn clear(&mut self) -> usize {
        let mut cleared = 0;
        while self.consumer.try_pop().is_some() {
            cleared += 1;
        }
        cleared
    }

    /// Entries skipped because they were invalidated.
    #[inline]
    pub fn stale_skipped(&self) -> u64 {
        self.stale
    }

    /// Buffered entries, including ones already invalidated but not yet skipped.
    #[inline]
    pub fn count(&self) -> usize {
        self.consumer.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.consumer.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn generations(&self) -> &Arc<TrackGenerations> {
        &self.generations
    }
}

/// Create a buffer holding up to `capacity` events for tracks `0..max_tracks`.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn event_buffer(capacity: usize, max_tracks: usize) -> (EventProducer, EventConsumer) {
    let (producer, consumer) = HeapRb::<Entry>::new(capacity).split();
    let generations = Arc::new(TrackGenerations::new(max_tracks));
    (
        EventProducer {
            producer,
            generations: generations.clone(),
            capacity,
            dropped: 0,
        },
        EventConsumer {
            consumer,
            generations,
            capacity,
            stale: 0,
        },
    )
}
