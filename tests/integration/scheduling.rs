//! Scheduling integration tests
//!
//! Beat-to-sample mapping, per-window delivery, ordering, clearing and
//! buffer overflow as seen through the sequencer.

use crate::helpers::*;
use tactus::prelude::*;
use tactus::core::Error;

/// Beats 0, 1, 2 at 120 BPM map to samples 0, 22050, 44100 and fire in
/// the windows containing those samples.
#[test]
fn test_three_beats_at_120_bpm() {
    let (sequencer, track, recorder) = sequencer_with_track();
    let clock = sequencer.clock();
    assert_eq!(clock.beat_to_sample_position(0.0), 0);
    assert_eq!(clock.beat_to_sample_position(1.0), SAMPLES_PER_BEAT_120);
    assert_eq!(clock.beat_to_sample_position(2.0), 2 * SAMPLES_PER_BEAT_120);

    for (note, beat) in [(60, 0.0), (64, 1.0), (67, 2.0)] {
        assert!(sequencer
            .schedule_event(MidiEvent::note_on(0, note, 100), track, beat)
            .unwrap());
    }
    sequencer.start();

    assert_eq!(render_quantum(&sequencer).delivered, 1);
    assert_eq!(note_ons(&recorder), vec![60]);
    assert_eq!(render_quantum(&sequencer).delivered, 0);
    assert_eq!(render_quantum(&sequencer).delivered, 0);

    // 22050 lies in [22016, 22272).
    render_until(&sequencer, 22016);
    assert_eq!(note_ons(&recorder), vec![60]);
    let report = render_quantum(&sequencer);
    assert_eq!(report.window_start, 22016);
    assert_eq!(report.delivered, 1);
    assert_eq!(note_ons(&recorder), vec![60, 64]);

    render_until(&sequencer, 2 * SAMPLES_PER_BEAT_120 + 1);
    assert_eq!(note_ons(&recorder), vec![60, 64, 67]);
}

/// Events on different tracks are delivered in sample order, ties in scheduling order.
#[test]
fn test_ordering_across_tracks() {
    let sequencer = test_sequencer();
    let shared = CommandRecorder::new();
    let a = sequencer.add_track(shared.clone()).unwrap();
    let b = sequencer.add_track(shared.clone()).unwrap();

    sequencer
        .schedule_event(MidiEvent::note_on(0, 72, 100), a, 0.5)
        .unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 48, 100), b, 0.25)
        .unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 50, 100), b, 0.5)
        .unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 36, 100), a, 0.0)
        .unwrap();

    sequencer.start();
    render_until(&sequencer, SAMPLES_PER_BEAT_120);
    assert_eq!(note_ons(&shared), vec![36, 48, 72, 50]);
}

/// Events scheduled behind the playhead are dropped, not played late.
#[test]
fn test_late_events_dropped() {
    let (sequencer, track, recorder) = sequencer_with_track();
    sequencer.start();
    render_until(&sequencer, SAMPLES_PER_BEAT_120);

    sequencer
        .schedule_event(MidiEvent::note_on(0, 60, 100), track, 0.5)
        .unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 62, 100), track, 2.0)
        .unwrap();
    render_until(&sequencer, 3 * SAMPLES_PER_BEAT_120);

    assert_eq!(note_ons(&recorder), vec![62]);
    assert_eq!(sequencer.scheduler_stats().late_dropped, 1);
}

/// A capacity-4 buffer given 5 writes holds the first 4.
#[test]
fn test_buffer_overflow_keeps_oldest() {
    let sequencer = Sequencer::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .event_capacity(4)
        .build()
        .unwrap();
    let recorder = CommandRecorder::new();
    let track = sequencer.add_track(recorder.clone()).unwrap();

    let accepted: Vec<bool> = (0..5u8)
        .map(|i| {
            sequencer
                .schedule_event(MidiEvent::note_on(0, 60 + i, 100), track, 0.0)
                .unwrap()
        })
        .collect();
    assert_eq!(accepted, vec![true, true, true, true, false]);

    let info = sequencer.info();
    assert_eq!(info.buffered_events, 4);
    assert_eq!(info.dropped_events, 1);

    sequencer.start();
    render_quantum(&sequencer);
    assert_eq!(note_ons(&recorder), vec![60, 61, 62, 63]);
}

/// Clearing one track leaves the others alone.
#[test]
fn test_clear_single_track() {
    let sequencer = test_sequencer();
    let keep = CommandRecorder::new();
    let discarded = CommandRecorder::new();
    let kept = sequencer.add_track(keep.clone()).unwrap();
    let cleared = sequencer.add_track(discarded.clone()).unwrap();

    for beat in [0.0, 0.5, 1.0] {
        sequencer
            .schedule_event(MidiEvent::note_on(0, 60, 100), kept, beat)
            .unwrap();
        sequencer
            .schedule_event(MidiEvent::note_on(0, 70, 100), cleared, beat)
            .unwrap();
    }

    sequencer.start();
    render_quantum(&sequencer);
    sequencer.clear_events(Some(cleared)).unwrap();
    render_until(&sequencer, 2 * SAMPLES_PER_BEAT_120);

    assert_eq!(note_ons(&keep), vec![60, 60, 60]);
    assert_eq!(note_ons(&discarded), vec![70]);
}

/// Clearing everything drops buffered and pending events; later events still play.
#[test]
fn test_clear_all_then_reschedule() {
    let (sequencer, track, recorder) = sequencer_with_track();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 60, 100), track, 1.0)
        .unwrap();
    sequencer.clear_events(None).unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 62, 100), track, 1.0)
        .unwrap();

    sequencer.start();
    render_until(&sequencer, 2 * SAMPLES_PER_BEAT_120);
    assert_eq!(note_ons(&recorder), vec![62]);
}

/// Events for unknown tracks are refused at the boundary.
#[test]
fn test_unknown_track() {
    let sequencer = test_sequencer();
    let result = sequencer.schedule_event(MidiEvent::note_on(0, 60, 100), 42, 0.0);
    assert!(matches!(result, Err(Error::UnknownTrack(42))));
    assert!(matches!(
        sequencer.clear_events(Some(42)),
        Err(Error::UnknownTrack(42))
    ));
}

/// A removed track's id is reused without inheriting its old events.
#[test]
fn test_track_id_reuse_discards_old_events() {
    let sequencer = test_sequencer();
    let first = CommandRecorder::new();
    let track = sequencer.add_track(first.clone()).unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 60, 100), track, 0.0)
        .unwrap();
    sequencer.remove_track(track).unwrap();

    let second = CommandRecorder::new();
    assert_eq!(sequencer.add_track(second.clone()).unwrap(), track);
    sequencer
        .schedule_event(MidiEvent::note_on(0, 61, 100), track, 0.0)
        .unwrap();

    sequencer.start();
    render_quantum(&sequencer);
    assert!(first.is_empty());
    assert_eq!(note_ons(&second), vec![61]);
}

/// Batch scheduling validates everything before writing anything.
#[test]
fn test_schedule_events_batch_call() {
    let (sequencer, track, recorder) = sequencer_with_track();
    let events = [
        (MidiEvent::note_on(0, 60, 100), track, 0.0),
        (MidiEvent::note_off(0, 60, 0), track, 0.5),
    ];
    assert_eq!(sequencer.schedule_events(&events).unwrap(), 2);

    let bad = [
        (MidiEvent::note_on(0, 62, 100), track, 0.0),
        (MidiEvent::note_on(0, 63, 100), track, -0.5),
    ];
    assert!(matches!(
        sequencer.schedule_events(&bad),
        Err(Error::InvalidBeat(_))
    ));

    sequencer.start();
    render_until(&sequencer, SAMPLES_PER_BEAT_120);
    assert_eq!(note_ons(&recorder), vec![60]);
    assert_eq!(note_offs(&recorder), vec![60]);
}

/// Pending events survive a pause and play after resume.
#[test]
fn test_pause_holds_pending_events() {
    let (sequencer, track, recorder) = sequencer_with_track();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 60, 100), track, 1.0)
        .unwrap();
    sequencer.start();
    render_until(&sequencer, 11_025);
    sequencer.pause();
    for _ in 0..200 {
        render_quantum(&sequencer);
    }
    assert!(recorder.is_empty());

    sequencer.resume();
    render_until(&sequencer, SAMPLES_PER_BEAT_120 + 256);
    assert_eq!(note_ons(&recorder), vec![60]);
}

/// Clearing a saturated sequencer makes room for new events straight away.
#[test]
fn test_clear_saturated_then_reschedule() {
    let sequencer = Sequencer::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .event_capacity(4)
        .pending_capacity(4)
        .build()
        .unwrap();
    let recorder = CommandRecorder::new();
    let track = sequencer.add_track(recorder.clone()).unwrap();
    sequencer.start();

    let far = MidiEvent::note_on(0, 40, 100);
    for _ in 0..4 {
        assert!(sequencer.schedule_event(far, track, 1000.0).unwrap());
    }
    render_quantum(&sequencer);
    for _ in 0..4 {
        assert!(sequencer.schedule_event(far, track, 1000.0).unwrap());
    }
    assert!(!sequencer.schedule_event(far, track, 1000.0).unwrap());
    assert_eq!(sequencer.pending_count(), 4);

    sequencer.clear_events(None).unwrap();
    assert_eq!(sequencer.pending_count(), 0);
    assert_eq!(sequencer.info().available_events, 4);
    assert!(sequencer
        .schedule_event(MidiEvent::note_on(0, 60, 100), track, 1.0)
        .unwrap());

    render_until(&sequencer, SAMPLES_PER_BEAT_120 + 256);
    assert_eq!(note_ons(&recorder), vec![60]);
    assert_eq!(sequencer.scheduler_stats().stale_dropped, 8);
}

/// A reused track id does not inherit events its previous owner already had
/// waiting in the scheduler.
#[test]
fn test_track_id_reuse_with_pending_events() {
    let sequencer = test_sequencer();
    let first = CommandRecorder::new();
    let track = sequencer.add_track(first.clone()).unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 60, 100), track, 1.0)
        .unwrap();
    sequencer.start();
    render_quantum(&sequencer);
    assert_eq!(sequencer.pending_count(), 1);

    sequencer.remove_track(track).unwrap();
    let second = CommandRecorder::new();
    assert_eq!(sequencer.add_track(second.clone()).unwrap(), track);
    sequencer
        .schedule_event(MidiEvent::note_on(0, 61, 100), track, 1.0)
        .unwrap();

    render_until(&sequencer, SAMPLES_PER_BEAT_120 + 256);
    assert!(first.is_empty());
    assert_eq!(note_ons(&second), vec![61]);
    assert_eq!(sequencer.scheduler_stats().delivered, 1);
}

/// A ranged clear keeps everything scheduled before the cut.
#[test]
fn test_clear_events_from_beat() {
    let sequencer = test_sequencer();
    let keep = CommandRecorder::new();
    let cut = CommandRecorder::new();
    let kept = sequencer.add_track(keep.clone()).unwrap();
    let trimmed = sequencer.add_track(cut.clone()).unwrap();
    for (i, beat) in [0.0, 1.0, 2.0, 3.0].into_iter().enumerate() {
        let event = MidiEvent::note_on(0, 60 + i as u8, 100);
        sequencer.schedule_event(event, kept, beat).unwrap();
        sequencer.schedule_event(event, trimmed, beat).unwrap();
    }

    sequencer.start();
    render_quantum(&sequencer);
    sequencer.clear_events_from(Some(trimmed), 2.0).unwrap();
    render_until(&sequencer, 4 * SAMPLES_PER_BEAT_120);

    assert_eq!(note_ons(&keep), vec![60, 61, 62, 63]);
    assert_eq!(note_ons(&cut), vec![60, 61]);
}

/// Each event reaches the backend at its frame within the render quantum.
#[test]
fn test_sample_offsets_within_quantum() {
    let (sequencer, track, recorder) = sequencer_with_track();
    // Beats 0.25 and 0.5 are samples 5512.5 (rounds to 5513) and 11025.
    sequencer
        .schedule_event(MidiEvent::note_on(0, 60, 100), track, 0.25)
        .unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 62, 100), track, 0.5)
        .unwrap();
    sequencer.start();
    render_until(&sequencer, SAMPLES_PER_BEAT_120);

    let offsets: Vec<u32> = recorder
        .timed_commands()
        .iter()
        .map(|c| c.sample_offset)
        .collect();
    assert_eq!(offsets, vec![5513 % 256, 11025 % 256]);
}

/// Resetting a track forgets its events and state without sending anything.
#[test]
fn test_reset_track() {
    let (sequencer, track, recorder) = sequencer_with_track();
    sequencer
        .handle_events_now(track, &[MidiEvent::program_change(0, 12)])
        .unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(0, 60, 100), track, 0.5)
        .unwrap();
    render_quantum(&sequencer);
    recorder.take();

    sequencer.reset_track(track).unwrap();
    sequencer.start();
    render_until(&sequencer, SAMPLES_PER_BEAT_120);

    assert!(recorder.is_empty());
    assert_eq!(sequencer.inspect_track(track, |p| p.current_program()), Some(0));
}
