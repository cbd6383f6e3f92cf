//! Processing integration tests
//!
//! Track MIDI state and backend traffic as produced through the sequencer.

use crate::helpers::*;
use std::sync::Arc;
use tactus::prelude::*;
use tactus::{BackendCommand, BackendError};

/// NoteOn with velocity 0 releases the note exactly like NoteOff.
#[test]
fn test_zero_velocity_note_on_releases() {
    let (sequencer, track, recorder) = sequencer_with_track();
    sequencer
        .handle_events_now(
            track,
            &[
                MidiEvent::note_on(0, 60, 100),
                MidiEvent::note_on(0, 60, 0),
            ],
        )
        .unwrap();
    render_quantum(&sequencer);

    assert_eq!(
        sequencer.inspect_track(track, |p| p.is_note_active(60)),
        Some(false)
    );
    assert_eq!(
        recorder.commands()[1],
        BackendCommand::NoteOff {
            channel: 0,
            note: 60,
            velocity: 0
        }
    );
}

/// All Notes Off emits a NoteOff per sounding note and empties the set.
#[test]
fn test_all_notes_off() {
    let (sequencer, track, recorder) = sequencer_with_track();
    for (note, beat) in [(64, 0.0), (60, 0.0), (67, 0.0)] {
        sequencer
            .schedule_event(MidiEvent::note_on(0, note, 100), track, beat)
            .unwrap();
    }
    sequencer
        .schedule_event(
            MidiEvent::control_change(0, cc::ALL_NOTES_OFF, 0),
            track,
            0.5,
        )
        .unwrap();

    sequencer.start();
    render_quantum(&sequencer);
    assert_eq!(
        sequencer.inspect_track(track, |p| p.active_notes().len()),
        Some(3)
    );

    render_until(&sequencer, SAMPLES_PER_BEAT_120);
    assert_eq!(note_offs(&recorder), vec![60, 64, 67]);
    assert_eq!(
        sequencer.inspect_track(track, |p| p.active_notes().is_empty()),
        Some(true)
    );
}

/// Controller values persist and Reset All Controllers restores defaults.
#[test]
fn test_controller_state() {
    let (sequencer, track, _) = sequencer_with_track();
    sequencer
        .handle_events_now(
            track,
            &[
                MidiEvent::control_change(0, cc::VOLUME, 30),
                MidiEvent::control_change(0, cc::PAN, 0),
                MidiEvent::program_change(0, 12),
                MidiEvent::pitch_bend(0, 0),
            ],
        )
        .unwrap();
    render_quantum(&sequencer);

    let state = sequencer.inspect_track(track, |p| *p.state()).unwrap();
    assert_eq!(state.controllers.get(cc::VOLUME), Some(30));
    assert_eq!(state.controllers.get(cc::PAN), Some(0));
    assert_eq!(state.program, 12);
    assert_eq!(state.pitch_bend, 0);

    sequencer
        .handle_events_now(
            track,
            &[MidiEvent::control_change(0, cc::RESET_ALL_CONTROLLERS, 0)],
        )
        .unwrap();
    render_quantum(&sequencer);

    let state = sequencer.inspect_track(track, |p| *p.state()).unwrap();
    assert_eq!(state.controllers.get(cc::VOLUME), Some(100));
    assert_eq!(state.controllers.get(cc::PAN), Some(64));
    assert_eq!(state.pitch_bend, 8192);
    assert_eq!(state.program, 12);
}

/// Stop silences every track on every channel.
#[test]
fn test_stop_panics_all_tracks() {
    let sequencer = test_sequencer();
    let recorders: Vec<CommandRecorder> = (0..3).map(|_| CommandRecorder::new()).collect();
    let tracks: Vec<TrackId> = recorders
        .iter()
        .map(|r| sequencer.add_track(r.clone()).unwrap())
        .collect();

    sequencer.start();
    for &track in &tracks {
        sequencer
            .handle_events_now(track, &[MidiEvent::note_on(3, 50, 90)])
            .unwrap();
    }
    render_quantum(&sequencer);
    recorders.iter().for_each(|r| {
        r.take();
    });

    sequencer.stop();
    render_quantum(&sequencer);

    for (recorder, &track) in recorders.iter().zip(&tracks) {
        let commands = recorder.commands();
        assert_eq!(commands.len(), 16 * 3);
        assert!(commands
            .iter()
            .all(|c| matches!(c, BackendCommand::ControlChange { .. })));
        assert_eq!(
            sequencer.inspect_track(track, |p| p.active_notes().is_empty()),
            Some(true)
        );
    }
}

/// Backend failures reach the diagnostic sink and never change track state.
#[test]
fn test_backend_failures_reported() {
    let sink = Arc::new(CollectingSink::default());
    let sequencer = Sequencer::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .diagnostic_sink(sink.clone())
        .build()
        .unwrap();
    let track = sequencer
        .add_track(CommandRecorder::failing(BackendError::Rejected(-10851)))
        .unwrap();

    sequencer
        .handle_events_now(track, &[MidiEvent::note_on(1, 72, 100)])
        .unwrap();
    render_quantum(&sequencer);

    assert_eq!(
        sequencer.inspect_track(track, |p| p.is_note_active(72)),
        Some(true)
    );
    assert_eq!(
        sequencer.inspect_track(track, |p| p.stats().backend_failures),
        Some(1)
    );

    let failures = sink.failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, track);
    assert_eq!(failures[0].2, BackendError::Rejected(-10851));
}

/// Per-track sinks override the sequencer default.
#[test]
fn test_per_track_sink() {
    let default_sink = Arc::new(CollectingSink::default());
    let track_sink = Arc::new(CollectingSink::default());
    let sequencer = Sequencer::builder()
        .diagnostic_sink(default_sink.clone())
        .build()
        .unwrap();
    let track = sequencer
        .add_track_with_sink(
            CommandRecorder::failing(BackendError::Unavailable),
            track_sink.clone(),
        )
        .unwrap();

    sequencer
        .handle_events_now(track, &[MidiEvent::program_change(0, 1)])
        .unwrap();
    render_quantum(&sequencer);

    assert!(default_sink.failures.lock().is_empty());
    assert_eq!(track_sink.failures.lock().len(), 1);
}

/// Pressure and SysEx are accepted but produce no backend call.
#[test]
fn test_unsupported_messages_ignored() {
    let (sequencer, track, recorder) = sequencer_with_track();
    sequencer
        .handle_events_now(
            track,
            &[
                MidiEvent::channel_pressure(0, 40),
                MidiEvent::poly_key_pressure(0, 60, 40),
                MidiEvent::new(MidiEventType::SysEx, 0, 0, 0),
            ],
        )
        .unwrap();
    let report = render_quantum(&sequencer);

    assert_eq!(report.immediate, 3);
    assert!(recorder.is_empty());
    assert_eq!(
        sequencer.inspect_track(track, |p| p.stats().ignored),
        Some(3)
    );
}

/// Commands reach another thread through a queue backend.
#[test]
fn test_queue_backend_handoff() {
    let sequencer = test_sequencer();
    let (backend, mut receiver) = tactus::core::backend_queue();
    let track = sequencer.add_track(backend).unwrap();
    sequencer
        .schedule_event(MidiEvent::note_on(9, 36, 127), track, 0.0)
        .unwrap();
    sequencer.start();
    render_quantum(&sequencer);

    let consumer = std::thread::spawn(move || receiver.drain_all());
    let commands = consumer.join().unwrap();
    assert_eq!(
        commands,
        vec![tactus::TimedCommand {
            sample_offset: 0,
            command: BackendCommand::NoteOn {
                channel: 9,
                note: 36,
                velocity: 127
            }
        }]
    );
}
