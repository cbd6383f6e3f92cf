//! # 01 - Arpeggio
//!
//! Schedule a looping C major arpeggio, let the timer driver play it and print
//! every command the backend receives.
//!
//! **Concepts:** Sequencer setup, scheduling by beat, timer driver, backends
//!
//! ```bash
//! cargo run --example 01_arpeggio
//! ```

use std::sync::Arc;
use std::time::Duration;
use tactus::prelude::*;

fn main() -> tactus::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let sequencer = Arc::new(Sequencer::builder().sample_rate(48000.0).tempo(132.0).build()?);

    let (backend, mut commands) = tactus::core::backend_queue();
    let track = sequencer.add_track(backend)?;

    for bar in 0..4 {
        for (step, note) in [60u8, 64, 67, 72].into_iter().enumerate() {
            let beat = (bar * 4 + step) as f64;
            sequencer.schedule_event(MidiEvent::note_on(0, note, 96), track, beat)?;
            sequencer.schedule_event(MidiEvent::note_off(0, note, 0), track, beat + 0.9)?;
        }
    }

    let driver = TimerDriver::spawn(sequencer.clone())?;
    sequencer.start();

    while sequencer.current_beat() < 16.0 {
        while let Some(timed) = commands.pop() {
            println!(
                "beat {:>6.2}  +{:<4} {:?}",
                sequencer.current_beat(),
                timed.sample_offset,
                timed.command
            );
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    sequencer.stop();
    driver.shutdown();
    Ok(())
}
