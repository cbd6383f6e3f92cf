//! Periodic render thread for hosts without an audio callback.

use crate::lockfree::AtomicFlag;
use crate::sequencer::Sequencer;
use crate::Result;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Calls [`Sequencer::render`] once per quantum on a dedicated thread.
///
/// The thread stops on [`shutdown`](Self::shutdown) or when the driver is dropped.
pub struct TimerDriver {
    shutdown: Arc<AtomicFlag>,
    thread: Option<JoinHandle<()>>,
}

impl TimerDriver {
    pub fn spawn(sequencer: Arc<Sequencer>) -> Result<Self> {
        let shutdown = Arc::new(AtomicFlag::new(false));
        let flag = shutdown.clone();
        let frames = sequencer.config().buffer_size;
        let interval = sequencer.scheduler().tick_interval();

        let thread = thread::Builder::new()
            .name("tactus-render".into())
            .spawn(move || {
                let mut deadline = Instant::now();
                while !flag.get() {
                    sequencer.render(frames);
                    deadline += interval;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        // Overran; don't try to catch up with a burst of renders.
                        deadline = now;
                    }
                }
            })?;

        tracing::info!(
            "Render driver started ({} frames every {:?})",
            frames,
            interval
        );

        Ok(Self {
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.set(true);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Render driver thread panicked");
            } else {
                tracing::info!("Render driver stopped");
            }
        }
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
