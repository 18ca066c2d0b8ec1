//! Periodic flush timer.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::Duration;

/// A cancellable background task that calls `tick` every `interval`.
///
/// Dropping the handle cancels the task and joins its thread. A panicking
/// tick is logged and does not stop later ticks.
pub struct FlushTimer {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl FlushTimer {
    pub fn start<F>(interval: Duration, tick: F) -> Result<Self, std::io::Error>
    where
        F: Fn() + Send + 'static,
    {
        let (cancel, cancelled) = bounded::<()>(1);

        let handle = std::thread::Builder::new()
            .name("vakaru-flush-timer".to_string())
            .spawn(move || loop {
                match cancelled.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if panic::catch_unwind(AssertUnwindSafe(&tick)).is_err() {
                            tracing::error!("Flush timer tick panicked; timer keeps running");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            cancel: Some(cancel),
            handle: Some(handle),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the timer. A tick already in progress completes first.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
