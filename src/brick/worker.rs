//! Stoppable background threads
//!
//! Stop is cooperative: the flag is raised, the wake channel is dropped so a
//! sleeping worker returns immediately, and the caller joins the thread.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Worker-side view of the stop request
pub(crate) struct StopSignal {
    shutdown: Arc<AtomicBool>,
    wake: Receiver<()>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Sleep for `duration`; false once a stop was requested
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        match self.wake.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => !self.is_stopped(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// Owner-side handle of a named background thread
pub(crate) struct Worker {
    name: String,
    shutdown: Arc<AtomicBool>,
    wake: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = bounded(1);
        let signal = StopSignal {
            shutdown: Arc::clone(&shutdown),
            wake: wake_rx,
        };

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(signal))?;

        log::debug!("Started {} thread", name);
        Ok(Self {
            name: name.to_string(),
            shutdown,
            wake: Some(wake_tx),
            handle: Some(handle),
        })
    }

    /// Whether the thread has already returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Request stop and wait for the thread to exit
    ///
    /// Called from the worker thread itself this only raises the flag; the
    /// loop returns on its next check.
    pub fn stop(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Release);
        self.wake.take();

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if handle.thread().id() == thread::current().id() {
            log::debug!("{} thread stopping itself", self.name);
            return Ok(());
        }

        handle.join().map_err(|_| Error::ThreadPanic)?;
        log::debug!("Stopped {} thread", self.name);
        Ok(())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("{} thread: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_stop_wakes_sleeping_worker() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut worker = Worker::spawn("test-sleeper", move |signal| {
            while signal.wait(Duration::from_secs(60)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        let started = std::time::Instant::now();
        worker.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(worker.is_finished());
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut worker = Worker::spawn("test-idle", |signal| {
            while signal.wait(Duration::from_millis(1)) {}
        })
        .unwrap();
        worker.stop().unwrap();
        worker.stop().unwrap();
    }

    #[test]
    fn test_panicking_worker_reports_panic() {
        let mut worker = Worker::spawn("test-panic", |_signal| panic!("boom")).unwrap();
        assert!(matches!(worker.stop(), Err(Error::ThreadPanic)));
    }
}
