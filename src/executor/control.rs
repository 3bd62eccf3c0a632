//! Cooperative pause/stop signalling between a running executor and the
//! outside world.
//!
//! The handle is cheap to clone; every clone talks to the same run. The
//! execution loop only looks at the flags at its checkpoints (before each
//! command and while waiting out a pause), so a command that has already
//! started always runs to completion.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

use crate::config::DEFAULT_PAUSE_POLL_MS;

#[derive(Debug)]
struct ControlInner {
    running: AtomicBool,
    paused: AtomicBool,
    cursor: AtomicUsize,
    total: AtomicUsize,
    wake: Notify,
    poll_interval_ms: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct ExecutionControl {
    inner: Arc<ControlInner>,
}

impl Default for ExecutionControl {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_PAUSE_POLL_MS))
    }
}

impl ExecutionControl {
    /// `poll_interval` bounds how long a paused loop sleeps between checks
    /// when no wake-up arrives.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(ControlInner {
                running: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                cursor: AtomicUsize::new(0),
                total: AtomicUsize::new(0),
                wake: Notify::new(),
                poll_interval_ms: AtomicU64::new(millis(poll_interval)),
            }),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.inner.poll_interval_ms.load(Ordering::SeqCst))
    }

    /// Changes the pause poll interval for every clone of this handle.
    pub fn set_poll_interval(&self, poll_interval: Duration) {
        self.inner
            .poll_interval_ms
            .store(millis(poll_interval), Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Raises the pause flag. Ignored unless a run is in progress.
    pub fn pause(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        if !self.inner.paused.swap(true, Ordering::SeqCst) {
            info!(cursor = self.cursor(), "execution paused");
        }
        true
    }

    /// Clears the pause flag. Ignored unless a run is in progress.
    pub fn resume(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        if self.inner.paused.swap(false, Ordering::SeqCst) {
            info!(cursor = self.cursor(), "execution resumed");
        }
        self.inner.wake.notify_one();
        true
    }

    /// Asks the run to end at its next checkpoint. Ignored unless a run is
    /// in progress.
    pub fn stop(&self) -> bool {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.inner.paused.store(false, Ordering::SeqCst);
        info!(cursor = self.cursor(), "execution stop requested");
        self.inner.wake.notify_one();
        true
    }

    /// `(cursor, total, running)`.
    pub fn progress(&self) -> (usize, usize, bool) {
        (
            self.cursor(),
            self.inner.total.load(Ordering::SeqCst),
            self.is_running(),
        )
    }

    pub fn cursor(&self) -> usize {
        self.inner.cursor.load(Ordering::SeqCst)
    }

    pub(crate) fn begin(&self, total: usize) {
        self.inner.total.store(total, Ordering::SeqCst);
        self.inner.cursor.store(0, Ordering::SeqCst);
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.running.store(true, Ordering::SeqCst);
    }

    pub(crate) fn finish(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    pub(crate) fn set_cursor(&self, cursor: usize) {
        self.inner.cursor.store(cursor, Ordering::SeqCst);
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.inner.total.store(total, Ordering::SeqCst);
    }

    /// Waits out a pause. Returns `false` once the run has been stopped.
    pub(crate) async fn checkpoint(&self) -> bool {
        loop {
            if !self.is_running() {
                return false;
            }
            if !self.is_paused() {
                return true;
            }
            // A missed wake-up only costs one poll interval.
            let _ = tokio::time::timeout(self.poll_interval(), self.inner.wake.notified()).await;
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_ignored_when_idle() {
        let control = ExecutionControl::default();
        assert!(!control.pause());
        assert!(!control.resume());
        assert!(!control.stop());
        assert!(!control.is_paused());
    }

    #[test]
    fn test_clones_share_state() {
        let control = ExecutionControl::default();
        let other = control.clone();
        control.begin(3);
        assert!(other.pause());
        assert!(control.is_paused());
        assert!(other.stop());
        assert!(!control.is_running());
        assert!(!control.is_paused());
    }

    #[test]
    fn test_poll_interval_change_reaches_clones() {
        let control = ExecutionControl::default();
        let other = control.clone();
        control.set_poll_interval(Duration::from_millis(7));
        assert_eq!(other.poll_interval(), Duration::from_millis(7));
    }

    #[tokio::test]
    async fn test_checkpoint_waits_for_resume() {
        let control = ExecutionControl::new(Duration::from_millis(5));
        control.begin(1);
        control.pause();

        let waiter = control.clone();
        let handle = tokio::spawn(async move { waiter.checkpoint().await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        control.resume();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_checkpoint_sees_stop_while_paused() {
        let control = ExecutionControl::new(Duration::from_millis(5));
        control.begin(1);
        control.pause();

        let waiter = control.clone();
        let handle = tokio::spawn(async move { waiter.checkpoint().await });

        control.stop();
        assert!(!handle.await.unwrap());
    }
}
