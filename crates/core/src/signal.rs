//! Synchronization completion
//!
//! Flows that depend on reconciliation (e.g. navigating to an account page
//! after login) wait on a [`SyncTicket`] with a hard timeout. A ticket is
//! consumed by waiting, so a synchronization that finishes after the timeout
//! can never wake the same waiter a second time.

use std::time::Duration;

use tokio::sync::watch;

use crate::store::SyncResolution;

/// Observable synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStatus {
    /// Whether a synchronization is running.
    pub running: bool,

    /// Number of synchronizations that have finished.
    pub completed: u64,

    /// How the last synchronization ended.
    pub last: Option<SyncResolution>,
}

/// Result of waiting for synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncWait {
    /// Synchronization finished within the timeout.
    Completed(Option<SyncResolution>),

    /// The timeout elapsed first; the caller should proceed without it.
    TimedOut,
}

/// Broadcasts synchronization start and completion.
#[derive(Debug)]
pub struct SyncSignal {
    status: watch::Sender<SyncStatus>,
}

impl SyncSignal {
    /// A signal with no synchronization run yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: watch::Sender::new(SyncStatus::default()),
        }
    }

    /// Current state.
    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Whether a synchronization is running.
    pub fn is_running(&self) -> bool {
        self.status.borrow().running
    }

    /// Watch every state change.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// A single-use ticket that resolves on the next completion.
    pub fn ticket(&self) -> SyncTicket {
        let receiver = self.status.subscribe();
        let after = receiver.borrow().completed;

        SyncTicket { receiver, after }
    }

    /// Wait, at most `timeout`, until no synchronization is running.
    pub async fn wait_idle(&self, timeout: Duration) -> SyncWait {
        let mut receiver = self.status.subscribe();

        match tokio::time::timeout(timeout, receiver.wait_for(|status| !status.running)).await {
            Ok(Ok(status)) => SyncWait::Completed(status.last),
            Ok(Err(_)) | Err(_) => SyncWait::TimedOut,
        }
    }

    /// Mark a synchronization as started, unless one already is.
    pub(crate) fn begin(&self) -> Option<SyncRun<'_>> {
        let started = self.status.send_if_modified(|status| {
            if status.running {
                false
            } else {
                status.running = true;
                true
            }
        });

        started.then_some(SyncRun {
            signal: self,
            resolution: SyncResolution::Failed,
        })
    }

    fn finish(&self, resolution: SyncResolution) {
        self.status.send_modify(|status| {
            status.running = false;
            status.completed = status.completed.saturating_add(1);
            status.last = Some(resolution);
        });
    }
}

impl Default for SyncSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A running synchronization. Completion is emitted when it is dropped,
/// even if the synchronizing task is cancelled part way.
#[derive(Debug)]
pub(crate) struct SyncRun<'a> {
    signal: &'a SyncSignal,
    resolution: SyncResolution,
}

impl SyncRun<'_> {
    pub(crate) fn resolve(&mut self, resolution: SyncResolution) {
        self.resolution = resolution;
    }
}

impl Drop for SyncRun<'_> {
    fn drop(&mut self) {
        self.signal.finish(self.resolution);
    }
}

/// Waits for the next synchronization completion.
#[derive(Debug)]
pub struct SyncTicket {
    receiver: watch::Receiver<SyncStatus>,
    after: u64,
}

impl SyncTicket {
    /// Wait at most `timeout` for a synchronization to complete.
    pub async fn wait(mut self, timeout: Duration) -> SyncWait {
        let after = self.after;
        let completed = self
            .receiver
            .wait_for(|status| status.completed > after);

        match tokio::time::timeout(timeout, completed).await {
            Ok(Ok(status)) => SyncWait::Completed(status.last),
            Ok(Err(_)) | Err(_) => SyncWait::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_run_at_a_time() {
        let signal = SyncSignal::new();

        let run = signal.begin();

        assert!(run.is_some(), "first run should start");
        assert!(signal.begin().is_none(), "second run should be refused");
        assert!(signal.is_running());

        drop(run);

        assert_eq!(
            signal.status(),
            SyncStatus {
                running: false,
                completed: 1,
                last: Some(SyncResolution::Failed),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticket_resolves_on_completion() {
        let signal = SyncSignal::new();
        let ticket = signal.ticket();

        let mut run = signal.begin();
        if let Some(run) = run.as_mut() {
            run.resolve(SyncResolution::Attached);
        }
        drop(run);

        assert_eq!(
            ticket.wait(Duration::from_secs(2)).await,
            SyncWait::Completed(Some(SyncResolution::Attached))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticket_ignores_earlier_completions() {
        let signal = SyncSignal::new();

        drop(signal.begin());

        let ticket = signal.ticket();

        assert_eq!(ticket.wait(Duration::from_secs(2)).await, SyncWait::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_idle_returns_immediately_when_idle() {
        let signal = SyncSignal::new();

        assert_eq!(
            signal.wait_idle(Duration::from_secs(2)).await,
            SyncWait::Completed(None)
        );
    }
}
