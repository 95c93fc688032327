//! Shared state of one run.
//!
//! A [`RunHandle`] is the only state shared between the foreground caller
//! and the background supervisor. Every terminal transition goes through
//! the status lock, and the observer is notified while the lock is held, so
//! exactly one terminal event is emitted and events arrive in transition
//! order.

use crate::models::{RunEvent, RunId, RunStatus};
use crate::orchestrator::observer::RunObserver;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// One in-flight or completed run. Clones share state.
#[derive(Debug, Clone)]
pub struct RunHandle {
    inner: Arc<HandleState>,
}

#[derive(Debug)]
struct HandleState {
    id: RunId,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    cancel_requested: AtomicBool,
    finished: AtomicBool,
    status: Mutex<RunStatus>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

impl RunHandle {
    pub(crate) fn running(id: RunId, pid: Option<u32>, kill: oneshot::Sender<()>) -> Self {
        Self::with_status(id, pid, RunStatus::Running, Some(kill), false)
    }

    pub(crate) fn failed(id: RunId) -> Self {
        Self::with_status(id, None, RunStatus::Failed, None, true)
    }

    fn with_status(
        id: RunId,
        pid: Option<u32>,
        status: RunStatus,
        kill: Option<oneshot::Sender<()>>,
        finished: bool,
    ) -> Self {
        Self {
            inner: Arc::new(HandleState {
                id,
                pid,
                started_at: Utc::now(),
                cancel_requested: AtomicBool::new(false),
                finished: AtomicBool::new(finished),
                status: Mutex::new(status),
                kill: Mutex::new(kill),
            }),
        }
    }

    pub fn id(&self) -> RunId {
        self.inner.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn status(&self) -> RunStatus {
        *self.lock_status()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::SeqCst)
    }

    /// True once the run's whole pipeline is over.
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    fn lock_status(&self) -> MutexGuard<'_, RunStatus> {
        self.inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `Canceled` and signal the supervisor. Returns `false` (and
    /// does nothing) if the run is already terminal.
    pub(crate) fn request_cancel(&self, observer: &dyn RunObserver) -> bool {
        let mut status = self.lock_status();
        if status.is_terminal() {
            return false;
        }
        self.inner.cancel_requested.store(true, Ordering::SeqCst);
        *status = RunStatus::Canceled;
        observer.notify(RunEvent::StateChanged {
            run: self.id(),
            status: RunStatus::Canceled,
            exit_code: None,
        });
        drop(status);

        let kill = self
            .inner
            .kill
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = kill {
            // The supervisor may already be past its wait; that's fine.
            let _ = tx.send(());
        }
        true
    }

    /// Called once by the supervisor when the process has exited. The
    /// cancellation flag is checked here, under the status lock; returns
    /// `true` if the run moved to `to`.
    pub(crate) fn settle(
        &self,
        to: RunStatus,
        exit_code: Option<i32>,
        observer: &dyn RunObserver,
    ) -> bool {
        let mut status = self.lock_status();
        if self.is_cancel_requested() || *status != RunStatus::Running {
            return false;
        }
        *status = to;
        observer.notify(RunEvent::StateChanged {
            run: self.id(),
            status: to,
            exit_code,
        });
        true
    }

    pub(crate) fn mark_finished(&self) {
        self.inner.finished.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::observer::ChannelObserver;

    #[test]
    fn test_cancel_then_settle_is_single_terminal() {
        let (observer, mut rx) = ChannelObserver::new();
        let (tx, mut kill_rx) = oneshot::channel();
        let handle = RunHandle::running(RunId(1), Some(42), tx);

        assert!(handle.request_cancel(&observer));
        assert!(!handle.settle(RunStatus::Completed, Some(0), &observer));
        assert!(!handle.request_cancel(&observer));

        assert_eq!(handle.status(), RunStatus::Canceled);
        assert!(kill_rx.try_recv().is_ok());
        assert_eq!(
            rx.try_recv().unwrap(),
            RunEvent::StateChanged {
                run: RunId(1),
                status: RunStatus::Canceled,
                exit_code: None,
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_settle_then_cancel_is_noop() {
        let (observer, mut rx) = ChannelObserver::new();
        let (tx, _kill_rx) = oneshot::channel();
        let handle = RunHandle::running(RunId(2), None, tx);

        assert!(handle.settle(RunStatus::Completed, Some(0), &observer));
        assert!(!handle.request_cancel(&observer));
        assert!(!handle.is_cancel_requested());
        assert_eq!(handle.status(), RunStatus::Completed);

        assert!(matches!(
            rx.try_recv().unwrap(),
            RunEvent::StateChanged {
                status: RunStatus::Completed,
                exit_code: Some(0),
                ..
            }
        ));
        assert!(rx.try_recv().is_err());
    }
}
