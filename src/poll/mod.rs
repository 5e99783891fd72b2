use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::model::{ScanGroup, ScannedList};

/// Fixed delay between two status requests. There is no backoff.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Finished,
    Failed,
}

/// Anything a status request returns that says whether a scan is done.
pub trait PollStatus {
    fn poll_state(&self) -> PollState;
}

impl PollStatus for ScanGroup {
    fn poll_state(&self) -> PollState {
        if self.state.is_finished() {
            PollState::Finished
        } else if self.state.is_error() {
            PollState::Failed
        } else {
            PollState::Pending
        }
    }
}

/// A list's scan state is the state of its newest group.
impl PollStatus for Vec<ScanGroup> {
    fn poll_state(&self) -> PollState {
        self.last()
            .map(PollStatus::poll_state)
            .unwrap_or(PollState::Finished)
    }
}

impl PollStatus for ScannedList {
    fn poll_state(&self) -> PollState {
        if self.is_pending() {
            PollState::Pending
        } else {
            PollState::Finished
        }
    }
}

#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the handle cancels or every handle is dropped.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

/// Cancels every poll of one view when Ctrl-C is pressed.
///
/// Hand [`token`](Self::token) to each poll the view runs. The signal listener
/// stops when the guard is dropped.
pub struct Interrupt {
    handle: CancelHandle,
    token: CancelToken,
    listener: JoinHandle<()>,
}

impl Interrupt {
    pub fn on_ctrl_c() -> Self {
        let (handle, token) = cancel_pair();
        let listener = {
            let handle = handle.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.cancel();
                }
            })
        };
        Self {
            handle,
            token,
            listener,
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl Drop for Interrupt {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[derive(Clone, Debug)]
pub enum PollOutcome<T> {
    Finished(T),
    Failed(T),
    Cancelled,
}

/// Re-issues `fetch` every `interval` until the result is no longer pending.
/// Each pending result is handed to `on_pending`. Fetch errors end the poll.
pub async fn poll_until_finished<T, E, F, Fut, P>(
    mut fetch: F,
    interval: Duration,
    mut cancel: CancelToken,
    mut on_pending: P,
) -> Result<PollOutcome<T>, E>
where
    T: PollStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T),
{
    loop {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }
        let status = tokio::select! {
            res = fetch() => res?,
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
        };
        match status.poll_state() {
            PollState::Finished => return Ok(PollOutcome::Finished(status)),
            PollState::Failed => return Ok(PollOutcome::Failed(status)),
            PollState::Pending => on_pending(&status),
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
        }
    }
}
