use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// A spawned run-loop together with its stop signal
pub struct LoopHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl LoopHandle {
    pub fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(token.clone()));
        Self { token, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the loop and wait until it has exited
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                error!("Run-loop panicked: {}", e);
            }
        }
    }
}

#[derive(Default)]
struct SlotState {
    running: Option<LoopHandle>,
    closed: bool,
}

/// Holds the single run-loop of one entity.
///
/// Starting while a loop is alive is a no-op, and once closed the slot never
/// starts again, so a late start racing a delete cannot leak a loop.
#[derive(Default)]
pub struct LoopSlot {
    state: Mutex<SlotState>,
}

impl LoopSlot {
    /// Spawn `run` unless a loop is already alive; returns whether it spawned
    pub fn start<F, Fut>(&self, run: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed || state.running.as_ref().is_some_and(LoopHandle::is_running) {
            return false;
        }
        state.running = Some(LoopHandle::spawn(run));
        true
    }

    pub fn is_running(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.running.as_ref().is_some_and(LoopHandle::is_running)
    }

    /// Stop the current loop, if any; the slot may be started again
    pub async fn stop(&self) {
        let running = self.state.lock().unwrap_or_else(PoisonError::into_inner).running.take();
        if let Some(handle) = running {
            handle.stop().await;
        }
    }

    /// Stop the current loop and refuse any later start
    pub async fn close(&self) {
        let running = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.closed = true;
            state.running.take()
        };
        if let Some(handle) = running {
            handle.stop().await;
        }
    }

    /// Undo `close` after a delete that did not go through
    pub fn reopen(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).closed = false;
    }
}
