//! A cloneable handle for poking the agent from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for poking the agent from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap. Cancellation is
/// observed between steps, never in the middle of an LLM call or a tool.
#[derive(Clone)]
pub struct AgentHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) is_running: Arc<AtomicBool>,
}

impl AgentHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Abort the current task at the next step boundary.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Token for the current (or next) task
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Whether a task is currently running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Hand out the token for a new task, replacing a spent one
    pub(crate) fn begin(&self) -> CancellationToken {
        let mut token = self.cancel.lock();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        self.is_running.store(true, Ordering::Release);
        token.clone()
    }

    pub(crate) fn finish(&self) {
        self.is_running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_replaces_cancelled_token() {
        let handle = AgentHandle::new();
        let first = handle.begin();
        assert!(handle.is_running());

        handle.abort();
        assert!(first.is_cancelled());
        handle.finish();
        assert!(!handle.is_running());

        let second = handle.begin();
        assert!(!second.is_cancelled());
    }
}
