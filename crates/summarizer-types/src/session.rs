//! Gateway session state holder.
//!
//! Replaces a bare "is ready" boolean poll with an explicit state value
//! behind a watch channel: writers flip the state, readers either query
//! it or await readiness once.

use std::sync::Arc;

use tokio::sync::watch;

use crate::errors::FetchError;

/// Lifecycle of the chat gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Connecting,
    Ready,
    Failed,
}

/// Cheaply cloneable handle to the shared session state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Uninitialized);
        Self { tx: Arc::new(tx) }
    }

    /// Record a state transition. Last write wins.
    pub fn set(&self, state: SessionState) {
        self.tx.send_replace(state);
    }

    /// Current state at the time of the call.
    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Resolve once the session reports ready.
    ///
    /// A `Failed` session will never become ready, so it resolves to
    /// `SessionNotReady` instead of hanging the caller.
    pub async fn wait_ready(&self) -> Result<(), FetchError> {
        let mut rx = self.tx.subscribe();
        loop {
            match *rx.borrow_and_update() {
                SessionState::Ready => return Ok(()),
                SessionState::Failed => return Err(FetchError::SessionNotReady),
                SessionState::Uninitialized | SessionState::Connecting => {}
            }
            if rx.changed().await.is_err() {
                return Err(FetchError::SessionNotReady);
            }
        }
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_uninitialized() {
        let h = SessionHandle::new();
        assert_eq!(h.current(), SessionState::Uninitialized);
    }

    #[test]
    fn test_set_updates_current() {
        let h = SessionHandle::new();
        h.set(SessionState::Connecting);
        assert_eq!(h.current(), SessionState::Connecting);
        h.set(SessionState::Ready);
        assert_eq!(h.current(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_immediately_when_ready() {
        let h = SessionHandle::new();
        h.set(SessionState::Ready);
        h.wait_ready().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_after_transition() {
        let h = SessionHandle::new();
        let waiter = h.clone();
        let task = tokio::spawn(async move { waiter.wait_ready().await });
        h.set(SessionState::Connecting);
        h.set(SessionState::Ready);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wait_ready_errors_on_failed_session() {
        let h = SessionHandle::new();
        h.set(SessionState::Failed);
        let err = h.wait_ready().await.unwrap_err();
        assert_eq!(err, FetchError::SessionNotReady);
    }
}
