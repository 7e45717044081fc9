//! Cancellable execution context
//!
//! A `Context` carries an optional deadline and a handle on a cancellation
//! tree. It is threaded through every remote call and every wait so that a
//! single cancel (or an expired deadline) aborts the whole operation.
//!
//! - Cancelling a context cancels every context derived from it.
//! - A derived deadline never extends the parent's deadline.
//! - `sleep` blocks on a condition variable, so a cancel wakes it at once.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

/// Why a context is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The context was cancelled explicitly
    #[error("context canceled")]
    Cancelled,

    /// The context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Default)]
struct CancelToken {
    cancelled: Mutex<bool>,
    signal: Condvar,
    children: Mutex<Vec<Weak<CancelToken>>>,
}

impl CancelToken {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        *self.lock()
    }

    fn cancel(&self) {
        {
            let mut cancelled = self.lock();
            if *cancelled {
                return;
            }
            *cancelled = true;
            self.signal.notify_all();
        }

        let children = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    /// Create a child token. Holding our own lock while registering means a
    /// concurrent `cancel` either sees the child or the child starts cancelled.
    fn child(&self) -> Arc<CancelToken> {
        let child = Arc::new(CancelToken::default());
        let cancelled = self.lock();
        if *cancelled {
            *child.lock() = true;
        } else {
            let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        drop(cancelled);
        child
    }
}

/// Execution context with optional deadline and cooperative cancellation
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    token: Arc<CancelToken>,
}

impl Context {
    /// A root context: never cancelled, no deadline
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: Arc::new(CancelToken::default()),
        }
    }

    /// Derive a context that expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Derive a context that expires at `deadline` (or the parent's, if earlier)
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            deadline: Some(deadline),
            token: Arc::clone(&self.token),
        }
    }

    /// Derive a context that can be cancelled independently of its parent
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let token = self.token.child();
        let ctx = Self {
            deadline: self.deadline,
            token: Arc::clone(&token),
        };
        (ctx, CancelHandle { token })
    }

    /// The deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline (`None` if unbounded)
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Why the context is done, or `None` while it is still live.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns true once the context is cancelled or expired
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// `Err` if the context is done
    pub fn check(&self) -> Result<(), ContextError> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Block for `duration`, returning early with the context's error if it
    /// is cancelled or its deadline passes first.
    pub fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        let wake_at = Instant::now().checked_add(duration);
        let mut cancelled = self.token.lock();

        loop {
            if *cancelled {
                return Err(ContextError::Cancelled);
            }

            let now = Instant::now();
            if let Some(deadline) = self.deadline {
                if now >= deadline {
                    return Err(ContextError::DeadlineExceeded);
                }
            }
            if let Some(wake_at) = wake_at {
                if now >= wake_at {
                    return Ok(());
                }
            }

            let until = match (self.deadline, wake_at) {
                (Some(deadline), Some(wake_at)) => Some(deadline.min(wake_at)),
                (Some(deadline), None) => Some(deadline),
                (None, wake_at) => wake_at,
            };

            cancelled = match until {
                Some(until) => {
                    self.token
                        .signal
                        .wait_timeout(cancelled, until.saturating_duration_since(now))
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .token
                    .signal
                    .wait(cancelled)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

/// Cancels the context it was created with, and everything derived from it
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: Arc<CancelToken>,
}

impl CancelHandle {
    /// Cancel the context. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once `cancel` has been called (directly or via a parent)
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_background_is_live() {
        let ctx = Context::background();
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_timeout_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        assert!(!ctx.is_done());
        thread::sleep(Duration::from_millis(40));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_child_deadline_never_extends_parent() {
        let parent = Context::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn test_cancel_propagates_to_children() {
        let (parent, cancel) = Context::background().with_cancel();
        let (child, _child_cancel) = parent.with_cancel();
        let grandchild = child.with_timeout(Duration::from_secs(60));

        cancel.cancel();

        assert_eq!(parent.err(), Some(ContextError::Cancelled));
        assert_eq!(child.err(), Some(ContextError::Cancelled));
        assert_eq!(grandchild.err(), Some(ContextError::Cancelled));
    }

    #[test]
    fn test_child_cancel_leaves_parent_alive() {
        let (parent, _cancel) = Context::background().with_cancel();
        let (child, child_cancel) = parent.with_cancel();

        child_cancel.cancel();

        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[test]
    fn test_child_of_cancelled_parent_starts_cancelled() {
        let (parent, cancel) = Context::background().with_cancel();
        cancel.cancel();

        let (child, handle) = parent.with_cancel();
        assert_eq!(child.err(), Some(ContextError::Cancelled));
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_cancel_wins_over_deadline() {
        let (ctx, cancel) = Context::background().with_cancel();
        let ctx = ctx.with_timeout(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(5));
        cancel.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Cancelled));
    }

    #[test]
    fn test_sleep_completes() {
        let ctx = Context::background();
        let start = Instant::now();
        assert!(ctx.sleep(Duration::from_millis(20)).is_ok());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_stops_at_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(30));
        let start = Instant::now();
        let result = ctx.sleep(Duration::from_secs(10));
        assert_eq!(result, Err(ContextError::DeadlineExceeded));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_sleep_woken_by_cancel() {
        let (ctx, cancel) = Context::background().with_cancel();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            cancel.cancel();
        });

        let start = Instant::now();
        let result = ctx.sleep(Duration::from_secs(10));
        canceller.join().unwrap();

        assert_eq!(result, Err(ContextError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ContextError::Cancelled.to_string(), "context canceled");
        assert_eq!(
            ContextError::DeadlineExceeded.to_string(),
            "context deadline exceeded"
        );
    }
}
