//! Convergence poller
//!
//! Calls a state checker on a fixed cadence until it reports the desired
//! state, fails, or the context finishes. There is no attempt cap: the
//! only bound is the context deadline, which the caller sets.

use std::time::{Duration, Instant};

use converge_api::{ApiError, Context, ContextError, ResourceKind};

/// Interval between checks (default: 2s)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// "Is the resource in the desired state right now?"
///
/// Must only read remote state. Any closure of the right shape is a checker.
pub trait StateChecker {
    fn check(&mut self, ctx: &Context) -> Result<bool, ApiError>;
}

impl<F> StateChecker for F
where
    F: FnMut(&Context) -> Result<bool, ApiError>,
{
    fn check(&mut self, ctx: &Context) -> Result<bool, ApiError> {
        self(ctx)
    }
}

/// Poller errors
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The checker failed; never retried
    #[error("failed to check state of {kind} {id}: {source}")]
    Check {
        kind: ResourceKind,
        id: String,
        #[source]
        source: ApiError,
    },

    /// The context was cancelled or its deadline passed
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl PollError {
    /// The context error, if polling stopped because the context finished
    pub fn context_error(&self) -> Option<ContextError> {
        match self {
            PollError::Context(err) => Some(*err),
            PollError::Check { .. } => None,
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.context_error() == Some(ContextError::DeadlineExceeded)
    }

    pub fn is_cancelled(&self) -> bool {
        self.context_error() == Some(ContextError::Cancelled)
    }
}

/// Fixed-cadence poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `checker` reports the desired state.
    ///
    /// The first check happens one interval after the call.
    pub fn wait_for<C>(
        &self,
        ctx: &Context,
        kind: ResourceKind,
        id: &str,
        checker: &mut C,
    ) -> Result<(), PollError>
    where
        C: StateChecker + ?Sized,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            ctx.sleep(self.interval)?;
            attempt += 1;

            let reached = match checker.check(ctx) {
                Ok(reached) => reached,
                Err(ApiError::Context(err)) => return Err(PollError::Context(err)),
                Err(source) => {
                    return Err(PollError::Check {
                        kind,
                        id: id.to_string(),
                        source,
                    })
                }
            };

            if reached {
                tracing::debug!(
                    %kind,
                    id,
                    attempt,
                    elapsed = ?started.elapsed(),
                    "desired state reached"
                );
                return Ok(());
            }

            tracing::debug!(%kind, id, attempt, "waiting for desired state");
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn fast() -> Poller {
        Poller::new(Duration::from_millis(5))
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(Poller::default().interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_stops_on_first_true() {
        let mut answers: VecDeque<bool> = VecDeque::from(vec![false, false, true]);
        let mut calls = 0;
        let mut checker = |_: &Context| -> Result<bool, ApiError> {
            calls += 1;
            Ok(answers.pop_front().unwrap_or(false))
        };

        let result = fast().wait_for(&Context::background(), ResourceKind::Job, "job-1", &mut checker);

        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_checker_error_is_not_retried() {
        let mut calls = 0;
        let mut checker = |_: &Context| -> Result<bool, ApiError> {
            calls += 1;
            Err(ApiError::Unauthorized("bad credentials".to_string()))
        };

        let result = fast().wait_for(&Context::background(), ResourceKind::Datafeed, "df-1", &mut checker);

        assert_eq!(calls, 1);
        match result {
            Err(PollError::Check { kind, id, source }) => {
                assert_eq!(kind, ResourceKind::Datafeed);
                assert_eq!(id, "df-1");
                assert_eq!(source, ApiError::Unauthorized("bad credentials".to_string()));
            }
            other => panic!("expected check error, got {:?}", other),
        }
    }

    #[test]
    fn test_deadline_exceeded_is_unwrapped() {
        let ctx = Context::background().with_timeout(Duration::from_millis(40));
        let mut checker = |_: &Context| -> Result<bool, ApiError> { Ok(false) };

        let err = fast()
            .wait_for(&ctx, ResourceKind::Job, "job-1", &mut checker)
            .unwrap_err();

        assert!(err.is_deadline_exceeded());
        assert!(matches!(err, PollError::Context(ContextError::DeadlineExceeded)));
    }

    #[test]
    fn test_cancelled_before_first_check() {
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();

        let mut calls = 0;
        let mut checker = |_: &Context| -> Result<bool, ApiError> {
            calls += 1;
            Ok(true)
        };

        let err = fast()
            .wait_for(&ctx, ResourceKind::Job, "job-1", &mut checker)
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_interrupted_remote_call_reports_context_error() {
        let mut checker = |_: &Context| -> Result<bool, ApiError> {
            Err(ApiError::Context(ContextError::DeadlineExceeded))
        };

        let err = fast()
            .wait_for(&Context::background(), ResourceKind::Job, "job-1", &mut checker)
            .unwrap_err();

        assert!(err.is_deadline_exceeded());
    }

    #[test]
    fn test_struct_checker() {
        struct Countdown(u32);

        impl StateChecker for Countdown {
            fn check(&mut self, _ctx: &Context) -> Result<bool, ApiError> {
                self.0 = self.0.saturating_sub(1);
                Ok(self.0 == 0)
            }
        }

        let mut checker = Countdown(4);
        fast()
            .wait_for(&Context::background(), ResourceKind::Job, "job-1", &mut checker)
            .unwrap();
        assert_eq!(checker.0, 0);
    }
}
