//! Post-convergence drift detection
//!
//! After the poller reports the desired state, the controller re-fetches
//! the resource and compares it with the snapshot taken before the
//! transition. A matching state string is not enough on its own: a
//! regressed progress counter means the remote side reset instead of
//! transitioning.

use std::fmt;

use converge_api::RemoteStatusSnapshot;

use crate::adapter::ResourceAdapter;

/// Evidence that convergence was not genuine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// The state flipped away again between the last check and verification
    StateReverted { expected: String, observed: String },

    /// A monotonic counter went backwards across the transition
    CounterRegressed {
        counter: &'static str,
        before: u64,
        after: u64,
    },
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drift::StateReverted { expected, observed } => {
                write!(f, "state reverted to {} after reaching {}", observed, expected)
            }
            Drift::CounterRegressed {
                counter,
                before,
                after,
            } => write!(f, "{} regressed from {} to {}", counter, before, after),
        }
    }
}

/// Compare the pre-transition and verification snapshots.
pub fn detect_drift(
    adapter: &dyn ResourceAdapter,
    desired: &str,
    before: &RemoteStatusSnapshot,
    after: &RemoteStatusSnapshot,
) -> Option<Drift> {
    if !after.is_in(desired) {
        return Some(Drift::StateReverted {
            expected: desired.to_string(),
            observed: after.state.clone(),
        });
    }

    // Kinds without a progress counter (jobs) only get the state check.
    let (counter, before_value) = adapter.progress_counter(before)?;
    let (_, after_value) = adapter.progress_counter(after)?;

    if after_value < before_value {
        return Some(Drift::CounterRegressed {
            counter,
            before: before_value,
            after: after_value,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{DatafeedAdapter, JobAdapter};

    #[test]
    fn test_counter_regression_is_drift() {
        let before = RemoteStatusSnapshot::new("df-1", "stopped").with_search_count(10);
        let after = RemoteStatusSnapshot::new("df-1", "started").with_search_count(8);

        let drift = detect_drift(&DatafeedAdapter, "started", &before, &after);
        assert_eq!(
            drift,
            Some(Drift::CounterRegressed {
                counter: "search_count",
                before: 10,
                after: 8
            })
        );
        assert_eq!(
            drift.unwrap().to_string(),
            "search_count regressed from 10 to 8"
        );
    }

    #[test]
    fn test_counter_progress_is_fine() {
        let before = RemoteStatusSnapshot::new("df-1", "stopped").with_search_count(10);
        let same = RemoteStatusSnapshot::new("df-1", "started").with_search_count(10);
        let more = RemoteStatusSnapshot::new("df-1", "started").with_search_count(15);

        assert_eq!(detect_drift(&DatafeedAdapter, "started", &before, &same), None);
        assert_eq!(detect_drift(&DatafeedAdapter, "started", &before, &more), None);
    }

    #[test]
    fn test_missing_counters_skip_counter_check() {
        let before = RemoteStatusSnapshot::new("df-1", "stopped");
        let after = RemoteStatusSnapshot::new("df-1", "started").with_search_count(0);

        assert_eq!(detect_drift(&DatafeedAdapter, "started", &before, &after), None);
    }

    #[test]
    fn test_reverted_state_is_drift() {
        let before = RemoteStatusSnapshot::new("job-1", "opened");
        let after = RemoteStatusSnapshot::new("job-1", "opened");

        let drift = detect_drift(&JobAdapter, "closed", &before, &after);
        assert!(matches!(drift, Some(Drift::StateReverted { .. })));
    }

    #[test]
    fn test_job_has_no_counter() {
        let before = RemoteStatusSnapshot::new("job-1", "opened").with_search_count(10);
        let after = RemoteStatusSnapshot::new("job-1", "closed").with_search_count(1);

        assert_eq!(detect_drift(&JobAdapter, "closed", &before, &after), None);
    }
}
