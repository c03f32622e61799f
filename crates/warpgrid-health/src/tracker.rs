//! Consecutive-failure tracking for a single webhook worker.
//!
//! The tracker is the pure half of a worker monitor: it turns a stream of
//! probe outcomes into status transitions, and the monitor performs the
//! side effects (persisting the active flag, logging) those transitions
//! call for.

use tracing::{debug, warn};

/// Consecutive failures tolerated before a worker is marked inactive.
/// The worker is deactivated on the failure that exceeds this count.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Observed health of a monitored worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerHealth {
    /// Last probe succeeded.
    Active,
    /// The last `n` probes failed, but not enough to deactivate.
    Degraded(u32),
    /// Failures exceeded the threshold; the worker is marked inactive.
    Inactive,
}

/// What a recorded probe outcome changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing worth acting on (steady success, or further failures
    /// while already inactive).
    Unchanged,
    /// A failure at or below the threshold.
    Degraded { failures: u32 },
    /// The failure that crossed the threshold. Reported exactly once per
    /// failure streak.
    Deactivated { failures: u32 },
    /// First success after one or more failures.
    Recovered { was_inactive: bool },
}

/// Tracks consecutive probe failures for one worker.
#[derive(Debug)]
pub struct FailureTracker {
    health: WorkerHealth,
    consecutive_failures: u32,
    threshold: u32,
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl FailureTracker {
    /// Create a tracker for a worker whose initial probe succeeded.
    pub fn new(threshold: u32) -> Self {
        Self {
            health: WorkerHealth::Active,
            consecutive_failures: 0,
            threshold,
        }
    }

    /// Record a successful probe.
    pub fn record_success(&mut self) -> Transition {
        if self.consecutive_failures == 0 {
            return Transition::Unchanged;
        }

        let was_inactive = self.health == WorkerHealth::Inactive;
        debug!(
            failures = self.consecutive_failures,
            was_inactive, "worker recovered"
        );
        self.consecutive_failures = 0;
        self.health = WorkerHealth::Active;
        Transition::Recovered { was_inactive }
    }

    /// Record a failed probe.
    pub fn record_failure(&mut self) -> Transition {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let failures = self.consecutive_failures;

        if failures <= self.threshold {
            self.health = WorkerHealth::Degraded(failures);
            return Transition::Degraded { failures };
        }

        if self.health == WorkerHealth::Inactive {
            return Transition::Unchanged;
        }

        warn!(
            failures,
            threshold = self.threshold,
            "worker exceeded failure threshold"
        );
        self.health = WorkerHealth::Inactive;
        Transition::Deactivated { failures }
    }

    pub fn health(&self) -> WorkerHealth {
        self.health
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_starts_active() {
        let tracker = FailureTracker::default();
        assert_eq!(tracker.health(), WorkerHealth::Active);
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.threshold(), 3);
    }

    #[test]
    fn success_while_active_is_unchanged() {
        let mut tracker = FailureTracker::default();
        assert_eq!(tracker.record_success(), Transition::Unchanged);
        assert_eq!(tracker.health(), WorkerHealth::Active);
    }

    #[test]
    fn failures_degrade_up_to_threshold() {
        let mut tracker = FailureTracker::default();
        for n in 1..=3 {
            assert_eq!(tracker.record_failure(), Transition::Degraded { failures: n });
            assert_eq!(tracker.health(), WorkerHealth::Degraded(n));
        }
    }

    #[test]
    fn fourth_failure_deactivates_exactly_once() {
        let mut tracker = FailureTracker::default();
        for _ in 0..3 {
            tracker.record_failure();
        }
        assert_eq!(
            tracker.record_failure(),
            Transition::Deactivated { failures: 4 }
        );
        assert_eq!(tracker.health(), WorkerHealth::Inactive);

        // Further failures keep counting but do not deactivate again.
        assert_eq!(tracker.record_failure(), Transition::Unchanged);
        assert_eq!(tracker.record_failure(), Transition::Unchanged);
        assert_eq!(tracker.consecutive_failures(), 6);
        assert_eq!(tracker.health(), WorkerHealth::Inactive);
    }

    #[test]
    fn recovery_from_degraded_resets_counter() {
        let mut tracker = FailureTracker::default();
        tracker.record_failure();
        tracker.record_failure();

        assert_eq!(
            tracker.record_success(),
            Transition::Recovered { was_inactive: false }
        );
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.health(), WorkerHealth::Active);
    }

    #[test]
    fn recovery_from_inactive_is_flagged() {
        let mut tracker = FailureTracker::default();
        for _ in 0..5 {
            tracker.record_failure();
        }
        assert_eq!(
            tracker.record_success(),
            Transition::Recovered { was_inactive: true }
        );
        assert_eq!(tracker.health(), WorkerHealth::Active);
    }

    #[test]
    fn new_streak_after_recovery_deactivates_again() {
        let mut tracker = FailureTracker::new(1);
        tracker.record_failure();
        assert_eq!(
            tracker.record_failure(),
            Transition::Deactivated { failures: 2 }
        );
        tracker.record_success();

        tracker.record_failure();
        assert_eq!(
            tracker.record_failure(),
            Transition::Deactivated { failures: 2 }
        );
    }

    #[test]
    fn zero_threshold_deactivates_on_first_failure() {
        let mut tracker = FailureTracker::new(0);
        assert_eq!(
            tracker.record_failure(),
            Transition::Deactivated { failures: 1 }
        );
    }
}
