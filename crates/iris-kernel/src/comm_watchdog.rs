//! [`CommWatchdog`] – communication-failure timeout tracking.
//!
//! The polling framework reports when communication with an arm's
//! controller fails and when it recovers.  Before a command is dispatched to
//! an arm, the runtime asks the watchdog whether the failure has lasted
//! longer than the configured timeout; if so the arm is forced to `UNKNOWN`
//! instead of sending a command into the dark.

use std::collections::HashMap;
use std::time::{Duration, Instant};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Communication health of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommHealth {
    /// No failure is outstanding.
    Online,
    /// Communication failed, but within the timeout.
    Failing,
    /// Communication has been down longer than the timeout.
    TimedOut,
}

// ────────────────────────────────────────────────────────────────────────────
// CommWatchdog
// ────────────────────────────────────────────────────────────────────────────

/// Tracks when each device's communication link failed.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use iris_kernel::comm_watchdog::{CommHealth, CommWatchdog};
///
/// let mut wd = CommWatchdog::new(Duration::from_secs(30));
/// let t0 = Instant::now();
/// wd.fail("ga_1", t0);
///
/// assert_eq!(wd.health("ga_1", t0 + Duration::from_secs(5)), CommHealth::Failing);
/// assert_eq!(wd.health("ga_1", t0 + Duration::from_secs(31)), CommHealth::TimedOut);
/// ```
#[derive(Debug)]
pub struct CommWatchdog {
    timeout: Duration,
    failed_since: HashMap<String, Instant>,
}

impl CommWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            failed_since: HashMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a communication failure at `at`.
    ///
    /// Repeated failures keep the earliest timestamp so the outage duration
    /// is measured from its start.
    pub fn fail(&mut self, device: &str, at: Instant) {
        self.failed_since.entry(device.to_string()).or_insert(at);
    }

    /// Record that communication is working again.
    pub fn restore(&mut self, device: &str) {
        self.failed_since.remove(device);
    }

    /// Forget a destroyed device.
    pub fn remove(&mut self, device: &str) {
        self.failed_since.remove(device);
    }

    pub fn is_failed(&self, device: &str) -> bool {
        self.failed_since.contains_key(device)
    }

    /// Return the [`CommHealth`] of `device` at time `now`.
    pub fn health(&self, device: &str, now: Instant) -> CommHealth {
        match self.failed_since.get(device) {
            None => CommHealth::Online,
            Some(since) if now.saturating_duration_since(*since) > self.timeout => {
                CommHealth::TimedOut
            }
            Some(_) => CommHealth::Failing,
        }
    }

    /// Return every device whose outage exceeds the timeout.  The order of
    /// the returned list is unspecified.
    pub fn timed_out(&self, now: Instant) -> Vec<String> {
        self.failed_since
            .iter()
            .filter(|(_, since)| now.saturating_duration_since(**since) > self.timeout)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[test]
    fn unknown_device_is_online() {
        let wd = CommWatchdog::new(TIMEOUT);
        assert_eq!(wd.health("ghost", Instant::now()), CommHealth::Online);
    }

    #[test]
    fn failure_within_timeout_is_failing() {
        let mut wd = CommWatchdog::new(TIMEOUT);
        let t0 = Instant::now();
        wd.fail("ga_1", t0);
        assert_eq!(wd.health("ga_1", t0 + TIMEOUT), CommHealth::Failing);
        assert!(wd.is_failed("ga_1"));
    }

    #[test]
    fn failure_past_timeout_is_timed_out() {
        let mut wd = CommWatchdog::new(TIMEOUT);
        let t0 = Instant::now();
        wd.fail("ga_1", t0);
        assert_eq!(
            wd.health("ga_1", t0 + TIMEOUT + Duration::from_secs(1)),
            CommHealth::TimedOut
        );
    }

    #[test]
    fn repeated_failures_keep_first_timestamp() {
        let mut wd = CommWatchdog::new(TIMEOUT);
        let t0 = Instant::now();
        wd.fail("ga_1", t0);
        wd.fail("ga_1", t0 + Duration::from_secs(20));
        assert_eq!(
            wd.health("ga_1", t0 + Duration::from_secs(31)),
            CommHealth::TimedOut
        );
    }

    #[test]
    fn restore_clears_failure() {
        let mut wd = CommWatchdog::new(TIMEOUT);
        let t0 = Instant::now();
        wd.fail("ga_1", t0);
        wd.restore("ga_1");
        assert_eq!(
            wd.health("ga_1", t0 + Duration::from_secs(60)),
            CommHealth::Online
        );
    }

    #[test]
    fn timed_out_lists_only_expired_devices() {
        let mut wd = CommWatchdog::new(TIMEOUT);
        let t0 = Instant::now();
        wd.fail("old", t0);
        wd.fail("new", t0 + Duration::from_secs(25));
        let expired = wd.timed_out(t0 + Duration::from_secs(40));
        assert_eq!(expired, vec!["old".to_string()]);
    }

    #[test]
    fn earlier_now_does_not_panic() {
        let mut wd = CommWatchdog::new(TIMEOUT);
        let t0 = Instant::now();
        wd.fail("ga_1", t0 + Duration::from_secs(10));
        assert_eq!(wd.health("ga_1", t0), CommHealth::Failing);
    }
}
