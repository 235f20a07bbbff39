//! Load completion tracking for zone bootstrap.
//!
//! Bootstrap begins with a count query whose answer becomes the completion
//! target; every entity row that arrives afterwards bumps the observed
//! counter. Lookup-table rows never count. Completion fires exactly once,
//! no matter how results interleave.

use tracing::info;

/// Lifecycle state of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    /// Bootstrap queries are in flight.
    Loading,
    /// Steady state; timers and tier polls run.
    Running,
    /// Final saves in progress; no new work is scheduled.
    ShuttingDown,
}

#[derive(Debug)]
pub struct LoadCoordinator {
    expected: Option<u64>,
    observed: u64,
    fired: bool,
}

impl LoadCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            expected: None,
            observed: 0,
            fired: false,
        }
    }

    /// Record the count query's answer.
    pub fn set_expected(&mut self, count: u64) {
        info!(count, "zone object count received");
        self.expected = Some(count);
    }

    /// Record `n` loaded entity rows.
    pub fn record_loaded(&mut self, n: u64) {
        self.observed += n;
    }

    #[must_use]
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// True exactly once: the first call after the observed count reaches
    /// the expected total.
    pub fn try_complete(&mut self) -> bool {
        if self.fired {
            return false;
        }
        match self.expected {
            Some(expected) if self.observed >= expected => {
                self.fired = true;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fired
    }
}

impl Default for LoadCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_when_target_reached() {
        let mut lc = LoadCoordinator::new();
        lc.set_expected(3);
        lc.record_loaded(2);
        assert!(!lc.try_complete());
        lc.record_loaded(1);
        assert!(lc.try_complete());
        assert!(!lc.try_complete());
        lc.record_loaded(5);
        assert!(!lc.try_complete());
    }

    #[test]
    fn test_no_completion_before_count_arrives() {
        let mut lc = LoadCoordinator::new();
        lc.record_loaded(10);
        assert!(!lc.try_complete());
        lc.set_expected(10);
        assert!(lc.try_complete());
    }

    #[test]
    fn test_zero_expected_completes_immediately() {
        let mut lc = LoadCoordinator::new();
        lc.set_expected(0);
        assert!(lc.try_complete());
    }
}
