//! Timing and sizing knobs for the handoff protocol.

use std::time::Duration;

/// Configuration for one worker invocation's handoff.
///
/// The defaults match the timings the protocol was tuned with: poll for
/// the artifact every 100 ms for up to 30 s, wait 200 ms for the writer to
/// flush, then read with up to 5 attempts backing off from 50 ms to 200 ms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffConfig {
    /// Interval between file existence probes.
    pub poll_interval: Duration,
    /// Overall time allowed for the artifact file to appear.
    pub file_deadline: Duration,
    /// Grace period between detecting the file and the first read.
    pub stabilization: Duration,
    /// Total read attempts when the file is locked.
    pub read_attempts: u32,
    /// First backoff between read attempts; doubles each retry.
    pub read_backoff: Duration,
    /// Upper bound on the read backoff.
    pub read_backoff_max: Duration,
    /// Maximum time to wait for the worker to announce its result.
    pub worker_deadline: Duration,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            file_deadline: Duration::from_secs(30),
            stabilization: Duration::from_millis(200),
            read_attempts: 5,
            read_backoff: Duration::from_millis(50),
            read_backoff_max: Duration::from_millis(200),
            worker_deadline: Duration::from_secs(600),
        }
    }
}

impl HandoffConfig {
    /// Backoff before read attempt `attempt + 1` (zero-based `attempt`).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.read_backoff
            .checked_mul(factor)
            .unwrap_or(self.read_backoff_max)
            .min(self.read_backoff_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_timings() {
        let cfg = HandoffConfig::default();
        assert_eq!(cfg.poll_interval, Duration::from_millis(100));
        assert_eq!(cfg.file_deadline, Duration::from_secs(30));
        assert_eq!(cfg.stabilization, Duration::from_millis(200));
        assert_eq!(cfg.read_attempts, 5);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let cfg = HandoffConfig::default();
        assert_eq!(cfg.backoff_for(0), Duration::from_millis(50));
        assert_eq!(cfg.backoff_for(1), Duration::from_millis(100));
        assert_eq!(cfg.backoff_for(2), Duration::from_millis(200));
        assert_eq!(cfg.backoff_for(3), Duration::from_millis(200));
        assert_eq!(cfg.backoff_for(40), Duration::from_millis(200));
    }
}
