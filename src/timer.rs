use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Timeout {
    Disabled,
    Armed(Instant),
}

/// A fixed-period timer driven by `handle_timeout`.
///
/// There is no backoff: every expiry re-arms one period after the time
/// it was observed.
#[derive(Debug)]
pub(crate) struct PeriodicTimer {
    period: Duration,
    timeout: Timeout,
}

impl PeriodicTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            timeout: Timeout::Disabled,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.timeout = Timeout::Armed(now + self.period);
    }

    pub fn disarm(&mut self) {
        self.timeout = Timeout::Disabled;
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.timeout, Timeout::Armed(_))
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.timeout {
            Timeout::Armed(at) => Some(at),
            Timeout::Disabled => None,
        }
    }

    /// Check for expiry. Returns true once per elapsed period.
    pub fn fire(&mut self, now: Instant) -> bool {
        let Timeout::Armed(at) = self.timeout else {
            return false;
        };
        if now < at {
            return false;
        }
        self.timeout = Timeout::Armed(now + self.period);
        true
    }
}
