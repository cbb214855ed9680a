use std::time::Duration;

use rand::Rng;

/// Exponential reconnect schedule with jitter.
///
/// Each failed attempt doubles the delay up to `cap`. A session that stays
/// connected for at least `reset_after` resets the schedule, so a brief
/// outage after hours of stability starts over at the initial delay.
pub struct BackoffPolicy {
    initial: Duration,
    cap: Duration,
    reset_after: Duration,
    current: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, cap: Duration, reset_after: Duration) -> Self {
        Self {
            initial,
            cap,
            reset_after,
            current: initial,
        }
    }

    /// Delay before the next reconnect attempt, with +-20% jitter so a
    /// fleet of collectors does not reconnect in lockstep.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.cap);
        jitter(base)
    }

    pub fn record_session(&mut self, connected_for: Duration) {
        if connected_for >= self.reset_after {
            self.current = self.initial;
        }
    }
}

fn jitter(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..=1.2);
    base.mul_f64(factor)
}
