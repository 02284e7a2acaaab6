//! Retry policy for the submit/poll loop.
//!
//! The loop never sleeps directly: it asks a [`Backoff`] to wait, which charges an
//! attempt against the [`RetryPolicy`] and sleeps on an injected [`Clock`]. Tests
//! use [`ManualClock`] so no real time passes.
use crate::error::{Error, Result};
use rand::Rng;
use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock. Sleeping advances time instantly and records the requested delay.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
    sleeps: RefCell<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Cell::new(Instant::now()),
            sleeps: RefCell::new(Vec::new()),
        }
    }
}

impl ManualClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
    fn sleep(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
        self.sleeps.borrow_mut().push(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed part of every delay.
    pub base_delay: Duration,
    /// Upper bound of the uniform random jitter added to `base_delay`.
    pub max_jitter: Duration,
    /// Maximum number of delays before giving up. `None` waits forever.
    pub max_attempts: Option<u32>,
    /// Maximum total time spent in the loop. `None` waits forever.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_jitter: Duration::from_secs(5),
            max_attempts: Some(720),
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// A policy without delays, for tests and local mock servers.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            max_attempts: Some(max_attempts),
            deadline: None,
        }
    }

    pub fn delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..=jitter_ms)
        };
        self.base_delay + Duration::from_millis(jitter)
    }

    pub fn start<'a, C: Clock + ?Sized>(&'a self, clock: &'a C) -> Backoff<'a, C> {
        Backoff {
            policy: self,
            clock,
            started: clock.now(),
            attempts: 0,
        }
    }
}

/// Attempt bookkeeping for a single run of the polling loop.
pub struct Backoff<'a, C: Clock + ?Sized> {
    policy: &'a RetryPolicy,
    clock: &'a C,
    started: Instant,
    attempts: u32,
}

impl<C: Clock + ?Sized> Backoff<'_, C> {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sleep one jittered interval, or fail once the policy is exhausted.
    pub fn wait(&mut self) -> Result<()> {
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return Err(Error::Timeout {
                    attempts: self.attempts,
                });
            }
        }
        if let Some(deadline) = self.policy.deadline {
            if self.clock.now().duration_since(self.started) >= deadline {
                return Err(Error::Timeout {
                    attempts: self.attempts,
                });
            }
        }
        let delay = self.policy.delay(&mut rand::thread_rng());
        self.clock.sleep(delay);
        self.attempts += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_jittered_within_bounds() {
        let policy = RetryPolicy::default();
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let delay = policy.delay(&mut rng);
            assert!(delay >= Duration::from_secs(5));
            assert!(delay <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_attempt_limit() {
        let clock = ManualClock::default();
        let policy = RetryPolicy::immediate(3);
        let mut backoff = policy.start(&clock);
        for _ in 0..3 {
            backoff.wait().unwrap();
        }
        match backoff.wait() {
            Err(Error::Timeout { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[test]
    fn test_deadline() {
        let clock = ManualClock::default();
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_jitter: Duration::ZERO,
            max_attempts: None,
            deadline: Some(Duration::from_secs(25)),
        };
        let mut backoff = policy.start(&clock);
        backoff.wait().unwrap();
        backoff.wait().unwrap();
        backoff.wait().unwrap();
        assert!(matches!(backoff.wait(), Err(Error::Timeout { attempts: 3 })));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10); 3]);
    }
}
