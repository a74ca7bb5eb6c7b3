//! Bounded retry pacing shared by the lock acquisition loop and the register client.
//!
//! A [`Backoff`] owns an attempt budget and a delay. The delay can be scaled by a
//! random factor so that several processes polling the same lock file do not
//! wake up in lockstep.

use rand::Rng;
use std::thread;
use std::time::Duration;

/// Random scaling applied to the base delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// Always sleep exactly the base delay.
    None,
    /// Sleep the base delay multiplied by a uniform factor in `1..=max`.
    Scale(u32),
}

/// The last error of an operation that used up its attempt budget.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Attempt counter with a bounded budget and a (possibly jittered) pause.
#[derive(Debug, Clone)]
pub struct Backoff {
    max_attempts: u32,
    delay: Duration,
    jitter: Jitter,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff allowing `max_attempts` attempts (at least one).
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            jitter: Jitter::None,
            attempt: 0,
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Number of attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Start the next attempt, returning its 1-based number, or `None` once the
    /// budget is used up.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        Some(self.attempt)
    }

    /// The delay the next [`pause`](Self::pause) will sleep.
    pub fn next_delay(&self) -> Duration {
        match self.jitter {
            Jitter::None => self.delay,
            Jitter::Scale(max) if max <= 1 => self.delay,
            Jitter::Scale(max) => self.delay * rand::rng().random_range(1..=max),
        }
    }

    /// Sleep for the (jittered) delay and return how long was slept.
    pub fn pause(&self) -> Duration {
        let delay = self.next_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        delay
    }

    /// Run `op` until it succeeds or the budget is spent, pausing before every
    /// attempt.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn retry<T, E>(mut self, mut op: impl FnMut(u32) -> Result<T, E>) -> Result<T, Exhausted<E>> {
        loop {
            self.attempt += 1;
            let attempt = self.attempt;
            self.pause();
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(last_error) if self.is_exhausted() => {
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error,
                    });
                }
                Err(_) => continue,
            }
        }
    }
}
