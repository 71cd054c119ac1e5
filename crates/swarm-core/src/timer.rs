//! Monotonic deadline and cadence timers.
//!
//! Both types compare against a caller-supplied `now` instead of reading the
//! clock themselves, so the poll loop reads the clock once per pass and every
//! timer in that pass agrees on the same instant.

use std::time::Duration;
use tokio::time::Instant;

/// A point in time after which a bounded wait gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(now: Instant, window: Duration) -> Self {
        Self { at: now + window }
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn expired(&self, now: Instant) -> bool {
        now >= self.at
    }

    /// Time left before expiry (zero once expired).
    pub fn remaining(&self, now: Instant) -> Duration {
        self.at.saturating_duration_since(now)
    }
}

/// A repeating action scheduled by an explicit "next due at" timestamp.
///
/// `poll` fires at most once per call and reschedules relative to the instant
/// it fired, so a late poll never produces a burst of catch-up firings.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    period: Duration,
    next: Instant,
}

impl Cadence {
    /// First firing happens on the first `poll` at or after `now`.
    pub fn immediate(now: Instant, period: Duration) -> Self {
        Self { period, next: now }
    }

    /// First firing happens one full period after `now`.
    pub fn delayed(now: Instant, period: Duration) -> Self {
        Self {
            period,
            next: now + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Instant {
        self.next
    }

    /// Returns `true` if the cadence is due, rescheduling it if so.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.period;
        true
    }

    /// Push the next firing a full period past `now`.
    pub fn reset(&mut self, now: Instant) {
        self.next = now + self.period;
    }
}
