// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cyclic offer scheduler: `Down -> InitialWait -> Repetition -> Main -> Down`
//! per offered service (§4.3).

use std::time::{Duration, Instant};

use crate::sd::constants::{
    DEFAULT_CYCLE_OFFER_MS, DEFAULT_INITIAL_DELAY_MAX_MS, DEFAULT_INITIAL_DELAY_MIN_MS,
    DEFAULT_REPETITION_BASE_MS, DEFAULT_REPETITION_COUNT,
};

/// State of one offered service's cyclic-offer scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferState {
    Down,
    InitialWait,
    Repetition { sent: u32 },
    Main,
}

/// Timing parameters for the offer lifecycle, resolved from configuration
/// (falls back to the AUTOSAR-typical defaults in [`crate::sd::constants`]).
#[derive(Debug, Clone, Copy)]
pub struct OfferTiming {
    pub initial_delay_min: Duration,
    pub initial_delay_max: Duration,
    pub repetition_base: Duration,
    pub repetition_count: u32,
    pub cycle_offer: Duration,
}

impl Default for OfferTiming {
    fn default() -> Self {
        Self {
            initial_delay_min: Duration::from_millis(DEFAULT_INITIAL_DELAY_MIN_MS),
            initial_delay_max: Duration::from_millis(DEFAULT_INITIAL_DELAY_MAX_MS),
            repetition_base: Duration::from_millis(DEFAULT_REPETITION_BASE_MS),
            repetition_count: DEFAULT_REPETITION_COUNT,
            cycle_offer: Duration::from_millis(DEFAULT_CYCLE_OFFER_MS),
        }
    }
}

/// Drives one offered service's state transitions and tells the reactor when
/// the next Offer (or Stop-Offer) is due.
pub struct OfferScheduler {
    state: OfferState,
    timing: OfferTiming,
    next_due: Option<Instant>,
}

impl OfferScheduler {
    #[must_use]
    pub fn new(timing: OfferTiming) -> Self {
        Self {
            state: OfferState::Down,
            timing,
            next_due: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> OfferState {
        self.state
    }

    /// `Down -> InitialWait`, scheduling the first Offer after a random
    /// delay in `[initial_delay_min, initial_delay_max]`.
    pub fn start(&mut self, now: Instant) {
        let min = self.timing.initial_delay_min.as_millis() as u64;
        let max = self.timing.initial_delay_max.as_millis() as u64;
        let delay_ms = if max > min { min + fastrand::u64(0..=(max - min)) } else { min };
        self.state = OfferState::InitialWait;
        self.next_due = Some(now + Duration::from_millis(delay_ms));
    }

    /// `Any -> Down`, clearing the schedule. Caller is responsible for
    /// emitting the Stop-Offer entry (TTL = 0) once.
    pub fn stop(&mut self) {
        self.state = OfferState::Down;
        self.next_due = None;
    }

    /// Returns `true` if an Offer is due at `now` and advances the state
    /// machine accordingly, arming the next due time.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else { return false };
        if now < due {
            return false;
        }

        match self.state {
            OfferState::Down => false,
            OfferState::InitialWait => {
                self.state = OfferState::Repetition { sent: 1 };
                self.next_due = Some(now + self.timing.repetition_base);
                true
            }
            OfferState::Repetition { sent } => {
                if sent >= self.timing.repetition_count {
                    self.state = OfferState::Main;
                    self.next_due = Some(now + self.timing.cycle_offer);
                } else {
                    let delay = self.timing.repetition_base * 2u32.pow(sent);
                    self.state = OfferState::Repetition { sent: sent + 1 };
                    self.next_due = Some(now + delay);
                }
                true
            }
            OfferState::Main => {
                self.next_due = Some(now + self.timing.cycle_offer);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_timing() -> OfferTiming {
        OfferTiming {
            initial_delay_min: Duration::from_millis(1),
            initial_delay_max: Duration::from_millis(2),
            repetition_base: Duration::from_millis(1),
            repetition_count: 2,
            cycle_offer: Duration::from_millis(1),
        }
    }

    #[test]
    fn full_lifecycle_down_to_main() {
        let mut sched = OfferScheduler::new(fast_timing());
        assert_eq!(sched.state(), OfferState::Down);

        let t0 = Instant::now();
        sched.start(t0);
        assert_eq!(sched.state(), OfferState::InitialWait);

        let t1 = t0 + Duration::from_millis(10);
        assert!(sched.poll(t1));
        assert_eq!(sched.state(), OfferState::Repetition { sent: 1 });

        assert!(sched.poll(t1 + Duration::from_millis(10)));
        assert_eq!(sched.state(), OfferState::Repetition { sent: 2 });

        assert!(sched.poll(t1 + Duration::from_millis(50)));
        assert_eq!(sched.state(), OfferState::Main);

        assert!(sched.poll(t1 + Duration::from_millis(60)));
        assert_eq!(sched.state(), OfferState::Main);
    }

    #[test]
    fn stop_returns_to_down_from_any_state() {
        let mut sched = OfferScheduler::new(fast_timing());
        sched.start(Instant::now());
        sched.stop();
        assert_eq!(sched.state(), OfferState::Down);
        assert!(!sched.poll(Instant::now() + Duration::from_secs(1)));
    }

    #[test]
    fn poll_before_due_time_is_false() {
        let mut sched = OfferScheduler::new(OfferTiming {
            initial_delay_min: Duration::from_secs(10),
            initial_delay_max: Duration::from_secs(10),
            ..fast_timing()
        });
        let t0 = Instant::now();
        sched.start(t0);
        assert!(!sched.poll(t0 + Duration::from_millis(1)));
    }
}
