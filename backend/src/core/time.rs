//! Time management for the simulation
//!
//! Simulated time is a non-negative real (`SimTime`). The ring has two
//! synchronised clock domains, one for the data path and one for the control
//! path, plus the engine's merged timeline. Each [`Clock`] only moves forward;
//! the engine merges them by always dispatching the globally earliest event.
//!
//! A clock may carry a cycle length. Slot-aligned operations (a transmitter
//! starting on the data ring, a tuning command on the control ring) are
//! deferred to the next slot boundary with [`Clock::next_boundary`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Simulated time, in arbitrary units (the default configuration reads them
/// as nanoseconds).
pub type SimTime = f64;

/// Which clock a piece of simulated time belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockDomain {
    /// Merged timeline of every dispatched event
    Timeline,
    /// Data ring: arrivals, transmissions, receptions
    Data,
    /// Control ring: tuning commands
    Control,
}

impl fmt::Display for ClockDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockDomain::Timeline => write!(f, "timeline"),
            ClockDomain::Data => write!(f, "data"),
            ClockDomain::Control => write!(f, "control"),
        }
    }
}

/// A clock was asked to move backwards, or an event was scheduled in the past.
///
/// This is an internal invariant breach, never a user error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("causality violation on {domain} clock: attempted t={attempted} while now={now}")]
pub struct CausalityViolation {
    pub domain: ClockDomain,
    pub attempted: SimTime,
    pub now: SimTime,
}

/// Monotonic simulated-time cursor for one domain
///
/// # Example
/// ```
/// use ringsim_core::core::time::{Clock, ClockDomain};
///
/// let mut clock = Clock::new(ClockDomain::Data);
/// assert_eq!(clock.now(), 0.0);
///
/// let due = clock.schedule(2.5);
/// assert_eq!(due, 2.5);
/// assert_eq!(clock.now(), 0.0); // scheduling does not move the clock
///
/// clock.advance_to(due).unwrap();
/// assert_eq!(clock.now(), 2.5);
/// assert!(clock.advance_to(1.0).is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clock {
    domain: ClockDomain,
    /// Current simulated time
    now: SimTime,
    /// Slot length, if this clock is slotted
    cycle: Option<SimTime>,
    /// Number of successful advances
    advances: u64,
}

impl Clock {
    /// Create a continuous (unslotted) clock at time zero
    pub fn new(domain: ClockDomain) -> Self {
        Self {
            domain,
            now: 0.0,
            cycle: None,
            advances: 0,
        }
    }

    /// Create a slotted clock at time zero
    ///
    /// # Panics
    /// Panics if `cycle` is not a positive finite number. Configuration
    /// validation rejects such values before a clock is ever built.
    ///
    /// # Example
    /// ```
    /// use ringsim_core::core::time::{Clock, ClockDomain};
    ///
    /// let clock = Clock::with_cycle(ClockDomain::Control, 4.0);
    /// assert_eq!(clock.next_boundary(5.0), 8.0);
    /// assert_eq!(clock.next_boundary(8.0), 8.0);
    /// ```
    pub fn with_cycle(domain: ClockDomain, cycle: SimTime) -> Self {
        assert!(
            cycle.is_finite() && cycle > 0.0,
            "clock cycle must be positive"
        );
        Self {
            cycle: Some(cycle),
            ..Self::new(domain)
        }
    }

    pub fn domain(&self) -> ClockDomain {
        self.domain
    }

    /// Current simulated time of this domain
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn cycle(&self) -> Option<SimTime> {
        self.cycle
    }

    /// Number of times the clock has been advanced
    pub fn advances(&self) -> u64 {
        self.advances
    }

    /// Move the clock forward to `t`
    ///
    /// Advancing to the current time is allowed (simultaneous events).
    pub fn advance_to(&mut self, t: SimTime) -> Result<(), CausalityViolation> {
        self.check_not_before(t)?;
        self.now = t;
        self.advances += 1;
        Ok(())
    }

    /// Time `offset` after now. Does not mutate the clock.
    pub fn schedule(&self, offset: SimTime) -> SimTime {
        debug_assert!(offset >= 0.0, "negative scheduling offset");
        self.now + offset
    }

    /// Fail if `t` lies before this clock's current time
    pub fn check_not_before(&self, t: SimTime) -> Result<(), CausalityViolation> {
        if t < self.now || t.is_nan() {
            return Err(CausalityViolation {
                domain: self.domain,
                attempted: t,
                now: self.now,
            });
        }
        Ok(())
    }

    /// First slot boundary at or after `t`; `t` itself for continuous clocks
    pub fn next_boundary(&self, t: SimTime) -> SimTime {
        match self.cycle {
            None => t,
            Some(cycle) => {
                let boundary = (t / cycle).ceil() * cycle;
                // guard against ceil landing a hair below t
                boundary.max(t)
            }
        }
    }

    /// Index of the slot containing `t`, for slotted clocks
    pub fn slot_index(&self, t: SimTime) -> Option<u64> {
        self.cycle.map(|cycle| (t / cycle).floor() as u64)
    }
}
