use crate::time::tau::Tau;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An occupied interval of one color on the imaginary-time cycle.
///
/// The interval starts at the creation time `tau_cdag` and runs forward to the
/// annihilation time `tau_c`. When `tau_c < tau_cdag` the segment wraps
/// around `beta`.
///
/// Segments are ordered by *decreasing* `tau_c`, so a sorted list reads the time
/// axis from `beta` down to zero. Ties on `tau_c` are broken on `tau_cdag` to keep
/// the order total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Annihilation time (end of the occupied interval).
    pub tau_c: Tau,
    /// Creation time (start of the occupied interval).
    pub tau_cdag: Tau,
}

impl Segment {
    pub fn new(tau_c: Tau, tau_cdag: Tau) -> Self {
        Self { tau_c, tau_cdag }
    }

    /// The segment occupying the whole cycle. It carries no operators.
    pub fn full_line(beta: f64) -> Self {
        Self {
            tau_c: Tau::beta(beta),
            tau_cdag: Tau::zero(beta),
        }
    }

    pub fn is_full_line(&self) -> bool {
        self.tau_cdag.is_zero() && self.tau_c == Tau::beta(self.tau_c.period())
    }

    /// Forward cyclic distance from `tau_cdag` to `tau_c`.
    pub fn length(&self) -> Tau {
        self.tau_c - self.tau_cdag
    }

    /// True if the segment crosses the `beta -> 0` boundary.
    pub fn is_cyclic(&self) -> bool {
        self.tau_c < self.tau_cdag
    }

    /// True if `tau` lies strictly inside the occupied interval.
    pub fn contains(&self, tau: Tau) -> bool {
        if self.is_full_line() {
            return true;
        }
        if self.is_cyclic() {
            tau > self.tau_cdag || tau < self.tau_c
        } else {
            tau > self.tau_cdag && tau < self.tau_c
        }
    }

    /// True if the line is occupied just below `tau`: the interval is
    /// `(tau_cdag, tau_c]`, so the segment's own annihilation time counts as
    /// occupied and its creation time does not.
    pub fn is_occupied_below(&self, tau: Tau) -> bool {
        if self.is_full_line() {
            return true;
        }
        if self.is_cyclic() {
            tau > self.tau_cdag || tau <= self.tau_c
        } else {
            tau > self.tau_cdag && tau <= self.tau_c
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .tau_c
            .cmp(&self.tau_c)
            .then_with(|| other.tau_cdag.cmp(&self.tau_cdag))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[c: {}, cdag: {}]", self.tau_c, self.tau_cdag)
    }
}
