use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// Number of grid points in one period of imaginary time.
pub const TICKS_PER_PERIOD: u64 = 1 << 62;

/// A point on the cyclic imaginary-time axis `[0, beta)`.
///
/// Times are stored as an integer number of ticks on a fixed grid of
/// [`TICKS_PER_PERIOD`] points per period. Integer storage makes the cyclic
/// arithmetic exact: two times drawn independently are equal only if their tick
/// counts are equal, and `a - b` never suffers from rounding at the wrap.
///
/// The value [`Tau::beta`] carries a tick count equal to [`TICKS_PER_PERIOD`].
/// It is not a regular time point: it marks the end of the full line and is the
/// largest possible duration.
///
/// # Examples
/// ```
/// use ctseg::time::tau::Tau;
///
/// let a = Tau::from_f64(0.2, 1.0);
/// let b = Tau::from_f64(0.7, 1.0);
/// assert!((f64::from(b - a) - 0.5).abs() < 1e-12);
/// assert!((f64::from(a - b) - 0.5).abs() < 1e-12); // wraps around beta
/// assert_eq!(a - a, Tau::zero(1.0));
/// ```
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Tau {
    ticks: u64,
    beta: f64,
}

impl Tau {
    /// The origin of the time axis.
    pub fn zero(beta: f64) -> Self {
        debug_assert!(beta > 0.0, "beta must be positive");
        Self { ticks: 0, beta }
    }

    /// The end of the time axis, one full period away from the origin.
    pub fn beta(beta: f64) -> Self {
        debug_assert!(beta > 0.0, "beta must be positive");
        Self {
            ticks: TICKS_PER_PERIOD,
            beta,
        }
    }

    /// Maps a real time onto the cycle `[0, beta)`.
    ///
    /// Values outside of the interval are wrapped with `rem_euclid`.
    pub fn from_f64(tau: f64, beta: f64) -> Self {
        assert!(beta > 0.0, "beta must be positive");
        assert!(tau.is_finite(), "Cannot build a time from {}", tau);
        let fraction = tau.rem_euclid(beta) / beta;
        let ticks = (fraction * TICKS_PER_PERIOD as f64).round() as u64;
        Self {
            ticks: ticks % TICKS_PER_PERIOD,
            beta,
        }
    }

    /// Draws a time uniformly in `[0, window)`.
    ///
    /// # Panics
    /// Panics if `window` is the zero duration.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, window: Tau) -> Self {
        assert!(window.ticks > 0, "Cannot draw a time in an empty window");
        let uniform = Uniform::new(0, window.ticks);
        Self {
            ticks: uniform.sample(rng),
            beta: window.beta,
        }
    }

    /// Period of the time axis.
    pub fn period(&self) -> f64 {
        self.beta
    }

    /// Raw position on the tick grid.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// True for the zero duration / the origin.
    pub fn is_zero(&self) -> bool {
        self.ticks == 0
    }

    /// The same point of the cycle with the `beta` sentinel mapped onto the
    /// origin.
    pub fn canonical(self) -> Self {
        Self {
            ticks: self.ticks % TICKS_PER_PERIOD,
            beta: self.beta,
        }
    }
}

impl From<Tau> for f64 {
    fn from(tau: Tau) -> f64 {
        tau.ticks as f64 / TICKS_PER_PERIOD as f64 * tau.beta
    }
}

impl Sub for Tau {
    type Output = Tau;

    /// Cyclic distance travelled forward from `rhs` to reach `self`.
    ///
    /// The result lies in `(0, beta]`, except for `a - a` which is zero.
    fn sub(self, rhs: Tau) -> Tau {
        debug_assert_eq!(self.beta, rhs.beta, "Times on different cycles");
        let ticks = match self.ticks.cmp(&rhs.ticks) {
            Ordering::Equal => 0,
            Ordering::Greater => self.ticks - rhs.ticks,
            Ordering::Less => TICKS_PER_PERIOD - (rhs.ticks - self.ticks),
        };
        Tau {
            ticks,
            beta: self.beta,
        }
    }
}

impl Add for Tau {
    type Output = Tau;

    /// Advances `self` by the duration `rhs`, wrapping into `[0, beta)`.
    fn add(self, rhs: Tau) -> Tau {
        debug_assert_eq!(self.beta, rhs.beta, "Times on different cycles");
        Tau {
            ticks: (self.ticks % TICKS_PER_PERIOD + rhs.ticks % TICKS_PER_PERIOD)
                % TICKS_PER_PERIOD,
            beta: self.beta,
        }
    }
}

impl PartialEq for Tau {
    fn eq(&self, other: &Self) -> bool {
        self.ticks == other.ticks
    }
}

impl Eq for Tau {}

impl PartialOrd for Tau {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tau {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ticks.cmp(&other.ticks)
    }
}

impl fmt::Display for Tau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.8}", f64::from(*self))
    }
}
