/// Simulated time for the execution kernel.
///
/// Represents a date in simulated seconds with no dependency on
/// `std::time`. The clock only advances when the runtime jumps to the
/// next model completion or timer, never from wall-clock observation.

use std::cmp::Ordering;

/// A date in simulated seconds.
///
/// Ordered with `f64::total_cmp` so it can key a `BinaryHeap` or a
/// `BTreeMap`. Constructors reject NaN by clamping it to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(f64);

impl SimTime {
    /// The zero-point of simulated time.
    pub const ZERO: SimTime = SimTime(0.0);

    /// A date that is never reached.
    pub const NEVER: SimTime = SimTime(f64::INFINITY);

    /// Create a date from a number of seconds.
    #[inline]
    pub fn new(seconds: f64) -> Self {
        if seconds.is_nan() {
            SimTime(0.0)
        } else {
            SimTime(seconds)
        }
    }

    /// Return the raw number of seconds.
    #[inline]
    pub fn secs(self) -> f64 {
        self.0
    }

    /// Compute the date that is `delay` seconds after `self`.
    #[inline]
    pub fn plus(self, delay: f64) -> SimTime {
        SimTime::new(self.0 + delay)
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: SimTime) -> bool {
        self.0 < other.0
    }

    /// Returns `true` if this date is finite, i.e. can actually be reached.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Seconds elapsed between `other` and `self`.
    /// Returns `None` if `other` is after `self`.
    #[inline]
    pub fn duration_since(self, other: SimTime) -> Option<f64> {
        if other.0 > self.0 {
            None
        } else {
            Some(self.0 - other.0)
        }
    }

    /// Whether two dates are equal up to `precision` seconds.
    #[inline]
    pub fn approx_eq(self, other: SimTime, precision: f64) -> bool {
        (self.0 - other.0).abs() <= precision
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}
