//! Simulation time with picosecond resolution.
//!
//! [`SimTime`] is both an instant on the virtual clock and a duration; the
//! clock starts at zero and only moves forward. Units are fixed integer
//! ratios: 1 ps is the base unit and every larger unit is 1000 of the next.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;

/// Picoseconds per picosecond.
pub const PS: u64 = 1;
/// Picoseconds per nanosecond.
pub const NS: u64 = 1_000 * PS;
/// Picoseconds per microsecond.
pub const US: u64 = 1_000 * NS;
/// Picoseconds per millisecond.
pub const MS: u64 = 1_000 * US;
/// Picoseconds per second.
pub const S: u64 = 1_000 * MS;

/// A point on (or a span of) the virtual clock, in picoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimTime(u64);

impl SimTime {
    /// Time zero.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Creates a time from picoseconds.
    pub const fn from_ps(ps: u64) -> Self {
        Self(ps)
    }

    /// Creates a time from nanoseconds.
    pub const fn from_ns(ns: u64) -> Self {
        Self(ns * NS)
    }

    /// Creates a time from microseconds.
    pub const fn from_us(us: u64) -> Self {
        Self(us * US)
    }

    /// Creates a time from milliseconds.
    pub const fn from_ms(ms: u64) -> Self {
        Self(ms * MS)
    }

    /// Creates a time from seconds.
    pub const fn from_s(s: u64) -> Self {
        Self(s * S)
    }

    /// Returns the time in picoseconds.
    pub const fn as_ps(self) -> u64 {
        self.0
    }

    /// Returns `true` at time zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Adds two times, returning `None` on overflow.
    pub fn checked_add(self, rhs: SimTime) -> Option<SimTime> {
        self.0.checked_add(rhs.0).map(SimTime)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 += rhs.0;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl Mul<u64> for SimTime {
    type Output = SimTime;

    fn mul(self, rhs: u64) -> SimTime {
        SimTime(self.0 * rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ps = self.0;
        if ps == 0 {
            write!(f, "0 ps")
        } else if ps.is_multiple_of(S) {
            write!(f, "{} s", ps / S)
        } else if ps.is_multiple_of(MS) {
            write!(f, "{} ms", ps / MS)
        } else if ps.is_multiple_of(US) {
            write!(f, "{} us", ps / US)
        } else if ps.is_multiple_of(NS) {
            write!(f, "{} ns", ps / NS)
        } else {
            write!(f, "{ps} ps")
        }
    }
}

/// Error type for parsing time strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeError {
    /// The input string that failed to parse.
    pub input: String,
    /// What was wrong with it.
    pub reason: &'static str,
}

impl fmt::Display for ParseTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for ParseTimeError {}

impl FromStr for SimTime {
    type Err = ParseTimeError;

    /// Parses `"<integer><unit>"` with units `ps`, `ns`, `us`, `ms`, `s`.
    ///
    /// Whitespace between number and unit is allowed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = |reason| ParseTimeError {
            input: s.to_string(),
            reason,
        };

        let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        if digit_end == 0 {
            return Err(err("no numeric value"));
        }
        let number: u64 = s[..digit_end].parse().map_err(|_| err("invalid number"))?;

        let multiplier = match s[digit_end..].trim() {
            "ps" => PS,
            "ns" => NS,
            "us" => US,
            "ms" => MS,
            "s" => S,
            "" => return Err(err("missing unit")),
            _ => return Err(err("unknown unit")),
        };

        number
            .checked_mul(multiplier)
            .map(SimTime)
            .ok_or_else(|| err("out of range"))
    }
}

impl Serialize for SimTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

/// Accepts either an integer picosecond count or a string with a unit.
impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SimTimeVisitor;

        impl Visitor<'_> for SimTimeVisitor {
            type Value = SimTime;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("picoseconds as an integer, or a string like \"10ns\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<SimTime, E> {
                Ok(SimTime(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<SimTime, E> {
                u64::try_from(v)
                    .map(SimTime)
                    .map_err(|_| E::custom("time cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<SimTime, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SimTimeVisitor)
    }
}
