//! Simulation values: a bit payload with validity and event masks.

use crate::bits::Bits;
use crate::logic::Logic;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A bit-vector value as held by a signal at one instant.
///
/// - `raw` carries the bit payload. Bits outside `valid` are kept at zero.
/// - `valid` marks bits that are driven/known; clear bits read as [`Logic::X`].
/// - `event` marks bits that changed in the update that produced this value.
///
/// The event mask is transient bookkeeping: equality, ordering and hashing
/// only look at `raw` and `valid`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "MaskedValue")]
pub struct Value {
    raw: Bits,
    valid: Bits,
    event: Bits,
}

/// Unchecked wire form of [`Value`].
#[derive(Deserialize)]
struct MaskedValue {
    raw: Bits,
    valid: Bits,
    event: Bits,
}

impl TryFrom<MaskedValue> for Value {
    type Error = String;

    fn try_from(v: MaskedValue) -> Result<Self, Self::Error> {
        let width = v.raw.width();
        if v.valid.width() != width || v.event.width() != width {
            return Err(format!(
                "mask widths {}/{} do not match payload width {width}",
                v.valid.width(),
                v.event.width()
            ));
        }
        if (&v.raw & &v.valid) != v.raw {
            return Err("payload has bits set outside the validity mask".to_string());
        }
        Ok(Self {
            raw: v.raw,
            valid: v.valid,
            event: v.event,
        })
    }
}

impl Value {
    /// Builds a value from a payload and a validity mask, with no event.
    ///
    /// # Panics
    ///
    /// Panics if the two vectors have different widths.
    pub fn new(raw: Bits, valid: Bits) -> Self {
        assert_eq!(
            raw.width(),
            valid.width(),
            "Value payload and validity mask widths differ"
        );
        let raw = &raw & &valid;
        let event = Bits::zeros(raw.width());
        Self { raw, valid, event }
    }

    /// A value of the given width with every bit undefined.
    pub fn undefined(width: u32) -> Self {
        Self::new(Bits::zeros(width), Bits::zeros(width))
    }

    /// A fully defined value from the low `width` bits of `value`.
    pub fn from_u64(value: u64, width: u32) -> Self {
        Self::new(Bits::from_u64(value, width), Bits::ones(width))
    }

    /// A fully defined single-bit value.
    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(value as u64, 1)
    }

    /// Parses `0`, `1`, `x`/`X` characters, most significant bit first.
    pub fn from_binary_str(s: &str) -> Option<Self> {
        let width = s.len() as u32;
        let mut raw = Bits::zeros(width);
        let mut valid = Bits::zeros(width);
        for (i, c) in s.chars().rev().enumerate() {
            match Logic::from_char(c)? {
                Logic::Zero => valid.set(i as u32, true),
                Logic::One => {
                    raw.set(i as u32, true);
                    valid.set(i as u32, true);
                }
                Logic::X => {}
            }
        }
        Some(Self::new(raw, valid))
    }

    /// Returns the number of bits.
    pub fn width(&self) -> u32 {
        self.raw.width()
    }

    /// The bit payload (zero wherever the value is undefined).
    pub fn raw(&self) -> &Bits {
        &self.raw
    }

    /// The per-bit validity mask.
    pub fn valid_mask(&self) -> &Bits {
        &self.valid
    }

    /// The per-bit event mask.
    pub fn event_mask(&self) -> &Bits {
        &self.event
    }

    /// Reads one bit through the validity mask.
    pub fn bit(&self, index: u32) -> Logic {
        if self.valid.get(index) {
            Logic::from(self.raw.get(index))
        } else {
            Logic::X
        }
    }

    /// Returns `true` if every bit is defined.
    pub fn is_fully_valid(&self) -> bool {
        self.valid.is_ones()
    }

    /// Returns `true` if no bit is defined.
    pub fn is_undefined(&self) -> bool {
        self.valid.is_zero()
    }

    /// Returns `true` if any bit is flagged as changed.
    pub fn has_event(&self) -> bool {
        !self.event.is_zero()
    }

    /// The payload as a `u64`, if fully defined and at most 64 bits wide.
    pub fn to_u64(&self) -> Option<u64> {
        if self.is_fully_valid() {
            self.raw.to_u64()
        } else {
            None
        }
    }

    /// Copies the payload and validity with a caller-chosen event mask.
    ///
    /// # Panics
    ///
    /// Panics if `event` has a different width.
    pub fn with_event(&self, event: Bits) -> Self {
        assert_eq!(event.width(), self.width(), "event mask width differs");
        Self {
            raw: self.raw.clone(),
            valid: self.valid.clone(),
            event,
        }
    }

    /// Copy flagged as "every defined bit just became known".
    pub fn with_full_event(&self) -> Self {
        self.with_event(self.valid.clone())
    }

    /// Copy flagged as "settled, nothing changed".
    pub fn settled(&self) -> Self {
        self.with_event(Bits::zeros(self.width()))
    }

    /// Replaces the event mask in place.
    ///
    /// # Panics
    ///
    /// Panics if `event` has a different width.
    pub fn set_event_mask(&mut self, event: Bits) {
        assert_eq!(event.width(), self.width(), "event mask width differs");
        self.event = event;
    }

    /// Bits that differ between `self` and `previous`, in payload or validity.
    ///
    /// Values of different widths differ in every bit of `self`.
    pub fn diff(&self, previous: &Value) -> Bits {
        if self.width() != previous.width() {
            return Bits::ones(self.width());
        }
        &(&self.raw ^ &previous.raw) | &(&self.valid ^ &previous.valid)
    }

    /// Concatenates `self` (high part) with `low` (low part).
    pub fn concat(&self, low: &Value) -> Self {
        Self::new(self.raw.concat(&low.raw), self.valid.concat(&low.valid))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.valid == other.valid
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
        self.valid.hash(state);
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw
            .cmp(&other.raw)
            .then_with(|| self.valid.cmp(&other.valid))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.width()).rev() {
            write!(f, "{}", self.bit(i))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({self}, event={})", self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_reads_x() {
        let v = Value::undefined(3);
        assert!(v.is_undefined());
        assert_eq!(v.to_string(), "XXX");
        assert_eq!(v.to_u64(), None);
    }

    #[test]
    fn raw_is_masked_by_validity() {
        let v = Value::new(Bits::ones(4), Bits::from_u64(0b0011, 4));
        assert_eq!(v.raw().to_u64(), Some(0b0011));
        assert_eq!(v.to_string(), "XX11");
    }

    #[test]
    fn binary_str_with_undefined_bits() {
        let v = Value::from_binary_str("1x0").unwrap();
        assert_eq!(v.bit(2), Logic::One);
        assert_eq!(v.bit(1), Logic::X);
        assert_eq!(v.bit(0), Logic::Zero);
        assert!(Value::from_binary_str("1z").is_none());
    }

    #[test]
    fn clone_is_independent() {
        let v = Value::from_u64(5, 3).with_full_event();
        let mut c = v.clone();
        c.set_event_mask(Bits::zeros(3));
        assert!(v.has_event());
        assert_eq!(v.event_mask(), &Bits::ones(3));
        assert!(!c.has_event());
    }

    #[test]
    fn full_event_follows_validity() {
        let v = Value::from_binary_str("x1").unwrap().with_full_event();
        assert_eq!(v.event_mask().to_u64(), Some(0b01));
        assert!(!v.settled().has_event());
    }

    #[test]
    fn equality_ignores_event_mask() {
        let a = Value::from_u64(1, 1);
        assert_eq!(a, a.with_full_event());
        assert_ne!(a, Value::undefined(1));
    }

    #[test]
    fn diff_covers_payload_and_validity() {
        let old = Value::from_binary_str("10x").unwrap();
        let new = Value::from_binary_str("001").unwrap();
        assert_eq!(new.diff(&old).to_string(), "101");
        assert_eq!(Value::from_u64(1, 2).diff(&Value::from_u64(1, 1)), Bits::ones(2));
    }

    #[test]
    fn concat_keeps_validity() {
        let v = Value::from_binary_str("1").unwrap().concat(&Value::from_binary_str("x0").unwrap());
        assert_eq!(v.to_string(), "1X0");
    }

    #[test]
    fn serde_roundtrip() {
        let v = Value::from_binary_str("1x01").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn deserialize_checks_masks() {
        let bits = |w: u32, x: u64| serde_json::to_value(Bits::from_u64(x, w)).unwrap();
        let value = |raw: serde_json::Value, valid: serde_json::Value, event: serde_json::Value| {
            serde_json::from_value::<Value>(serde_json::json!({
                "raw": raw, "valid": valid, "event": event
            }))
        };
        let ok = value(bits(2, 0b01), bits(2, 0b11), bits(2, 0b10)).unwrap();
        assert_eq!(ok, Value::from_u64(1, 2));
        assert_eq!(ok.event_mask(), &Bits::from_u64(0b10, 2));

        let err = value(bits(2, 0b01), bits(3, 0b111), bits(2, 0)).unwrap_err();
        assert!(err.to_string().contains("do not match"));
        let err = value(bits(2, 0b11), bits(2, 0b01), bits(2, 0)).unwrap_err();
        assert!(err.to_string().contains("outside the validity mask"));
    }
}
