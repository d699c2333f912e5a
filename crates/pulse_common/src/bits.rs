//! Packed two-state bit vectors used for value payloads and masks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// A fixed-width vector of bits packed 64 per `u64` word.
///
/// Bit 0 is the least significant bit. Storage bits past `width` are kept at
/// zero so that derived equality and hashing only see meaningful bits.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PackedBits")]
pub struct Bits {
    width: u32,
    words: Vec<u64>,
}

/// Unchecked wire form of [`Bits`].
#[derive(Deserialize)]
struct PackedBits {
    width: u32,
    words: Vec<u64>,
}

impl TryFrom<PackedBits> for Bits {
    type Error = String;

    fn try_from(packed: PackedBits) -> Result<Self, Self::Error> {
        let expected = word_count(packed.width);
        if packed.words.len() != expected {
            return Err(format!(
                "{} words for a {}-bit vector, expected {expected}",
                packed.words.len(),
                packed.width
            ));
        }
        let bits = Bits {
            width: packed.width,
            words: packed.words,
        };
        let mut clean = bits.clone();
        clean.clear_tail();
        if clean != bits {
            return Err(format!("bits set past width {}", bits.width));
        }
        Ok(bits)
    }
}

/// Number of bits packed per u64 word.
const BITS_PER_WORD: u32 = 64;

impl Bits {
    /// Creates a vector of the given width with every bit clear.
    pub fn zeros(width: u32) -> Self {
        Self {
            width,
            words: vec![0; word_count(width)],
        }
    }

    /// Creates a vector of the given width with every bit set.
    pub fn ones(width: u32) -> Self {
        let mut bits = Self {
            width,
            words: vec![u64::MAX; word_count(width)],
        };
        bits.clear_tail();
        bits
    }

    /// Creates a vector from the low `width` bits of `value`.
    pub fn from_u64(value: u64, width: u32) -> Self {
        let mut bits = Self::zeros(width);
        if let Some(word) = bits.words.first_mut() {
            *word = value;
        }
        bits.clear_tail();
        bits
    }

    /// Parses a string of `0`/`1` characters, most significant bit first.
    pub fn from_binary_str(s: &str) -> Option<Self> {
        let width = s.len() as u32;
        let mut bits = Self::zeros(width);
        for (i, c) in s.chars().rev().enumerate() {
            match c {
                '0' => {}
                '1' => bits.set(i as u32, true),
                _ => return None,
            }
        }
        Some(bits)
    }

    /// Returns the number of bits in this vector.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Reads the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn get(&self, index: u32) -> bool {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = self.words[(index / BITS_PER_WORD) as usize];
        (word >> (index % BITS_PER_WORD)) & 1 != 0
    }

    /// Writes the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn set(&mut self, index: u32, value: bool) {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = &mut self.words[(index / BITS_PER_WORD) as usize];
        let mask = 1u64 << (index % BITS_PER_WORD);
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Returns the vector as a `u64`, or `None` if it is wider than 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.width > BITS_PER_WORD {
            return None;
        }
        Some(self.words.first().copied().unwrap_or(0))
    }

    /// Returns `true` if no bit is set.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns `true` if every bit is set.
    pub fn is_ones(&self) -> bool {
        self.count_ones() == self.width
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Truncates or zero-extends to `width` bits.
    pub fn resize(&self, width: u32) -> Self {
        let mut out = Self::zeros(width);
        let n = out.words.len().min(self.words.len());
        out.words[..n].copy_from_slice(&self.words[..n]);
        out.clear_tail();
        out
    }

    /// Concatenates `self` (high part) with `low` (low part).
    pub fn concat(&self, low: &Bits) -> Self {
        let mut out = low.resize(self.width + low.width);
        for i in 0..self.width {
            if self.get(i) {
                out.set(low.width + i, true);
            }
        }
        out
    }

    /// Two's-complement addition modulo `2^width`.
    ///
    /// # Panics
    ///
    /// Panics if the widths differ.
    pub fn wrapping_add(&self, rhs: &Bits) -> Self {
        assert_eq!(self.width, rhs.width, "Bits width mismatch in add");
        let mut out = Self::zeros(self.width);
        let mut carry = false;
        for (i, word) in out.words.iter_mut().enumerate() {
            let (s1, c1) = self.words[i].overflowing_add(rhs.words[i]);
            let (s2, c2) = s1.overflowing_add(carry as u64);
            *word = s2;
            carry = c1 || c2;
        }
        out.clear_tail();
        out
    }

    /// Two's-complement subtraction modulo `2^width`.
    pub fn wrapping_sub(&self, rhs: &Bits) -> Self {
        let one = Self::from_u64(1, self.width);
        self.wrapping_add(&(!rhs)).wrapping_add(&one)
    }

    fn clear_tail(&mut self) {
        let rem = self.width % BITS_PER_WORD;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    fn zip_words(&self, rhs: &Bits, op: &str, f: impl Fn(u64, u64) -> u64) -> Bits {
        assert_eq!(self.width, rhs.width, "Bits width mismatch in {op}");
        let words = self
            .words
            .iter()
            .zip(&rhs.words)
            .map(|(&a, &b)| f(a, b))
            .collect();
        let mut out = Bits {
            width: self.width,
            words,
        };
        out.clear_tail();
        out
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.width).rev() {
            write!(f, "{}", if self.get(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bits({self})")
    }
}

impl BitAnd for &Bits {
    type Output = Bits;

    fn bitand(self, rhs: Self) -> Bits {
        self.zip_words(rhs, "AND", |a, b| a & b)
    }
}

impl BitOr for &Bits {
    type Output = Bits;

    fn bitor(self, rhs: Self) -> Bits {
        self.zip_words(rhs, "OR", |a, b| a | b)
    }
}

impl BitXor for &Bits {
    type Output = Bits;

    fn bitxor(self, rhs: Self) -> Bits {
        self.zip_words(rhs, "XOR", |a, b| a ^ b)
    }
}

impl Not for &Bits {
    type Output = Bits;

    fn not(self) -> Bits {
        let mut out = Bits {
            width: self.width,
            words: self.words.iter().map(|w| !w).collect(),
        };
        out.clear_tail();
        out
    }
}

/// Returns the number of u64 words needed to store `width` bits.
fn word_count(width: u32) -> usize {
    width.div_ceil(BITS_PER_WORD) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_rejects_malformed_storage() {
        let short: Result<Bits, _> = serde_json::from_str(r#"{"width":70,"words":[0]}"#);
        assert!(short.is_err());
        let tail: Result<Bits, _> = serde_json::from_str(r#"{"width":3,"words":[8]}"#);
        assert!(tail.unwrap_err().to_string().contains("past width 3"));
        let ok: Bits = serde_json::from_str(r#"{"width":3,"words":[5]}"#).unwrap();
        assert_eq!(ok, Bits::from_u64(5, 3));
    }

    #[test]
    fn zeros_and_ones() {
        assert!(Bits::zeros(70).is_zero());
        assert!(Bits::ones(70).is_ones());
        assert_eq!(Bits::ones(70).count_ones(), 70);
    }

    #[test]
    fn from_u64_truncates() {
        let b = Bits::from_u64(0xFF, 4);
        assert_eq!(b.to_u64(), Some(0xF));
        assert_eq!(b, Bits::ones(4));
    }

    #[test]
    fn set_get_across_words() {
        let mut b = Bits::zeros(130);
        b.set(0, true);
        b.set(64, true);
        b.set(129, true);
        assert!(b.get(0) && b.get(64) && b.get(129));
        assert!(!b.get(1));
        b.set(64, false);
        assert!(!b.get(64));
        assert_eq!(b.to_u64(), None);
    }

    #[test]
    fn binary_str_msb_first() {
        let b = Bits::from_binary_str("1100").unwrap();
        assert_eq!(b.to_u64(), Some(0b1100));
        assert_eq!(b.to_string(), "1100");
        assert!(Bits::from_binary_str("10x").is_none());
    }

    #[test]
    fn not_keeps_tail_clear() {
        let b = !&Bits::zeros(3);
        assert_eq!(b, Bits::ones(3));
        assert_eq!(b.to_u64(), Some(0b111));
    }

    #[test]
    fn bitwise_ops() {
        let a = Bits::from_binary_str("1100").unwrap();
        let b = Bits::from_binary_str("1010").unwrap();
        assert_eq!((&a & &b).to_string(), "1000");
        assert_eq!((&a | &b).to_string(), "1110");
        assert_eq!((&a ^ &b).to_string(), "0110");
    }

    #[test]
    fn add_wraps_and_carries_between_words() {
        let a = Bits::from_u64(u64::MAX, 65);
        let sum = a.wrapping_add(&Bits::from_u64(1, 65));
        assert!(sum.get(64));
        assert_eq!(sum.count_ones(), 1);

        let small = Bits::from_u64(0b111, 3).wrapping_add(&Bits::from_u64(1, 3));
        assert!(small.is_zero());
    }

    #[test]
    fn sub_wraps() {
        let d = Bits::from_u64(1, 4).wrapping_sub(&Bits::from_u64(2, 4));
        assert_eq!(d.to_u64(), Some(0xF));
    }

    #[test]
    fn concat_high_low() {
        let hi = Bits::from_binary_str("10").unwrap();
        let lo = Bits::from_binary_str("011").unwrap();
        assert_eq!(hi.concat(&lo).to_string(), "10011");
    }

    #[test]
    fn resize_truncates_and_extends() {
        let b = Bits::from_binary_str("1011").unwrap();
        assert_eq!(b.resize(2).to_string(), "11");
        assert_eq!(b.resize(6).to_string(), "001011");
    }

    #[test]
    fn serde_roundtrip() {
        let b = Bits::from_binary_str("100101").unwrap();
        let json = serde_json::to_string(&b).unwrap();
        let back: Bits = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }
}
