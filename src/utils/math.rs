//! Fixed-point arithmetic and mathematical utilities.
//!
//! All engine quantities are 18-decimal fixed-point numbers stored as `u128`.
//! Products are formed in 256-bit precision and truncated back with an
//! explicit rounding direction, so callers decide who absorbs the remainder.

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, WAD, WAD_DECIMALS};

// ═══════════════════════════════════════════════════════════════════════════════
// ROUNDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Direction in which a truncated division is rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero
    Down,
    /// Away from zero whenever there is a remainder
    Up,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RAW ARITHMETIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes `(a * b) / denominator` with a 256-bit intermediate
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128> {
    if denominator == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }

    let product = U256::from(a) * U256::from(b);
    let divisor = U256::from(denominator);
    let mut quotient = product / divisor;

    if rounding == Rounding::Up && !(product % divisor).is_zero() {
        quotient = quotient + U256::from(1u8);
    }

    u128::try_from(quotient)
        .map_err(|_| Error::overflow(format!("({} * {}) / {}", a, b, denominator)))
}

/// `(a * b) / denominator`, rounded down
pub fn mul_div_down(a: u128, b: u128, denominator: u128) -> Result<u128> {
    mul_div(a, b, denominator, Rounding::Down)
}

/// `(a * b) / denominator`, rounded up
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> Result<u128> {
    mul_div(a, b, denominator, Rounding::Up)
}

/// Safe addition with overflow check
pub fn checked_add(a: u128, b: u128, operation: &str) -> Result<u128> {
    a.checked_add(b).ok_or_else(|| Error::overflow(operation))
}

/// Safe subtraction with underflow check
pub fn checked_sub(a: u128, b: u128, operation: &str) -> Result<u128> {
    a.checked_sub(b).ok_or_else(|| Error::underflow(operation))
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMAL TEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Render a raw 18-decimal value exactly, without trailing zeros
pub fn format_wad(raw: u128) -> String {
    let integer = raw / WAD;
    let fraction = raw % WAD;
    if fraction == 0 {
        return integer.to_string();
    }
    let digits = format!("{:018}", fraction);
    format!("{}.{}", integer, digits.trim_end_matches('0'))
}

/// Parse a plain decimal string ("1500", "0.05", "1.25") into a raw 18-decimal value
pub fn parse_wad(input: &str) -> Result<u128> {
    let text = input.trim();
    let invalid = |reason: &str| Error::InvalidParameter {
        name: "decimal".into(),
        reason: format!("'{}': {}", input, reason),
    };

    let (integer_part, fraction_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };

    if integer_part.is_empty() && fraction_part.is_empty() {
        return Err(invalid("empty value"));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(integer_part) || !all_digits(fraction_part) {
        return Err(invalid("expected an unsigned decimal number"));
    }
    if fraction_part.len() > WAD_DECIMALS as usize {
        return Err(invalid("more than 18 decimal places"));
    }

    let integer: u128 = if integer_part.is_empty() {
        0
    } else {
        integer_part.parse().map_err(|_| invalid("integer part too large"))?
    };
    let fraction: u128 = if fraction_part.is_empty() {
        0
    } else {
        let padded = format!("{:0<18}", fraction_part);
        padded.parse().map_err(|_| invalid("bad fraction"))?
    };

    integer
        .checked_mul(WAD)
        .and_then(|scaled| scaled.checked_add(fraction))
        .ok_or_else(|| Error::overflow(format!("parse '{}'", input)))
}

/// Serde adapter for raw 18-decimal values.
///
/// Binary formats carry the raw integer; human-readable formats carry the exact
/// decimal string so config files read as "1.5" rather than 1500000000000000000.
pub mod wad_serde {
    use super::*;

    /// Serialize a raw value
    pub fn serialize<S: Serializer>(raw: &u128, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&format_wad(*raw))
        } else {
            serializer.serialize_u128(*raw)
        }
    }

    /// Deserialize a raw value
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u128, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            parse_wad(&text).map_err(serde::de::Error::custom)
        } else {
            u128::deserialize(deserializer)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point number with 18 decimal places precision.
///
/// Used for prices, rates and ratios. Every operation that can lose precision
/// takes a [`Rounding`] and every operation that can overflow returns a `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FixedPoint(u128);

impl FixedPoint {
    /// Scale factor: 10^18
    pub const SCALE: u128 = WAD;

    /// Zero value
    pub const ZERO: Self = Self(0);

    /// One (1.0)
    pub const ONE: Self = Self(Self::SCALE);

    /// Create a new FixedPoint from raw value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from an integer (scales up)
    pub fn from_integer(value: u64) -> Self {
        Self((value as u128) * Self::SCALE)
    }

    /// Create from basis points (100 bps = 1%)
    pub fn from_bps(bps: u64) -> Self {
        Self((bps as u128) * Self::SCALE / (BPS_DIVISOR as u128))
    }

    /// Create from percentage (100 = 100%)
    pub fn from_percentage(pct: u64) -> Self {
        Self((pct as u128) * Self::SCALE / 100)
    }

    /// Get the raw underlying value
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        checked_add(self.0, other.0, "fixed point add").map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        checked_sub(self.0, other.0, "fixed point sub").map(Self)
    }

    /// Saturating subtraction
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Fixed-point multiplication
    pub fn mul(self, other: Self, rounding: Rounding) -> Result<Self> {
        mul_div(self.0, other.0, Self::SCALE, rounding).map(Self)
    }

    /// Fixed-point division
    pub fn div(self, other: Self, rounding: Rounding) -> Result<Self> {
        mul_div(self.0, Self::SCALE, other.0, rounding).map(Self)
    }

    /// Multiply by a plain integer (e.g. elapsed seconds)
    pub fn mul_int(self, value: u64) -> Result<Self> {
        self.0
            .checked_mul(value as u128)
            .map(Self)
            .ok_or_else(|| Error::overflow("fixed point mul_int"))
    }

    /// Minimum of two values
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Maximum of two values
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_wad(self.0))
    }
}

impl FromStr for FixedPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_wad(s).map(Self)
    }
}

impl Serialize for FixedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        wad_serde::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for FixedPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        wad_serde::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_basic() {
        let one = FixedPoint::ONE;
        let two = FixedPoint::from_integer(2);

        assert_eq!(one.checked_add(one).unwrap(), two);
        assert_eq!(two.checked_sub(one).unwrap(), one);
        assert_eq!(one.mul(two, Rounding::Down).unwrap(), two);
        assert_eq!(two.div(one, Rounding::Down).unwrap(), two);
    }

    #[test]
    fn test_fixed_point_from_bps() {
        let half = FixedPoint::from_bps(5000);
        assert_eq!(FixedPoint::ONE.mul(half, Rounding::Down).unwrap().raw(), WAD / 2);
        assert_eq!(FixedPoint::from_percentage(150).raw(), WAD * 3 / 2);
    }

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div_down(10, 1, 3).unwrap(), 3);
        assert_eq!(mul_div_up(10, 1, 3).unwrap(), 4);
        // Exact division never rounds up
        assert_eq!(mul_div_up(9, 1, 3).unwrap(), 3);
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // 10^30 * 10^18 overflows u128 but the quotient fits
        let amount = 1_000_000_000_000 * WAD;
        assert_eq!(mul_div_down(amount, WAD, WAD).unwrap(), amount);
    }

    #[test]
    fn test_mul_div_errors() {
        assert!(mul_div_down(1, 1, 0).is_err());
        let err = mul_div_down(u128::MAX, u128::MAX, 1).unwrap_err();
        assert!(err.is_invalid_amount());
    }

    #[test]
    fn test_checked_helpers() {
        assert_eq!(checked_add(1, 2, "add").unwrap(), 3);
        assert!(checked_add(u128::MAX, 1, "add").is_err());
        assert!(checked_sub(1, 2, "sub").is_err());
    }

    #[test]
    fn test_parse_and_format() {
        assert_eq!(parse_wad("1.5").unwrap(), WAD * 3 / 2);
        assert_eq!(parse_wad("2000").unwrap(), 2000 * WAD);
        assert_eq!(parse_wad(".25").unwrap(), WAD / 4);
        assert_eq!(parse_wad("0.000000000000000001").unwrap(), 1);

        assert_eq!(format_wad(WAD * 3 / 2), "1.5");
        assert_eq!(format_wad(2000 * WAD), "2000");
        assert_eq!(format_wad(1), "0.000000000000000001");

        assert!(parse_wad("").is_err());
        assert!(parse_wad("-1").is_err());
        assert!(parse_wad("1.0000000000000000001").is_err());
        assert!(parse_wad("1e18").is_err());
    }

    #[test]
    fn test_fixed_point_text() {
        let ratio: FixedPoint = "1.5".parse().unwrap();
        assert_eq!(ratio, FixedPoint::from_percentage(150));
        assert_eq!(ratio.to_string(), "1.5");
    }

    #[test]
    fn test_serde_formats() {
        let value = FixedPoint::from_percentage(150);

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"1.5\"");
        let back: FixedPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);

        let bytes = bincode::serialize(&value).unwrap();
        let back: FixedPoint = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, value);
    }
}
