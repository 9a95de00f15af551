//! Exact "round half up" of integer fractions.
//!
//! Percentages of the categories of one variable are charted side by side, so
//! they are rounded with integer arithmetic only:
//!
//! ```text
//! round(p/q, d) = floor((2·p·10^d + q) / (2·q)) / 10^d
//! ```
//!
//! The result keeps the scaled integer and the number of decimal places, and
//! only becomes a float at serialization time.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Decimal places of every published percentage
pub const PERCENT_DIGITS: i32 = 1;

/// Largest supported number of decimal places
pub const MAX_DIGITS: i32 = 18;

/// Caller bugs detected by [`round_fraction`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundingError {
    #[error("numerator must not be negative ({0})")]
    NegativeNumerator(i64),

    #[error("denominator must be at least 1 ({0})")]
    NonPositiveDenominator(i64),

    #[error("digits must not be negative ({0})")]
    NegativeDigits(i32),

    #[error("digits {0} exceeds the supported maximum of {}", MAX_DIGITS)]
    TooManyDigits(i32),

    #[error("count too large to express as a percentage")]
    Overflow,
}

/// A non-negative decimal with a fixed number of fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rounded {
    scaled: u128,
    digits: u32,
}

impl Rounded {
    pub fn to_f64(&self) -> f64 {
        self.scaled as f64 / 10f64.powi(self.digits as i32)
    }
}

impl fmt::Display for Rounded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.digits == 0 {
            return write!(f, "{}", self.scaled);
        }
        let m = 10u128.pow(self.digits);
        write!(
            f,
            "{}.{:0width$}",
            self.scaled / m,
            self.scaled % m,
            width = self.digits as usize
        )
    }
}

impl Serialize for Rounded {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.digits == 0 {
            serializer.serialize_u128(self.scaled)
        } else {
            serializer.serialize_f64(self.to_f64())
        }
    }
}

/// Round `numerator / denominator` to `digits` decimal places, halves rounding up
pub fn round_fraction(
    numerator: i64,
    denominator: i64,
    digits: i32,
) -> Result<Rounded, RoundingError> {
    if numerator < 0 {
        return Err(RoundingError::NegativeNumerator(numerator));
    }
    if denominator < 1 {
        return Err(RoundingError::NonPositiveDenominator(denominator));
    }
    if digits < 0 {
        return Err(RoundingError::NegativeDigits(digits));
    }
    if digits > MAX_DIGITS {
        return Err(RoundingError::TooManyDigits(digits));
    }

    // 2 * (2^63 - 1) * 10^18 stays below i128::MAX
    let m = 10i128.pow(digits as u32);
    let p = numerator as i128;
    let q = denominator as i128;
    let scaled = (2 * m * p + q) / (2 * q);

    Ok(Rounded {
        scaled: scaled as u128,
        digits: digits as u32,
    })
}

/// `100 * count / total` to one decimal place, or `None` when `total` is zero
pub fn percent(count: u64, total: u64) -> Result<Option<Rounded>, RoundingError> {
    if total == 0 {
        return Ok(None);
    }
    let numerator = count
        .checked_mul(100)
        .and_then(|n| i64::try_from(n).ok())
        .ok_or(RoundingError::Overflow)?;
    let denominator = i64::try_from(total).map_err(|_| RoundingError::Overflow)?;
    round_fraction(numerator, denominator, PERCENT_DIGITS).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_reference(numerator: i64, denominator: i64, digits: i32) -> u128 {
        let z = (numerator as f64 / denominator as f64) * 10f64.powi(digits);
        (z + 0.500000001).floor() as u128
    }

    #[test]
    fn test_rejects_invalid_arguments() {
        assert_eq!(
            round_fraction(-1, 1, 1),
            Err(RoundingError::NegativeNumerator(-1))
        );
        assert_eq!(
            round_fraction(1, -1, 1),
            Err(RoundingError::NonPositiveDenominator(-1))
        );
        assert_eq!(
            round_fraction(1, 0, 1),
            Err(RoundingError::NonPositiveDenominator(0))
        );
        assert_eq!(
            round_fraction(1, 1, -1),
            Err(RoundingError::NegativeDigits(-1))
        );
        assert_eq!(
            round_fraction(1, 1, 19),
            Err(RoundingError::TooManyDigits(19))
        );
    }

    #[test]
    fn test_round_to_integer() {
        for p in 0..7 {
            assert_eq!(round_fraction(p, 14, 0).unwrap().to_string(), "0");
        }
        for p in 7..21 {
            assert_eq!(round_fraction(p, 14, 0).unwrap().to_string(), "1");
        }
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_fraction(6, 14, 1).unwrap().to_string(), "0.4");
        assert_eq!(round_fraction(7, 14, 1).unwrap().to_string(), "0.5");
        assert_eq!(round_fraction(5554, 100, 1).unwrap().to_string(), "55.5");
        assert_eq!(round_fraction(5555, 100, 1).unwrap().to_string(), "55.6");
        assert_eq!(round_fraction(55554, 1000, 2).unwrap().to_string(), "55.55");
        assert_eq!(round_fraction(55555, 1000, 2).unwrap().to_string(), "55.56");
        assert_eq!(round_fraction(1, 8, 2).unwrap().to_string(), "0.13");
        assert_eq!(round_fraction(0, 3, 2).unwrap().to_string(), "0.00");
    }

    #[test]
    fn test_matches_float_reference_on_grid() {
        for numerator in 0..=500 {
            for denominator in 1..=200 {
                for digits in 0..=3 {
                    let rounded = round_fraction(numerator, denominator, digits).unwrap();
                    assert_eq!(
                        rounded.scaled,
                        float_reference(numerator, denominator, digits),
                        "{}/{} to {} digits",
                        numerator,
                        denominator,
                        digits
                    );
                }
            }
        }
    }

    #[test]
    fn test_large_values_do_not_overflow() {
        let rounded = round_fraction(i64::MAX, 1, MAX_DIGITS).unwrap();
        assert_eq!(rounded.scaled, i64::MAX as u128 * 10u128.pow(18));
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(15, 20).unwrap().unwrap().to_string(), "75.0");
        assert_eq!(percent(1, 3).unwrap().unwrap().to_string(), "33.3");
        assert_eq!(percent(2, 3).unwrap().unwrap().to_string(), "66.7");
        assert_eq!(percent(0, 0).unwrap(), None);
        assert_eq!(percent(u64::MAX, 1), Err(RoundingError::Overflow));
    }

    #[test]
    fn test_serialization() {
        let integral = round_fraction(7, 14, 0).unwrap();
        assert_eq!(serde_json::to_string(&integral).unwrap(), "1");

        let pct = percent(15, 20).unwrap().unwrap();
        assert_eq!(serde_json::to_string(&pct).unwrap(), "75.0");

        let pct = percent(1, 3).unwrap().unwrap();
        assert_eq!(serde_json::to_string(&pct).unwrap(), "33.3");
    }
}
