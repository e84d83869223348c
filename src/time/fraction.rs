//! Exact rational arithmetic.
//!
//! A fraction backs the musical time span (a duration expressed as a
//! fraction of a whole note). Values are always stored in lowest terms,
//! so two fractions with different representations but equal value
//! compare equal.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Error produced when parsing a fraction from text fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fraction: {0}")]
pub struct ParseFractionError(pub String);

/// An exact non-negative rational number, stored in lowest terms.
///
/// The denominator is never zero; construction reduces by GCD, so
/// `Fraction::new(2, 4)` and `Fraction::new(1, 2)` are the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    numerator: u64,
    denominator: u64,
}

impl Fraction {
    /// The zero fraction (0/1).
    pub const ZERO: Fraction = Fraction {
        numerator: 0,
        denominator: 1,
    };

    /// Creates a fraction from components already in lowest terms.
    ///
    /// Intended for compile-time constants; callers must guarantee the
    /// components share no common divisor and the denominator is non-zero.
    pub(crate) const fn from_lowest_terms(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Creates a fraction, reducing it to lowest terms.
    ///
    /// # Arguments
    ///
    /// * `numerator` - Non-negative numerator
    /// * `denominator` - Denominator, must be non-zero
    ///
    /// # Returns
    ///
    /// The reduced fraction, or None if `denominator` is zero
    pub fn new(numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let g = gcd(numerator, denominator);
        Some(Self {
            numerator: numerator / g,
            denominator: denominator / g,
        })
    }

    /// Returns the reduced numerator.
    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    /// Returns the reduced denominator (always > 0).
    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    /// Returns true if the fraction is zero.
    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    /// Returns the value as a floating-point number.
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Adds two fractions.
    pub fn add(&self, other: &Fraction) -> Fraction {
        reduce(
            (self.numerator as u128) * (other.denominator as u128)
                + (other.numerator as u128) * (self.denominator as u128),
            (self.denominator as u128) * (other.denominator as u128),
        )
    }

    /// Subtracts `other` from this fraction.
    ///
    /// # Returns
    ///
    /// None if the result would be negative
    pub fn checked_sub(&self, other: &Fraction) -> Option<Fraction> {
        let a = (self.numerator as u128) * (other.denominator as u128);
        let b = (other.numerator as u128) * (self.denominator as u128);
        if a < b {
            return None;
        }
        Some(reduce(
            a - b,
            (self.denominator as u128) * (other.denominator as u128),
        ))
    }

    /// Multiplies two fractions.
    pub fn multiply(&self, other: &Fraction) -> Fraction {
        reduce(
            (self.numerator as u128) * (other.numerator as u128),
            (self.denominator as u128) * (other.denominator as u128),
        )
    }

    /// Divides this fraction by `other`.
    ///
    /// # Returns
    ///
    /// None if `other` is zero
    pub fn divide(&self, other: &Fraction) -> Option<Fraction> {
        if other.numerator == 0 {
            return None;
        }
        Some(reduce(
            (self.numerator as u128) * (other.denominator as u128),
            (self.denominator as u128) * (other.numerator as u128),
        ))
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        // Cross-multiplication avoids floating point; u128 avoids overflow.
        let a = (self.numerator as u128) * (other.denominator as u128);
        let b = (other.numerator as u128) * (self.denominator as u128);
        a.cmp(&b)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Fraction {
    type Err = ParseFractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (n, d) = s
            .split_once('/')
            .ok_or_else(|| ParseFractionError(s.to_string()))?;
        let numerator: u64 = n
            .trim()
            .parse()
            .map_err(|_| ParseFractionError(s.to_string()))?;
        let denominator: u64 = d
            .trim()
            .parse()
            .map_err(|_| ParseFractionError(s.to_string()))?;
        Fraction::new(numerator, denominator).ok_or_else(|| ParseFractionError(s.to_string()))
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    if a == 0 {
        return b;
    }
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn reduce(numerator: u128, denominator: u128) -> Fraction {
    let g = gcd128(numerator, denominator);
    Fraction {
        numerator: (numerator / g) as u64,
        denominator: (denominator / g) as u64,
    }
}

fn gcd128(mut a: u128, mut b: u128) -> u128 {
    if a == 0 {
        return b;
    }
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
