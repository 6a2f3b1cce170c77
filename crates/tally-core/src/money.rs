//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Summing invoice amounts as floats:                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Over thousands of invoices per vendor the drift becomes visible and   │
//! │  the remote record flips between "changed" and "unchanged" from one    │
//! │  cycle to the next.                                                     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every amount entering the system is parsed from its decimal text    │
//! │    into cents once, and every sum is an exact integer sum.             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! // Create from cents (preferred)
//! let total = Money::from_cents(45000); // $450.00
//!
//! // Parse from decimal text (invoice feeds, RPC responses)
//! let amount = Money::from_decimal_str("99.99").unwrap();
//! assert_eq!(amount.cents(), 9999);
//!
//! // Exact sums; overflow is reported, never wrapped
//! let sum = total.checked_add(amount).unwrap();
//! assert_eq!(sum.to_decimal_string(), "549.99");
//! assert!(Money::from_cents(i64::MAX).checked_add(amount).is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Largest cents boundary accepted while parsing; anything past this
/// cannot fit in an `i64` and is rejected before padding with zeros.
const MAX_CENTS_DIGITS: i64 = 19;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: credit notes can make a vendor total negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serializes as cents**: the decimal form is produced explicitly at
///   the RPC boundary with [`Money::to_decimal_f64`]
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                    Where Money is Used                                  │
/// │                                                                         │
/// │  invoices.amount_cents ──► SUM() ──► VendorAggregate.total_amount       │
/// │                                              │                          │
/// │  feed "amount": "12.50" ──► from_decimal_str ┘                          │
/// │                                              │                          │
/// │                                              ▼                          │
/// │  RemoteRecord.amount ◄── from_decimal_str ◄── RPC float   (compare)    │
/// │                                              │                          │
/// │                                              ▼                          │
/// │                          to_decimal_f64 ──► create / write payload     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let invoice = Money::from_cents(15050); // $150.50
    /// assert_eq!(invoice.dollars(), 150);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Parses a decimal amount such as `"450.00"`, `"-12.5"` or `"1e2"`.
    ///
    /// Digits past the second decimal place are rounded half to even, so a
    /// remote float serialized as `450.00000000000006` still compares equal
    /// to `450.00`.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal_str("450").unwrap().cents(), 45000);
    /// assert_eq!(Money::from_decimal_str("0.125").unwrap().cents(), 12);
    /// assert_eq!(Money::from_decimal_str("0.135").unwrap().cents(), 14);
    /// assert!(Money::from_decimal_str("12,50").is_err());
    /// ```
    pub fn from_decimal_str(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("'{}' {}", input, reason),
        };

        let s = input.trim();
        let (negative, unsigned) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = unsigned[pos + 1..]
                    .parse()
                    .map_err(|_| invalid("has an invalid exponent"))?;
                (&unsigned[..pos], exp)
            }
            None => (unsigned, 0),
        };

        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("has no digits"));
        }
        if !int_part
            .bytes()
            .chain(frac_part.bytes())
            .all(|b| b.is_ascii_digit())
        {
            return Err(invalid("is not a decimal number"));
        }

        let digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .map(|b| b - b'0')
            .collect();

        // Zero stays zero whatever the exponent.
        if digits.iter().all(|&d| d == 0) {
            return Ok(Money::zero());
        }

        // Index in `digits` where the cents end and the rounding remainder starts.
        let boundary = (int_part.len() as i64)
            .checked_add(exponent)
            .and_then(|b| b.checked_add(2))
            .ok_or_else(|| invalid("is out of range"))?;
        let split = boundary.clamp(0, digits.len() as i64) as usize;

        let mut cents: i128 = 0;
        for &d in &digits[..split] {
            cents = cents * 10 + d as i128;
            if cents > i64::MAX as i128 {
                return Err(invalid("is out of range"));
            }
        }
        if boundary > digits.len() as i64 {
            if boundary - digits.len() as i64 > MAX_CENTS_DIGITS && cents != 0 {
                return Err(invalid("is out of range"));
            }
            for _ in digits.len() as i64..boundary.min(digits.len() as i64 + MAX_CENTS_DIGITS) {
                cents *= 10;
                if cents > i64::MAX as i128 {
                    return Err(invalid("is out of range"));
                }
            }
        }

        let remainder: &[u8] = if boundary < 0 { &[] } else { &digits[split..] };
        let round_up = match remainder.split_first() {
            Some((&first, _)) if first > 5 => true,
            Some((&5, rest)) => rest.iter().any(|&d| d != 0) || cents % 2 == 1,
            _ => false,
        };
        if round_up {
            cents += 1;
        }

        let signed = if negative { -cents } else { cents };
        i64::try_from(signed)
            .map(Money)
            .map_err(|_| invalid("is out of range"))
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(9999).dollars(), 99);
    /// assert_eq!(Money::from_cents(-1205).dollars(), -12);
    /// ```
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Adds two amounts, or `None` if the sum leaves the `i64` cents range.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns the value as a float in major units, for RPC payloads only.
    ///
    /// The remote store models amounts as floats; the conversion happens
    /// exactly once, at the wire, and never feeds back into a sum.
    #[inline]
    pub fn to_decimal_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Formats the amount as a plain decimal (`"450.00"`), no currency sign.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_decimal_str(s)
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents_parts() {
        let total = Money::from_cents(45_037);
        assert_eq!(total.dollars(), 450);
        assert_eq!(total.cents_part(), 37);
        assert_eq!(Money::from_cents(-1205).cents_part(), 5);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(9999).to_string(), "$99.99");
        assert_eq!(Money::from_cents(45000).to_string(), "$450.00");
        assert_eq!(Money::from_cents(-1205).to_string(), "-$12.05");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn test_decimal_string() {
        assert_eq!(Money::from_cents(45000).to_decimal_string(), "450.00");
        assert_eq!(Money::from_cents(-5).to_decimal_string(), "-0.05");
    }

    #[test]
    fn test_parse_plain_decimals() {
        assert_eq!(Money::from_decimal_str("450.00").unwrap().cents(), 45000);
        assert_eq!(Money::from_decimal_str("99.99").unwrap().cents(), 9999);
        assert_eq!(Money::from_decimal_str("7").unwrap().cents(), 700);
        assert_eq!(Money::from_decimal_str(".5").unwrap().cents(), 50);
        assert_eq!(Money::from_decimal_str("12.").unwrap().cents(), 1200);
        assert_eq!(Money::from_decimal_str(" -3.10 ").unwrap().cents(), -310);
        assert_eq!(Money::from_decimal_str("+1.01").unwrap().cents(), 101);
    }

    #[test]
    fn test_parse_rounds_half_to_even() {
        assert_eq!(Money::from_decimal_str("0.125").unwrap().cents(), 12);
        assert_eq!(Money::from_decimal_str("0.135").unwrap().cents(), 14);
        assert_eq!(Money::from_decimal_str("0.1251").unwrap().cents(), 13);
        assert_eq!(Money::from_decimal_str("0.124999").unwrap().cents(), 12);
        assert_eq!(Money::from_decimal_str("-0.125").unwrap().cents(), -12);
    }

    #[test]
    fn test_parse_float_noise() {
        // Typical f64 artefacts coming back from the remote store.
        assert_eq!(
            Money::from_decimal_str("450.00000000000006").unwrap().cents(),
            45000
        );
        assert_eq!(
            Money::from_decimal_str("99.98999999999999").unwrap().cents(),
            9999
        );
    }

    #[test]
    fn test_parse_exponent() {
        assert_eq!(Money::from_decimal_str("1e2").unwrap().cents(), 10000);
        assert_eq!(Money::from_decimal_str("1.5E1").unwrap().cents(), 1500);
        assert_eq!(Money::from_decimal_str("1e-7").unwrap().cents(), 0);
        assert_eq!(Money::from_decimal_str("0e400").unwrap().cents(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Money::from_decimal_str("").is_err());
        assert!(Money::from_decimal_str("-").is_err());
        assert!(Money::from_decimal_str("12,50").is_err());
        assert!(Money::from_decimal_str("1.2.3").is_err());
        assert!(Money::from_decimal_str("abc").is_err());
        assert!(Money::from_decimal_str("1e").is_err());
        assert!(Money::from_decimal_str("1e30").is_err());
    }

    #[test]
    fn test_parse_extreme_exponents_do_not_overflow() {
        assert!(Money::from_decimal_str("1e9223372036854775807").is_err());
        assert!(Money::from_decimal_str("9.99e9223372036854775806").is_err());
        assert_eq!(Money::from_decimal_str("1e-9223372036854775808").unwrap().cents(), 0);
        assert_eq!(Money::from_decimal_str("0.000e9223372036854775807").unwrap().cents(), 0);
        assert!(Money::from_decimal_str("92233720368547758.08").is_err());
    }

    #[test]
    fn test_checked_add() {
        let invoice = Money::from_cents(15000);
        let credit_note = Money::from_cents(-2500);

        assert_eq!(invoice.checked_add(credit_note), Some(Money::from_cents(12500)));
        assert_eq!(
            invoice.checked_add(invoice).and_then(|m| m.checked_add(credit_note)),
            Some(Money::from_cents(27500))
        );
    }

    #[test]
    fn test_checked_add_reports_overflow() {
        let huge = Money::from_decimal_str("90000000000000000").unwrap();
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(Money::from_cents(i64::MIN).checked_add(Money::from_cents(-1)), None);
    }

    /// Ten thousand dimes sum to exactly $1000.00, unlike an f64 accumulator.
    #[test]
    fn test_no_drift_over_many_additions() {
        let dime = Money::from_decimal_str("0.1").unwrap();
        let total = std::iter::repeat(dime)
            .take(10_000)
            .try_fold(Money::zero(), Money::checked_add)
            .unwrap();
        assert_eq!(total.cents(), 100_000);

        let float_total: f64 = std::iter::repeat(0.1_f64).take(10_000).sum();
        assert_ne!(float_total, 1000.0);
    }

    #[test]
    fn test_wire_float() {
        assert_eq!(Money::from_cents(9999).to_decimal_f64(), 99.99);
        assert_eq!(Money::from_cents(45000).to_decimal_f64(), 450.0);
    }
}
