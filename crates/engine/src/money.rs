use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an amount string was not accepted.
///
/// The two variants re-prompt identically in the dialogue, but tests and logs
/// care about the distinction.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    #[error("malformed amount")]
    Malformed,
    #[error("amount must be positive")]
    NotPositive,
}

/// Signed money amount represented as **integer kopecks**.
///
/// Use this type for all monetary values (transaction amounts, report sums)
/// to avoid floating-point drift.
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Creates a new amount from integer kopecks.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in kopecks.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Formats the amount with a currency code, e.g. `"1500.00 RUB"`.
    #[must_use]
    pub fn format(self, currency: &str) -> String {
        format!("{self} {currency}")
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = abs / 100;
        let minor = abs % 100;
        write!(f, "{sign}{major}.{minor:02}")
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

/// Parses a user-supplied amount string into kopecks.
///
/// Accepted grammar, after stripping surrounding whitespace and internal
/// spaces (thousand separators) and normalizing a `,` decimal separator to
/// `.`: an optional leading sign, digits, optionally one period, optionally
/// trailing digits. Fractions beyond two digits are rounded half away from
/// zero.
///
/// A parsed value must be strictly positive; `0` and negative values fail
/// with [`AmountError::NotPositive`] rather than [`AmountError::Malformed`].
pub fn parse_amount(input: &str) -> Result<MoneyCents, AmountError> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return Err(AmountError::Malformed);
    }

    let (negative, rest) = if let Some(stripped) = cleaned.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = cleaned.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, cleaned.as_str())
    };

    let mut parts = rest.split('.');
    let major_str = parts.next().unwrap_or("");
    let frac_str = parts.next().unwrap_or("");
    if parts.next().is_some() {
        return Err(AmountError::Malformed);
    }

    if major_str.is_empty() || !major_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountError::Malformed);
    }
    if !frac_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountError::Malformed);
    }

    let major: i64 = major_str.parse().map_err(|_| AmountError::Malformed)?;

    let mut cents: i64 = match frac_str.len() {
        0 => 0,
        1 => frac_str.parse::<i64>().map_err(|_| AmountError::Malformed)? * 10,
        _ => frac_str[..2]
            .parse::<i64>()
            .map_err(|_| AmountError::Malformed)?,
    };
    if frac_str.len() > 2 && frac_str.as_bytes()[2] >= b'5' {
        cents += 1;
    }

    let total = major
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or(AmountError::Malformed)?;

    let signed = if negative { -total } else { total };
    if signed <= 0 {
        return Err(AmountError::NotPositive);
    }
    Ok(MoneyCents(signed))
}

impl FromStr for MoneyCents {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_two_decimals() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(1).to_string(), "0.01");
        assert_eq!(MoneyCents::new(1050).to_string(), "10.50");
        assert_eq!(MoneyCents::new(-1050).to_string(), "-10.50");
        assert_eq!(MoneyCents::new(150_000).format("RUB"), "1500.00 RUB");
    }

    #[test]
    fn parse_plain_integer() {
        assert_eq!(parse_amount("1000").unwrap().cents(), 100_000);
    }

    #[test]
    fn parse_strips_thousand_separators() {
        assert_eq!(parse_amount("1 500").unwrap().cents(), 150_000);
        assert_eq!(parse_amount("  12 345,60 ").unwrap().cents(), 1_234_560);
    }

    #[test]
    fn parse_accepts_comma_decimal() {
        assert_eq!(parse_amount("2,50").unwrap().cents(), 250);
        assert_eq!(parse_amount("2.5").unwrap().cents(), 250);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_amount("abc"), Err(AmountError::Malformed));
        assert_eq!(parse_amount(""), Err(AmountError::Malformed));
        assert_eq!(parse_amount("1.2.3"), Err(AmountError::Malformed));
        assert_eq!(parse_amount("12f"), Err(AmountError::Malformed));
        assert_eq!(parse_amount(".5"), Err(AmountError::Malformed));
    }

    #[test]
    fn zero_and_negative_fail_validation_not_parsing() {
        assert_eq!(parse_amount("0"), Err(AmountError::NotPositive));
        assert_eq!(parse_amount("0.00"), Err(AmountError::NotPositive));
        assert_eq!(parse_amount("-5"), Err(AmountError::NotPositive));
    }

    #[test]
    fn long_fractions_round_half_away_from_zero() {
        assert_eq!(parse_amount("2.505").unwrap().cents(), 251);
        assert_eq!(parse_amount("2.504").unwrap().cents(), 250);
        assert_eq!(parse_amount("0.999").unwrap().cents(), 100);
    }

    #[test]
    fn parse_format_roundtrip_is_idempotent() {
        for s in ["1000", "1 500", "2,50", "0.1", "12.34"] {
            let once = parse_amount(s).unwrap();
            let twice = parse_amount(&once.to_string()).unwrap();
            assert_eq!(once, twice, "roundtrip changed {s}");
        }
    }
}
