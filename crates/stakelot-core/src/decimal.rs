//! Fixed-point decimal with an 18-digit fractional part
//!
//! A [`Decimal`] stores `mantissa / 10^18` in a 256-bit unsigned mantissa.
//! All reward-per-token math goes through this type so that integer
//! truncation happens in exactly one place ([`Decimal::floor`]).
//!
//! ```text
//!   value  = mantissa / 10^EXPONENT
//!   1.5    = 1_500_000_000_000_000_000
//!   0.1    =   100_000_000_000_000_000
//! ```
//!
//! There is no signed representation: [`Decimal::sub`] fails with
//! [`CoreError::Underflow`] instead of wrapping.

use crate::error::{CoreError, Result};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal exponent shared by every [`Decimal`]
pub const EXPONENT: usize = 18;

/// `10^EXPONENT` as a 256-bit integer
pub fn scale() -> U256 {
    U256::exp10(EXPONENT)
}

/// Unsigned fixed-point number with 18 fractional digits
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Decimal {
    mantissa: U256,
}

impl Decimal {
    /// Zero
    pub const ZERO: Self = Self {
        mantissa: U256([0u64; 4]),
    };

    /// Wrap a raw mantissa (already scaled by `10^18`)
    pub fn from_mantissa(mantissa: U256) -> Self {
        Self { mantissa }
    }

    /// Whole number `n`
    pub fn from_integer(n: impl Into<U256>) -> Result<Self> {
        let mantissa = n.into().checked_mul(scale()).ok_or(CoreError::Overflow)?;
        Ok(Self { mantissa })
    }

    /// `num / den` keeping 18 decimal digits.
    ///
    /// The numerator is scaled up before dividing. A zero denominator yields
    /// zero rather than an error.
    pub fn from_ratio(num: impl Into<U256>, den: impl Into<U256>) -> Result<Self> {
        let den = den.into();
        if den.is_zero() {
            return Ok(Self::ZERO);
        }
        let scaled = num.into().checked_mul(scale()).ok_or(CoreError::Overflow)?;
        Ok(Self {
            mantissa: scaled / den,
        })
    }

    pub fn mantissa(&self) -> U256 {
        self.mantissa
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    pub fn add(self, other: Self) -> Result<Self> {
        let mantissa = self
            .mantissa
            .checked_add(other.mantissa)
            .ok_or(CoreError::Overflow)?;
        Ok(Self { mantissa })
    }

    pub fn sub(self, other: Self) -> Result<Self> {
        let mantissa = self
            .mantissa
            .checked_sub(other.mantissa)
            .ok_or(CoreError::Underflow)?;
        Ok(Self { mantissa })
    }

    /// Multiply by an integer scalar
    pub fn mul(self, scalar: impl Into<U256>) -> Result<Self> {
        let mantissa = self
            .mantissa
            .checked_mul(scalar.into())
            .ok_or(CoreError::Overflow)?;
        Ok(Self { mantissa })
    }

    /// Divide by an integer scalar; dividing by zero yields zero
    pub fn div(self, scalar: impl Into<U256>) -> Self {
        let scalar = scalar.into();
        if scalar.is_zero() {
            return Self::ZERO;
        }
        Self {
            mantissa: self.mantissa / scalar,
        }
    }

    /// Integer part, fractional digits discarded
    pub fn floor(&self) -> U256 {
        self.mantissa / scale()
    }

    /// Fractional part as a mantissa in `[0, 10^18)`
    pub fn fract(&self) -> U256 {
        self.mantissa % scale()
    }

    pub fn lte(&self, other: &Self) -> bool {
        self.mantissa <= other.mantissa
    }

    /// `floor(amount * self)` as a token amount
    pub fn mul_floor(&self, amount: u128) -> Result<u128> {
        let product = self.mul(amount)?.floor();
        to_u128(product)
    }
}

/// Narrow a 256-bit integer to `u128`
pub fn to_u128(value: U256) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(CoreError::Overflow);
    }
    Ok(value.low_u128())
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({})", self)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:0>18}", self.floor(), self.fract())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ratio_keeps_precision() {
        let d = Decimal::from_ratio(1u64, 3u64).unwrap();
        assert_eq!(d.mantissa(), U256::from(333_333_333_333_333_333u128));
        assert_eq!(d.floor(), U256::zero());
    }

    #[test]
    fn test_zero_denominator_short_circuits() {
        assert_eq!(Decimal::from_ratio(10u64, 0u64).unwrap(), Decimal::ZERO);
        assert_eq!(Decimal::from_integer(5u64).unwrap().div(0u64), Decimal::ZERO);
    }

    #[test]
    fn test_sub_underflow() {
        let one = Decimal::from_integer(1u64).unwrap();
        let two = Decimal::from_integer(2u64).unwrap();
        assert_eq!(one.sub(two), Err(CoreError::Underflow));
        assert_eq!(two.sub(one).unwrap(), one);
    }

    #[test]
    fn test_floor_and_fract() {
        let d = Decimal::from_ratio(7u64, 2u64).unwrap();
        assert_eq!(d.floor(), U256::from(3u8));
        assert_eq!(d.fract(), U256::from(500_000_000_000_000_000u128));
        assert_eq!(format!("{}", d), "3.500000000000000000");
    }

    #[test]
    fn test_mul_floor_amount() {
        let rate = Decimal::from_ratio(1u64, 10u64).unwrap();
        assert_eq!(rate.mul_floor(55).unwrap(), 5);
    }

    #[test]
    fn test_mul_overflow() {
        let big = Decimal::from_mantissa(U256::MAX);
        assert_eq!(big.mul(2u8), Err(CoreError::Overflow));
        assert_eq!(big.add(big), Err(CoreError::Overflow));
    }

    #[test]
    fn test_ordering() {
        let a = Decimal::from_ratio(1u64, 4u64).unwrap();
        let b = Decimal::from_ratio(1u64, 2u64).unwrap();
        assert!(a.lte(&b));
        assert!(a.lte(&a));
        assert!(!b.lte(&a));
        assert!(a < b);
    }
}
