//! Non-negative currency amounts.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Amount in the smallest currency unit (e.g. rupiah, cents).
///
/// Always non-negative. Arithmetic is checked; callers decide what an
/// overflow means for them.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// Build from an untrusted signed amount (form input, JSON).
    pub fn try_from_signed(amount: i64) -> DomainResult<Self> {
        u64::try_from(amount)
            .map(Self)
            .map_err(|_| DomainError::validation(format!("amount cannot be negative: {amount}")))
    }

    pub fn amount(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// `self * quantity`, e.g. a line total from a unit price.
    pub fn checked_mul(self, quantity: u64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }
}

impl ValueObject for Money {}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for Money {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn negative_input_is_rejected() {
        assert!(Money::try_from_signed(-1).is_err());
        assert_eq!(Money::try_from_signed(0).unwrap(), Money::ZERO);
        assert_eq!(Money::try_from_signed(1000).unwrap(), Money::new(1000));
    }

    #[test]
    fn multiplication_overflow_is_reported() {
        assert_eq!(Money::new(u64::MAX).checked_mul(2), None);
        assert_eq!(Money::new(1000).checked_mul(3), Some(Money::new(3000)));
    }

    proptest! {
        #[test]
        fn checked_mul_agrees_with_wide_arithmetic(price in 0u64..u64::MAX, qty in 0u64..1_000_000u64) {
            let wide = price as u128 * qty as u128;
            match Money::new(price).checked_mul(qty) {
                Some(total) => prop_assert_eq!(total.amount() as u128, wide),
                None => prop_assert!(wide > u64::MAX as u128),
            }
        }
    }
}
