//! Money helpers built on decimal arithmetic.
//!
//! Prices travel as JSON numbers (`109.95`) but are held as [`Decimal`] so
//! that subtotals and order totals never accumulate float error. Payment
//! providers want integer minor units, which [`to_minor_units`] produces.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes accepted by the payment endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl CurrencyCode {
    /// Lowercase code as Stripe expects it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
            Self::Gbp => "gbp",
            Self::Cad => "cad",
            Self::Aud => "aud",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            "gbp" => Ok(Self::Gbp),
            "cad" => Ok(Self::Cad),
            "aud" => Ok(Self::Aud),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// Convert a major-unit amount (dollars) into minor units (cents).
///
/// Rounds half away from zero. Returns `None` if the result does not fit in
/// an `i64` or the scaling overflows the decimal range.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Convert minor units (cents) back into a major-unit amount.
#[must_use]
pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Sum of `price × quantity` over an iterator of lines.
///
/// Returns `None` if any product or the running sum leaves the decimal range.
pub fn line_total<I>(lines: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (Decimal, u32)>,
{
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |total, (price, quantity)| {
            total.checked_add(price.checked_mul(Decimal::from(quantity))?)
        })
}
