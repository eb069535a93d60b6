use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{impl_additive_primitive, impl_from_primitive};

// ================================================================================================
// Domain Strong Types (NewTypes)
// ================================================================================================

/// A price level in the quote currency (the cash numeraire).
///
/// Used for open, high, low, close, limit prices and fill prices.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Price(pub f64);
impl_from_primitive!(Price, f64);
impl_additive_primitive!(Price, f64);

impl Price {
    /// Rounds to the currency minor unit (two decimals), ties to even.
    pub fn round_to_cents(self) -> Self {
        Self((self.0 * 100.0).round_ties_even() / 100.0)
    }
}

/// A whole number of units of an instrument.
///
/// Quantities held and traded are always multiples of the configured lot size.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Quantity(pub u64);
impl_from_primitive!(Quantity, u64);
impl_additive_primitive!(Quantity, u64);

impl Quantity {
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }
}

/// The human readable identifier of a tradable instrument (e.g. a ticker like `600519.SH`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Position of an instrument inside the asset universe (0-based, cash excluded).
///
/// Portfolio vectors reserve slot 0 for cash, so instrument `i` lives at slot `i + 1`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct InstrumentId(pub usize);
impl_from_primitive!(InstrumentId, usize);

impl InstrumentId {
    /// Index of this instrument in a cash-first portfolio vector.
    pub fn slot(&self) -> usize {
        self.0 + 1
    }
}

/// Direction of an order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// One daily bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
}

impl Ohlc {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open: Price(open),
            high: Price(high),
            low: Price(low),
            close: Price(close),
        }
    }

    /// A bar where nothing moved. Useful for illiquid days and tests.
    pub fn flat(price: f64) -> Self {
        Self::new(price, price, price, price)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.open.0, self.high.0, self.low.0, self.close.0]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_to_cents_uses_bankers_rounding() {
        assert_eq!(Price(10.125).round_to_cents(), Price(10.12));
        assert_eq!(Price(10.375).round_to_cents(), Price(10.38));
        assert_eq!(Price(99.999).round_to_cents(), Price(100.0));
    }

    #[test]
    fn instrument_slot_skips_cash() {
        assert_eq!(InstrumentId(0).slot(), 1);
        assert_eq!(InstrumentId(4).slot(), 5);
    }

    #[test]
    fn quantities_sum() {
        let total: Quantity = [Quantity(100), Quantity(300)].into_iter().sum();
        assert_eq!(total, Quantity(400));
    }
}
