use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    data::domain::{InstrumentId, Ohlc, Price, Quantity, Side, Symbol},
    impl_from_primitive,
};

/// Unique, monotonically increasing identifier of an order within an episode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct OrderId(pub u64);
impl_from_primitive!(OrderId, u64);

/// Lifecycle state of an order.
///
/// ```md
/// Submitted --resolve--> Traded | Cancelled
/// Rejected  (assigned at creation, terminal)
/// ```
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
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for the next trading day's bar.
    Submitted,
    /// Filled in full at `fill_price`.
    Traded,
    /// The limit was not reached.
    Cancelled,
    /// Not enough cash at admission.
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Submitted)
    }
}

/// A day limit order for a whole number of lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    instrument: InstrumentId,
    symbol: Symbol,
    side: Side,
    limit_price: Price,
    quantity: Quantity,
    status: OrderStatus,
    fill_price: Option<Price>,
    placed_on: NaiveDate,
}

impl Order {
    /// Creates an order in `Submitted` state.
    pub fn submit(
        id: OrderId,
        instrument: InstrumentId,
        symbol: Symbol,
        side: Side,
        limit_price: Price,
        quantity: Quantity,
        placed_on: NaiveDate,
    ) -> Self {
        Self {
            id,
            instrument,
            symbol,
            side,
            limit_price,
            quantity,
            status: OrderStatus::Submitted,
            fill_price: None,
            placed_on,
        }
    }

    /// Turns a freshly created order into an audit-only `Rejected` record.
    pub fn rejected(self) -> Self {
        Self {
            status: OrderStatus::Rejected,
            ..self
        }
    }

    /// Matches a submitted order against the next trading day's bar.
    ///
    /// - Buy: trades iff `limit >= low`, at `min(limit, high)`.
    /// - Sell: trades iff `limit <= high`, at `max(limit, low)`.
    ///
    /// Orders in any other state are returned unchanged.
    pub fn resolve(self, bar: &Ohlc) -> Self {
        if self.status != OrderStatus::Submitted {
            return self;
        }

        let limit = self.limit_price;
        let fill = match self.side {
            Side::Buy if limit >= bar.low => Some(if limit < bar.high { limit } else { bar.high }),
            Side::Sell if limit <= bar.high => Some(if limit > bar.low { limit } else { bar.low }),
            _ => None,
        };

        match fill {
            Some(price) => Self {
                status: OrderStatus::Traded,
                fill_price: Some(price),
                ..self
            },
            None => Self {
                status: OrderStatus::Cancelled,
                ..self
            },
        }
    }

    /// `limit_price * quantity`, the cash reserved at admission.
    pub fn notional(&self) -> f64 {
        self.limit_price.0 * self.quantity.as_f64()
    }

    /// `fill_price * quantity` for traded orders.
    pub fn fill_value(&self) -> Option<f64> {
        self.fill_price.map(|p| p.0 * self.quantity.as_f64())
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn limit_price(&self) -> Price {
        self.limit_price
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn fill_price(&self) -> Option<Price> {
        self.fill_price
    }

    pub fn placed_on(&self) -> NaiveDate {
        self.placed_on
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Submitted
    }

    pub fn is_traded(&self) -> bool {
        self.status == OrderStatus::Traded
    }
}
