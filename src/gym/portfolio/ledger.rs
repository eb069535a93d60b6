use std::collections::BTreeMap;

use chrono::NaiveDate;
use rand::{Rng, seq::SliceRandom};
use tracing::{debug, info, warn};

use crate::{
    data::domain::{InstrumentId, Ohlc, Price, Quantity, Side, Symbol},
    error::SystemError,
    gym::portfolio::{
        action::Action,
        order::{Order, OrderId},
        record::LedgerStep,
        vectors::{PortfolioVectors, normalize_weights},
    },
};

/// Market inputs of one rebalance, all dated on the trading day being stepped into.
#[derive(Debug, Clone, Copy)]
pub struct RebalanceCtx<'a> {
    pub date: NaiveDate,
    /// One bar per instrument, used to match pending orders.
    pub bars: &'a [Ohlc],
    /// One close per instrument (cash excluded), used for valuation and offers.
    pub prices: &'a [f64],
    /// A sanitized action with `N + 1` weights and offsets.
    pub action: &'a Action,
}

/// The authoritative record of cash, holdings and pending orders.
///
/// Holdings are stored as whole units so lot alignment holds by construction.
/// Only [`PortfolioLedger::resolve_pending_and_rebalance`] mutates them.
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    symbols: Vec<Symbol>,
    fee_rate: f64,
    lot_size: u64,

    cash: f64,
    positions: Vec<Quantity>,
    /// Closes the current holdings are valued at.
    prices: Vec<f64>,
    /// At most one pending order per instrument.
    book: BTreeMap<InstrumentId, Order>,
    next_order_id: u64,
}

impl PortfolioLedger {
    pub fn new(symbols: Vec<Symbol>, fee_rate: f64, lot_size: u64) -> Self {
        let n = symbols.len();
        Self {
            symbols,
            fee_rate,
            lot_size,
            cash: 0.0,
            positions: vec![Quantity::default(); n],
            prices: vec![0.0; n],
            book: BTreeMap::new(),
            next_order_id: 0,
        }
    }

    /// Back to all cash at `prices`, with an empty order book.
    pub fn reset(
        &mut self,
        initial_capital: f64,
        prices: &[f64],
    ) -> Result<PortfolioVectors, SystemError> {
        self.check_len("prices", prices.len(), self.symbols.len())?;
        self.cash = initial_capital;
        self.positions.iter_mut().for_each(|q| *q = Quantity::default());
        self.prices = prices.to_vec();
        self.book.clear();
        self.next_order_id = 0;
        Ok(self.vectors())
    }

    pub fn vectors(&self) -> PortfolioVectors {
        PortfolioVectors::new(self.cash, &self.prices, &self.positions)
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn positions(&self) -> &[Quantity] {
        &self.positions
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn pending_orders(&self) -> impl Iterator<Item = &Order> {
        self.book.values()
    }

    /// Settles yesterday's orders against today's bars, then places the orders that move
    /// the portfolio towards the target allocation.
    ///
    /// 1. Resolve every pending order; fills move cash and holdings, net of fees.
    /// 2. Value the portfolio at today's closes and clear the book.
    /// 3. Walk the instruments in an order drawn from `rng` and size one limit order each.
    ///    Buys are admitted against the cash not yet committed in this pass.
    ///
    /// State is only written once every check has passed.
    #[tracing::instrument(skip(self, ctx, rng), fields(date = %ctx.date))]
    pub fn resolve_pending_and_rebalance<R: Rng>(
        &mut self,
        ctx: RebalanceCtx<'_>,
        rng: &mut R,
    ) -> Result<LedgerStep, SystemError> {
        let n = self.symbols.len();
        self.check_len("bars", ctx.bars.len(), n)?;
        self.check_len("prices", ctx.prices.len(), n)?;
        self.check_len("weights", ctx.action.weights.len(), n + 1)?;
        self.check_len("offsets", ctx.action.offsets.len(), n + 1)?;

        let before = self.vectors();

        let (target, allocation_recovered) = normalize_weights(&ctx.action.weights);
        if allocation_recovered {
            warn!(weights = ?ctx.action.weights, "Target weights sum to zero, holding cash");
        }

        // === Resolution ===
        let mut cash = self.cash;
        let mut positions = self.positions.clone();
        let mut fees = 0.0;
        let mut resolved = Vec::with_capacity(self.book.len());

        for (id, pending) in &self.book {
            let bar = ctx.bars.get(id.0).ok_or_else(|| {
                SystemError::IndexOutOfBounds(format!("no bar for instrument {}", id.0))
            })?;
            let order = pending.clone().resolve(bar);

            if let Some(value) = order.fill_value() {
                let fee = value * self.fee_rate;
                let held = &mut positions[id.0];
                match order.side() {
                    Side::Buy => {
                        cash -= value + fee;
                        *held += order.quantity();
                    }
                    Side::Sell => {
                        let left = held.0.checked_sub(order.quantity().0).ok_or_else(|| {
                            SystemError::InvariantViolation(format!(
                                "sell of {} exceeds holding of {} in '{}'",
                                order.quantity().0,
                                held.0,
                                order.symbol()
                            ))
                        })?;
                        *held = Quantity(left);
                        cash += value - fee;
                    }
                }
                fees += fee;
                info!(
                    order_id = order.id().0,
                    symbol = %order.symbol(),
                    side = %order.side(),
                    qty = order.quantity().0,
                    fill = ?order.fill_price(),
                    "Order traded"
                );
            } else {
                debug!(order_id = order.id().0, status = %order.status(), "Order not filled");
            }
            resolved.push(order);
        }

        let after = PortfolioVectors::new(cash, ctx.prices, &positions);
        let total = after.total();
        let current = after.weights();

        // === Placement ===
        let mut available = cash;
        let mut next_id = self.next_order_id;
        let mut book = BTreeMap::new();
        let mut placed = Vec::new();

        let mut sequence = (0..n).collect::<Vec<_>>();
        sequence.shuffle(rng);

        let lot = self.lot_size as f64;
        for i in sequence {
            let slot = i + 1;
            let offer =
                Price(ctx.prices[i] * (1.0 + ctx.action.offsets[slot] / 100.0)).round_to_cents();
            if !(offer.0 > 0.0) {
                continue;
            }

            let delta = (target[slot] - current[slot]) * total;
            let side = if delta > 0.0 { Side::Buy } else { Side::Sell };
            let lots = (delta.abs() / (offer.0 * lot)).round_ties_even();
            let mut quantity = Quantity(lots as u64 * self.lot_size);
            if side == Side::Sell {
                quantity = quantity.min(positions[i]);
            }
            if quantity.is_zero() {
                continue;
            }

            let order = Order::submit(
                OrderId(next_id),
                InstrumentId(i),
                self.symbols[i].clone(),
                side,
                offer,
                quantity,
                ctx.date,
            );
            next_id += 1;

            if side == Side::Buy {
                if order.notional() > available {
                    warn!(
                        symbol = %order.symbol(),
                        notional = order.notional(),
                        available,
                        "Buy rejected, insufficient cash"
                    );
                    placed.push(order.rejected());
                    continue;
                }
                available -= order.notional();
            }

            debug!(
                order_id = order.id().0,
                symbol = %order.symbol(),
                side = %side,
                qty = quantity.0,
                limit = offer.0,
                "Order placed"
            );
            book.insert(InstrumentId(i), order.clone());
            placed.push(order);
        }

        // === Commit ===
        self.cash = cash;
        self.positions = positions;
        self.prices = ctx.prices.to_vec();
        self.book = book;
        self.next_order_id = next_id;

        Ok(LedgerStep {
            resolved,
            placed,
            before,
            after,
            position: available,
            fees,
            allocation_recovered,
        })
    }

    fn check_len(&self, what: &str, got: usize, expected: usize) -> Result<(), SystemError> {
        if got != expected {
            return Err(SystemError::IndexOutOfBounds(format!(
                "{what}: expected {expected} entries, got {got}"
            )));
        }
        Ok(())
    }
}
