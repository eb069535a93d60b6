#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use folio_gym::prelude::*;

pub const EPS: f64 = 1e-6;

/// The `i`-th fixture day, counting from 2024-01-02.
pub fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.checked_add_days(Days::new(i as u64)))
        .unwrap()
}

/// Flat bars (open = high = low = close) at `closes`, one per fixture day.
pub fn flat_history(symbol: &str, closes: &[f64]) -> InstrumentHistory {
    closes
        .iter()
        .enumerate()
        .fold(InstrumentHistory::new(symbol), |h, (i, c)| {
            h.with_bar(day(i), Ohlc::flat(*c))
        })
}

/// Bars around `closes` with a 2% intraday range.
pub fn ranged_history(symbol: &str, closes: &[f64]) -> InstrumentHistory {
    closes
        .iter()
        .enumerate()
        .fold(InstrumentHistory::new(symbol), |h, (i, c)| {
            h.with_bar(day(i), Ohlc::new(*c, c * 1.02, c * 0.98, *c))
        })
}

/// A smooth, strictly positive price path.
pub fn wiggle(base: f64, phase: f64, len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| base + 5.0 * (i as f64 * 0.7 + phase).sin())
        .collect()
}

pub fn market(histories: Vec<InstrumentHistory>) -> Arc<MarketData> {
    let builder = histories
        .into_iter()
        .fold(MarketDataBuilder::new(), |b, h| b.add_instrument(h));
    Arc::new(builder.build().unwrap())
}

/// Three instruments over 30 days.
pub fn three_asset_market() -> Arc<MarketData> {
    market(vec![
        ranged_history("AAA", &wiggle(100.0, 0.0, 30)),
        ranged_history("BBB", &wiggle(50.0, 1.0, 30)),
        ranged_history("CCC", &wiggle(20.0, 2.0, 30)),
    ])
}

pub fn weights_action(weights: &[f64]) -> Action {
    Action::new(weights.to_vec(), vec![0.0; weights.len()])
}
