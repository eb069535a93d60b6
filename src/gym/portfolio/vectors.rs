use serde::{Deserialize, Serialize};

use crate::data::domain::Quantity;

/// Below this total, an allocation carries no usable information.
pub const ALLOCATION_EPSILON: f64 = 1e-7;

/// Prices and holdings of the whole universe at one instant, cash first.
///
/// `P[0]` is always `1.0` and `V[0]` is the cash balance. Asset values and weights are
/// derived on demand and never stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioVectors {
    prices: Vec<f64>,
    holdings: Vec<f64>,
}

impl PortfolioVectors {
    /// `prices` excludes cash; `positions[i]` belongs to `prices[i]`.
    pub fn new(cash: f64, prices: &[f64], positions: &[Quantity]) -> Self {
        let prices = std::iter::once(1.0).chain(prices.iter().copied()).collect();
        let holdings = std::iter::once(cash)
            .chain(positions.iter().map(Quantity::as_f64))
            .collect();
        Self { prices, holdings }
    }

    /// `P`
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// `V`
    pub fn holdings(&self) -> &[f64] {
        &self.holdings
    }

    pub fn cash(&self) -> f64 {
        self.holdings.first().copied().unwrap_or(0.0)
    }

    /// `A = P ⊙ V`
    pub fn assets(&self) -> Vec<f64> {
        self.prices
            .iter()
            .zip(&self.holdings)
            .map(|(p, v)| p * v)
            .collect()
    }

    /// `sum(A)`
    pub fn total(&self) -> f64 {
        self.prices.iter().zip(&self.holdings).map(|(p, v)| p * v).sum()
    }

    /// `W = A / sum(A)`. A portfolio worth nothing is reported as all cash.
    pub fn weights(&self) -> Vec<f64> {
        let (w, _) = normalize_weights(&self.assets());
        w
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Renormalizes `raw` so it sums to one.
///
/// A sum below [`ALLOCATION_EPSILON`] is treated as an invalid allocation and replaced by
/// all cash `[1, 0, .., 0]`; the second element reports that recovery.
pub fn normalize_weights(raw: &[f64]) -> (Vec<f64>, bool) {
    let sum: f64 = raw.iter().sum();
    if !(sum >= ALLOCATION_EPSILON) {
        let mut w = vec![0.0; raw.len()];
        if let Some(cash) = w.first_mut() {
            *cash = 1.0;
        }
        return (w, true);
    }
    (raw.iter().map(|x| x / sum).collect(), false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assets_are_price_times_holdings() {
        let v = PortfolioVectors::new(500.0, &[10.0, 20.0], &[Quantity(100), Quantity(200)]);
        assert_eq!(v.prices(), &[1.0, 10.0, 20.0]);
        assert_eq!(v.assets(), vec![500.0, 1_000.0, 4_000.0]);
        assert_eq!(v.total(), 5_500.0);
        let w = v.weights();
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalize_recovers_degenerate_allocations() {
        let (w, recovered) = normalize_weights(&[0.0, 0.0, 0.0]);
        assert!(recovered);
        assert_eq!(w, vec![1.0, 0.0, 0.0]);

        let (w, recovered) = normalize_weights(&[1.0, 1.0, 2.0]);
        assert!(!recovered);
        assert_eq!(w, vec![0.25, 0.25, 0.5]);
    }
}
