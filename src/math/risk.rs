use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Added to the denominator of the Sharpe ratio so a flat series does not divide by zero.
pub const SHARPE_EPSILON: f64 = 1e-7;

/// Configuration for the per-step risk diagnostics.
///
/// # Numeric Representation
/// - **Rates** are stored in **Basis Points (bps)** (`1 bps = 0.01%`).
/// - **Frequency** is the number of observations per year (`250` trading days).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RiskMetricsConfig {
    /// Observations per year used to annualize the Sharpe ratio. Must be > 0.
    periods_per_year: u16,

    /// The risk-free rate in **Basis Points** (bps), subtracted from every observation.
    ///
    /// # Conversions
    /// - `200` bps = 2.0% (`0.02`)
    /// - `0` bps   = 0.0% (`0.0`)
    risk_free_rate_bps: u16,
}

impl Default for RiskMetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 250,
            risk_free_rate_bps: 200,
        }
    }
}

impl RiskMetricsConfig {
    /// Creates a new config with the given annualization frequency.
    ///
    /// # Validation
    /// Returns error if `periods_per_year` is 0.
    pub fn new(periods_per_year: u16) -> Result<Self, EnvError> {
        if periods_per_year == 0 {
            return Err(EnvError::InvalidRiskMetricsConfig(
                "Periods per year must be positive (> 0)".to_string(),
            ));
        }

        Ok(Self {
            periods_per_year,
            ..Default::default()
        })
    }

    /// Set Risk Free Rate.
    ///
    /// # Example
    /// `200` = 2.0%.
    pub fn with_risk_free_rate_bps(self, bps: u16) -> Self {
        Self {
            risk_free_rate_bps: bps,
            ..self
        }
    }

    pub fn periods_per_year(&self) -> u16 {
        self.periods_per_year
    }

    pub fn risk_free_rate_bps(&self) -> u16 {
        self.risk_free_rate_bps
    }

    /// Helper to convert the BPS rate to a normalized `f64` (e.g., `200` -> `0.02`).
    pub fn risk_free_rate_f64(&self) -> f64 {
        f64::from(self.risk_free_rate_bps) / 10_000.0
    }

    pub fn sharpe(&self, xs: &[f64]) -> f64 {
        sharpe(
            xs,
            f64::from(self.periods_per_year),
            self.risk_free_rate_f64(),
        )
    }

    /// Sharpe ratio and maximum drawdown of `xs`.
    pub fn snapshot(&self, xs: &[f64]) -> RiskSnapshot {
        RiskSnapshot {
            sharpe: self.sharpe(xs),
            max_drawdown: max_drawdown(xs),
        }
    }
}

/// Risk diagnostics of a series at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub sharpe: f64,
    pub max_drawdown: f64,
}

/// Annualized Sharpe ratio of `xs` against a constant risk-free rate `rf`.
///
/// `sqrt(freq) * mean(xs - rf) / (std(xs - rf) + 1e-7)` with the population standard
/// deviation. An empty series yields `0.0`.
pub fn sharpe(xs: &[f64], freq: f64, rf: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().map(|x| x - rf).sum::<f64>() / n;
    let var = xs
        .iter()
        .map(|x| {
            let d = x - rf - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    freq.sqrt() * mean / (var.sqrt() + SHARPE_EPSILON)
}

/// Largest relative decline from a running peak, starting with the peak at `xs[0]`.
///
/// Returns `0.0` for empty or non-decreasing series. The peak must stay positive for the
/// ratio to be meaningful; a non-positive peak contributes no drawdown.
pub fn max_drawdown(xs: &[f64]) -> f64 {
    let Some(&first) = xs.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut mdd = 0.0_f64;
    for &x in xs {
        if x > peak {
            peak = x;
        }
        if peak > 0.0 {
            mdd = mdd.max((peak - x) / peak);
        }
    }
    mdd
}

#[cfg(test)]
mod test {
    use super::*;

    // ============================================================================================
    // Max Drawdown
    // ============================================================================================

    #[test]
    fn max_drawdown_of_known_series() {
        let mdd = max_drawdown(&[1.0, 1.2, 0.9, 0.9]);
        assert!((mdd - 0.25).abs() < 1e-12, "got {mdd}");
    }

    #[test]
    fn max_drawdown_is_zero_for_non_decreasing_series() {
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_eq!(max_drawdown(&[1.0]), 0.0);
        assert_eq!(max_drawdown(&[1.0, 1.0, 1.1, 1.5]), 0.0);
    }

    #[test]
    fn max_drawdown_is_bounded() {
        let xs = [2.0, 0.5, 3.0, 0.1, 4.0];
        let mdd = max_drawdown(&xs);
        assert!((0.0..=1.0).contains(&mdd));
        assert!((mdd - (3.0 - 0.1) / 3.0).abs() < 1e-12);
    }

    // ============================================================================================
    // Sharpe
    // ============================================================================================

    #[test]
    fn sharpe_of_constant_series_is_mean_over_epsilon() {
        let s = sharpe(&[1.0, 1.0], 250.0, 0.0);
        assert!((s - 250.0_f64.sqrt() / SHARPE_EPSILON).abs() / s < 1e-9);
    }

    #[test]
    fn sharpe_uses_population_std() {
        let xs = [1.0, 3.0];
        // mean 2, population std 1
        let s = sharpe(&xs, 4.0, 0.0);
        assert!((s - 2.0 * 2.0 / (1.0 + SHARPE_EPSILON)).abs() < 1e-9);
    }

    #[test]
    fn sharpe_of_empty_series_is_zero() {
        assert_eq!(sharpe(&[], 250.0, 0.02), 0.0);
    }

    // ============================================================================================
    // Config
    // ============================================================================================

    #[test]
    fn config_defaults_and_validation() {
        let cfg = RiskMetricsConfig::default();
        assert_eq!(cfg.periods_per_year(), 250);
        assert!((cfg.risk_free_rate_f64() - 0.02).abs() < 1e-12);
        assert!(RiskMetricsConfig::new(0).is_err());

        let snap = cfg.snapshot(&[1.0, 1.2, 0.9, 0.9]);
        assert!((snap.max_drawdown - 0.25).abs() < 1e-12);
    }
}
