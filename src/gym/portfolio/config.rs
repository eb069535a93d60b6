use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::EnvError,
    math::{reward::RewardKind, risk::RiskMetricsConfig},
};

/// Configuration blueprint for a portfolio [`Environment`](crate::gym::portfolio::env::Environment).
///
/// # Simulation Settings
/// - `initial_capital`, `fee_rate`, `lot_size`: ledger accounting
/// - `window_len`: trailing quote days per observation
/// - `start`, `stop`, `max_episode_len`: the decision date range
///
/// # Reward Settings
/// - `target_return`: the return that maps to a target reward of 1
/// - `drawdown_decay`: discount applied to the drawdown penalty per step
/// - `loss_threshold`: the cumulative reward below which an episode stops
/// - `reward_kind`: the variant returned by `step`
///
/// # Example
///
/// ```no_run
/// # use folio_gym::prelude::*;
/// let cfg = EnvConfig::default()
///     .with_initial_capital(250_000.0)
///     .with_window_len(5)
///     .with_reward_kind(RewardKind::Log)
///     .with_seed(7);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    // ========================================================================
    // Ledger
    // ========================================================================
    /// Starting cash, in units of the quote currency.
    initial_capital: f64,

    /// Proportional transaction cost charged on every fill (`0.001` = 10 bps).
    fee_rate: f64,

    /// Units per lot. Every traded quantity is a multiple of it.
    lot_size: u64,

    // ========================================================================
    // Observation
    // ========================================================================
    /// Number of trailing trading days in the quote window.
    window_len: usize,

    // ========================================================================
    // Decision Range
    // ========================================================================
    /// First decision date. Defaults to the first date with a full quote window.
    start: Option<NaiveDate>,

    /// Last decision date (inclusive). Defaults to the end of the calendar.
    stop: Option<NaiveDate>,

    /// Maximum number of decision dates per episode.
    max_episode_len: usize,

    // ========================================================================
    // Rewards
    // ========================================================================
    /// Return that yields a target reward of exactly 1 (`0.6` = 60%).
    target_return: f64,

    /// Per-step decay of the drawdown penalty.
    drawdown_decay: f64,

    /// Circuit breaker on the cumulative reward (`0.9` = stop after a 10% loss).
    loss_threshold: f64,

    reward_kind: RewardKind,

    risk_metrics_cfg: RiskMetricsConfig,

    // === Invariants ===
    /// Seed of the generator that shuffles the order placement sequence.
    seed: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            fee_rate: 0.001,
            lot_size: 100,
            window_len: 1,
            start: None,
            stop: None,
            max_episode_len: 200,
            target_return: 0.6,
            drawdown_decay: 0.99,
            loss_threshold: 0.9,
            reward_kind: RewardKind::default(),
            risk_metrics_cfg: RiskMetricsConfig::default(),
            seed: 0,
        }
    }
}

// ================================================================================================
// Builder Methods
// ================================================================================================

impl EnvConfig {
    pub fn with_initial_capital(self, initial_capital: f64) -> Self {
        Self {
            initial_capital,
            ..self
        }
    }

    pub fn with_fee_rate(self, fee_rate: f64) -> Self {
        Self { fee_rate, ..self }
    }

    pub fn with_lot_size(self, lot_size: u64) -> Self {
        Self { lot_size, ..self }
    }

    pub fn with_window_len(self, window_len: usize) -> Self {
        Self { window_len, ..self }
    }

    pub fn with_start(self, start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            ..self
        }
    }

    pub fn with_stop(self, stop: NaiveDate) -> Self {
        Self {
            stop: Some(stop),
            ..self
        }
    }

    /// `0` disables the limit.
    pub fn with_max_episode_len(self, max_episode_len: usize) -> Self {
        Self {
            max_episode_len,
            ..self
        }
    }

    pub fn with_target_return(self, target_return: f64) -> Self {
        Self {
            target_return,
            ..self
        }
    }

    pub fn with_drawdown_decay(self, drawdown_decay: f64) -> Self {
        Self {
            drawdown_decay,
            ..self
        }
    }

    pub fn with_loss_threshold(self, loss_threshold: f64) -> Self {
        Self {
            loss_threshold,
            ..self
        }
    }

    pub fn with_reward_kind(self, reward_kind: RewardKind) -> Self {
        Self {
            reward_kind,
            ..self
        }
    }

    pub fn with_risk_metrics_cfg(self, cfg: RiskMetricsConfig) -> Self {
        Self {
            risk_metrics_cfg: cfg,
            ..self
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }
}

// ================================================================================================
// Getters
// ================================================================================================

impl EnvConfig {
    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    pub fn lot_size(&self) -> u64 {
        self.lot_size
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn stop(&self) -> Option<NaiveDate> {
        self.stop
    }

    pub fn max_episode_len(&self) -> usize {
        self.max_episode_len
    }

    pub fn target_return(&self) -> f64 {
        self.target_return
    }

    /// The wealth multiple handed to the target transform (`1 + target_return`).
    pub fn target_multiple(&self) -> f64 {
        1.0 + self.target_return
    }

    pub fn drawdown_decay(&self) -> f64 {
        self.drawdown_decay
    }

    pub fn loss_threshold(&self) -> f64 {
        self.loss_threshold
    }

    pub fn reward_kind(&self) -> RewardKind {
        self.reward_kind
    }

    pub fn risk_metrics_cfg(&self) -> RiskMetricsConfig {
        self.risk_metrics_cfg
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

// ================================================================================================
// Validation & Identity
// ================================================================================================

impl EnvConfig {
    /// Computes a deterministic hash of this configuration.
    ///
    /// Used as the run id of an evaluation.
    pub fn hash(&self) -> Result<String, EnvError> {
        let mut hasher = blake3::Hasher::new();
        let bytes = postcard::to_stdvec(self).map_err(EnvError::Encoding)?;
        hasher.update(&bytes);
        Ok(format!("{}", hasher.finalize()))
    }

    /// Checks every numeric parameter against its admissible range.
    pub fn validate(&self) -> Result<(), EnvError> {
        let invalid = |msg: String| Err(EnvError::InvalidConfig(msg));

        if !(self.initial_capital > 0.0) || !self.initial_capital.is_finite() {
            return invalid(format!(
                "initial capital must be positive, got {}",
                self.initial_capital
            ));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return invalid(format!("fee rate must be in [0, 1), got {}", self.fee_rate));
        }
        if self.lot_size == 0 {
            return invalid("lot size must be positive".to_string());
        }
        if self.window_len == 0 {
            return invalid("window length must be positive".to_string());
        }
        if !(self.target_return > 0.0) || !self.target_return.is_finite() {
            return invalid(format!(
                "target return must be positive, got {}",
                self.target_return
            ));
        }
        if !(0.0..=1.0).contains(&self.drawdown_decay) {
            return invalid(format!(
                "drawdown decay must be in [0, 1], got {}",
                self.drawdown_decay
            ));
        }
        if !self.loss_threshold.is_finite() {
            return invalid(format!(
                "loss threshold must be finite, got {}",
                self.loss_threshold
            ));
        }
        if let (Some(start), Some(stop)) = (self.start, self.stop)
            && stop < start
        {
            return invalid(format!("stop {stop} precedes start {start}"));
        }
        if self.risk_metrics_cfg.periods_per_year() == 0 {
            return Err(EnvError::InvalidRiskMetricsConfig(
                "Periods per year must be positive (> 0)".to_string(),
            ));
        }
        Ok(())
    }
}
