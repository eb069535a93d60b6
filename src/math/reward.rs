use std::f64::consts::E;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{error::RewardError, math::risk::max_drawdown};

/// Selects which reward variant `step` returns. All variants are always recorded.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum RewardKind {
    /// `ln(A1 / A0)` of the last step.
    Log,
    /// Total asset relative to the initial capital.
    Cumulative,
    /// Cumulative reward shaped by the step's log growth.
    Potential,
    /// Cumulative reward discounted by the drawdown seen so far.
    DrawdownAdjusted,
    /// Cumulative reward remapped so that reaching the target scores exactly 1.
    #[default]
    Target,
}

/// Every reward variant of one step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub log: f64,
    pub cumulative: f64,
    pub potential: f64,
    pub drawdown_adjusted: f64,
    /// `None` when the cumulative reward lies outside the target transform's domain.
    pub target: Option<f64>,
}

impl RewardBreakdown {
    pub fn get(&self, kind: RewardKind) -> Option<f64> {
        match kind {
            RewardKind::Log => Some(self.log),
            RewardKind::Cumulative => Some(self.cumulative),
            RewardKind::Potential => Some(self.potential),
            RewardKind::DrawdownAdjusted => Some(self.drawdown_adjusted),
            RewardKind::Target => self.target,
        }
    }
}

// ================================================================================================
// Reward Model
// ================================================================================================

/// Computes all reward variants from total asset values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardModel {
    initial_capital: f64,
    drawdown_decay: f64,
    /// Wealth multiple that maps to a target reward of 1 (`1.6` for a 60% return).
    target_multiple: f64,
}

impl RewardModel {
    pub fn new(
        initial_capital: f64,
        drawdown_decay: f64,
        target_multiple: f64,
    ) -> Result<Self, RewardError> {
        if !(initial_capital > 0.0) {
            return Err(RewardError::NonPositiveValue(initial_capital));
        }
        if !(target_multiple > 1.0) {
            return Err(RewardError::InvalidTarget(target_multiple));
        }
        Ok(Self {
            initial_capital,
            drawdown_decay,
            target_multiple,
        })
    }

    pub fn target_multiple(&self) -> f64 {
        self.target_multiple
    }

    pub fn cumulative(&self, total: f64) -> f64 {
        cumulative_reward(total, self.initial_capital)
    }

    /// Target reward of an arbitrary total asset value.
    pub fn target(&self, total: f64) -> Result<f64, RewardError> {
        target_transform(self.cumulative(total), self.target_multiple)
    }

    /// Evaluates step `step` (1-based) that moved the total asset from `a0` to `a1`.
    ///
    /// `past` holds the cumulative rewards of the earlier steps of the episode; the
    /// drawdown is measured over `past` followed by this step's cumulative reward.
    pub fn evaluate(
        &self,
        a0: f64,
        a1: f64,
        past: &[f64],
        step: usize,
    ) -> Result<RewardBreakdown, RewardError> {
        let log = log_reward(a0, a1)?;
        let cumulative = self.cumulative(a1);
        let potential = potential_reward(cumulative, a0, a1)?;

        let mut series = Vec::with_capacity(past.len() + 1);
        series.extend_from_slice(past);
        series.push(cumulative);
        let mdd = max_drawdown(&series);

        Ok(RewardBreakdown {
            log,
            cumulative,
            potential,
            drawdown_adjusted: drawdown_adjusted_reward(cumulative, mdd, self.drawdown_decay, step),
            target: target_transform(cumulative, self.target_multiple).ok(),
        })
    }

    /// The scalar reward of `kind`. Fails only when `kind` is undefined for this step,
    /// which can happen for [`RewardKind::Target`] alone.
    pub fn select(
        &self,
        rewards: &RewardBreakdown,
        kind: RewardKind,
    ) -> Result<f64, RewardError> {
        match rewards.get(kind) {
            Some(value) => Ok(value),
            None => target_transform(rewards.cumulative, self.target_multiple),
        }
    }
}

// ================================================================================================
// Transforms
// ================================================================================================

/// `ln(a1 / a0)`.
pub fn log_reward(a0: f64, a1: f64) -> Result<f64, RewardError> {
    if !(a0 > 0.0) {
        return Err(RewardError::NonPositiveValue(a0));
    }
    if !(a1 > 0.0) {
        return Err(RewardError::NonPositiveValue(a1));
    }
    Ok((a1 / a0).ln())
}

pub fn cumulative_reward(total: f64, initial_capital: f64) -> f64 {
    total / initial_capital
}

/// `cumulative + ln(1 + (a1 - a0) / a0)`.
pub fn potential_reward(cumulative: f64, a0: f64, a1: f64) -> Result<f64, RewardError> {
    if !(a0 > 0.0) {
        return Err(RewardError::NonPositiveValue(a0));
    }
    let growth = 1.0 + (a1 - a0) / a0;
    if !(growth > 0.0) {
        return Err(RewardError::NonPositiveValue(a1));
    }
    Ok(cumulative + growth.ln())
}

/// `cumulative / (1 + mdd * decay^step)`.
pub fn drawdown_adjusted_reward(cumulative: f64, mdd: f64, decay: f64, step: usize) -> f64 {
    let exp = i32::try_from(step).unwrap_or(i32::MAX);
    cumulative / (1.0 + mdd * decay.powi(exp))
}

/// Smooth remapping of a wealth multiple `x` onto a reward scale.
///
/// With `w = (e - 1)(x - 1) / (target - 1) + 1` the result is `e * ln(w) / w`, so
/// `f(1) = 0`, `f(target) = 1` (the unique maximum) and `f` decays towards 0 beyond the
/// target. Outside the domain (`w <= 0`) the transform is undefined and reported as an error.
pub fn target_transform(x: f64, target: f64) -> Result<f64, RewardError> {
    if !(target > 1.0) || !target.is_finite() {
        return Err(RewardError::InvalidTarget(target));
    }
    let w = (E - 1.0) * (x - 1.0) / (target - 1.0) + 1.0;
    if !(w > 0.0) || !w.is_finite() {
        return Err(RewardError::Domain { x, target, w });
    }
    Ok(E * w.ln() / w)
}

#[cfg(test)]
mod test {
    use super::*;

    const TOL: f64 = 1e-12;

    // ============================================================================================
    // Target Transform
    // ============================================================================================

    #[test]
    fn target_transform_hits_anchor_points() {
        for target in [1.1, 1.6, 3.0] {
            assert!((target_transform(target, target).unwrap() - 1.0).abs() < TOL);
            assert!(target_transform(1.0, target).unwrap().abs() < TOL);
        }
    }

    #[test]
    fn target_transform_peaks_at_target() {
        let t = 1.6;
        let at = target_transform(t, t).unwrap();
        assert!(target_transform(1.5, t).unwrap() < at);
        assert!(target_transform(1.7, t).unwrap() < at);
        assert!(target_transform(5.0, t).unwrap() > 0.0);
        assert!(target_transform(0.9, t).unwrap() < 0.0);
    }

    #[test]
    fn target_transform_reports_domain_errors() {
        // w = (e - 1)(x - 1)/0.6 + 1 <= 0  <=>  x <= 1 - 0.6/(e - 1)
        let err = target_transform(0.5, 1.6).unwrap_err();
        assert!(matches!(err, RewardError::Domain { x, .. } if x == 0.5));
        assert_eq!(
            target_transform(1.2, 1.0).unwrap_err(),
            RewardError::InvalidTarget(1.0)
        );
    }

    #[test]
    fn target_transform_domain_edge() {
        let t = 1.6;
        let edge = 1.0 - (t - 1.0) / (E - 1.0);

        assert!(target_transform(edge + 1e-9, t).is_ok());
        assert!(matches!(
            target_transform(edge - 1e-9, t),
            Err(RewardError::Domain { .. })
        ));
        // w rounds to zero or to a few ulps around it: either out of domain or unbounded below.
        match target_transform(edge, t) {
            Err(RewardError::Domain { w, .. }) => assert!(w.abs() < 1e-12),
            Ok(v) => assert!(v < -1e12),
            Err(other) => panic!("unexpected error {other}"),
        }
    }

    // ============================================================================================
    // Step Rewards
    // ============================================================================================

    #[test]
    fn log_and_potential_rewards() {
        let log = log_reward(100.0, 110.0).unwrap();
        assert!((log - (1.1_f64).ln()).abs() < TOL);
        let pot = potential_reward(1.1, 100.0, 110.0).unwrap();
        assert!((pot - (1.1 + (1.1_f64).ln())).abs() < TOL);
        assert!(log_reward(0.0, 1.0).is_err());
    }

    #[test]
    fn drawdown_adjustment_decays_with_steps() {
        let early = drawdown_adjusted_reward(0.9, 0.25, 0.99, 1);
        let late = drawdown_adjusted_reward(0.9, 0.25, 0.99, 100);
        assert!((early - 0.9 / (1.0 + 0.25 * 0.99)).abs() < TOL);
        assert!(late > early);
        assert_eq!(drawdown_adjusted_reward(1.2, 0.0, 0.99, 3), 1.2);
    }

    #[test]
    fn model_evaluates_every_variant() {
        let model = RewardModel::new(100_000.0, 0.99, 1.6).unwrap();
        let r = model.evaluate(100_000.0, 90_000.0, &[1.0], 2).unwrap();
        assert!((r.cumulative - 0.9).abs() < TOL);
        assert!((r.log - 0.9_f64.ln()).abs() < TOL);
        // series [1.0, 0.9] has a 10% drawdown
        assert!((r.drawdown_adjusted - 0.9 / (1.0 + 0.1 * 0.99_f64.powi(2))).abs() < 1e-9);
        let target = r.get(RewardKind::Target).unwrap();
        assert!((target - target_transform(0.9, 1.6).unwrap()).abs() < TOL);
        assert!(RewardModel::new(100_000.0, 0.99, 0.6).is_err());
    }

    #[test]
    fn target_outside_its_domain_spares_the_other_variants() {
        let model = RewardModel::new(100_000.0, 0.99, 1.6).unwrap();
        let r = model.evaluate(100_000.0, 50_000.0, &[1.0], 3).unwrap();
        assert_eq!(r.target, None);
        assert!((r.cumulative - 0.5).abs() < TOL);

        assert_eq!(model.select(&r, RewardKind::Cumulative).unwrap(), r.cumulative);
        assert_eq!(model.select(&r, RewardKind::Log).unwrap(), r.log);
        let err = model.select(&r, RewardKind::Target).unwrap_err();
        assert!(matches!(err, RewardError::Domain { x, .. } if x == 0.5));
    }
}
