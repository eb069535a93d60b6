use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    data::domain::Symbol,
    error::IoError,
    gym::{
        StepOutcome,
        portfolio::{observation::Observation, order::Order, vectors::PortfolioVectors},
    },
    math::{reward::RewardBreakdown, risk::RiskSnapshot},
};

/// The ledger's share of a step: what was resolved, what was placed and how the
/// portfolio looked before and after execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStep {
    pub resolved: Vec<Order>,
    pub placed: Vec<Order>,
    pub before: PortfolioVectors,
    pub after: PortfolioVectors,
    /// Cash still uncommitted after this step's buy admissions.
    pub position: f64,
    /// Transaction costs charged on this step's fills.
    pub fees: f64,
    /// The target allocation summed to (almost) zero and was replaced by all cash.
    pub allocation_recovered: bool,
}

/// Immutable snapshot of one simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// `0` for the record emitted by `reset`, then 1-based.
    pub step: usize,
    pub date: NaiveDate,
    pub resolved: Vec<Order>,
    pub placed: Vec<Order>,
    pub before: PortfolioVectors,
    pub after: PortfolioVectors,
    pub position: f64,
    pub total_asset: f64,
    pub fees: f64,
    pub rewards: RewardBreakdown,
    pub risk: RiskSnapshot,
    pub data_missing: bool,
    pub missing_symbols: Vec<Symbol>,
    pub allocation_recovered: bool,
    pub outcome: StepOutcome,
}

impl StepRecord {
    pub fn is_done(&self) -> bool {
        self.outcome.is_terminal()
    }
}

/// Append-only history of one episode. Only a reset of the owning environment empties it.
///
/// ```compile_fail
/// use folio_gym::prelude::*;
///
/// let mut trajectory = Trajectory::default();
/// trajectory.clear();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory(Vec<StepRecord>);

impl Trajectory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, record: StepRecord) {
        self.0.push(record);
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.0
    }

    pub fn first(&self) -> Option<&StepRecord> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cumulative rewards of every step after the reset record.
    pub fn cumulative_series(&self) -> Vec<f64> {
        self.0
            .iter()
            .skip(1)
            .map(|r| r.rewards.cumulative)
            .collect()
    }

    pub fn to_json(&self) -> Result<String, IoError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What `step` hands back to the caller.
#[derive(Debug, Clone)]
pub struct Step<'env> {
    pub observation: Observation,
    pub reward: f64,
    pub outcome: StepOutcome,
    pub record: &'env StepRecord,
}

impl Step<'_> {
    pub fn is_done(&self) -> bool {
        self.outcome.is_terminal()
    }
}
