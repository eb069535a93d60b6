use polars::{df, frame::DataFrame, prelude::PlSmallStr};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    agent::AgentIdentifier,
    error::{DataError, FolioResult},
    gym::{StepOutcome, portfolio::record::Trajectory},
};

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
    Display,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum LeaderboardCol {
    Rank,
    AgentUid,
    Agent,
    Steps,
    FinalTotalAsset,
    FinalCumulative,
    Sharpe,
    MaxDrawdown,
    TotalFees,
    Outcome,
}

impl From<LeaderboardCol> for PlSmallStr {
    fn from(value: LeaderboardCol) -> Self {
        value.as_str().into()
    }
}

impl LeaderboardCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Headline numbers of one finished episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub agent_uid: usize,
    pub agent: AgentIdentifier,
    /// Steps taken after `reset`.
    pub steps: usize,
    pub final_total_asset: f64,
    pub final_cumulative: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub total_fees: f64,
    pub outcome: StepOutcome,
}

impl EvaluationSummary {
    /// Returns `None` for a trajectory without any record.
    pub fn from_trajectory(
        agent_uid: usize,
        agent: AgentIdentifier,
        trajectory: &Trajectory,
    ) -> Option<Self> {
        let last = trajectory.last()?;
        Some(Self {
            agent_uid,
            agent,
            steps: last.step,
            final_total_asset: last.total_asset,
            final_cumulative: last.rewards.cumulative,
            sharpe: last.risk.sharpe,
            max_drawdown: last.risk.max_drawdown,
            total_fees: trajectory.records().iter().map(|r| r.fees).sum(),
            outcome: last.outcome,
        })
    }
}

/// Sorts by final cumulative reward, best first. Ties keep the lower uid first.
pub fn rank(summaries: &mut [EvaluationSummary]) {
    summaries.sort_by(|a, b| {
        b.final_cumulative
            .total_cmp(&a.final_cumulative)
            .then(a.agent_uid.cmp(&b.agent_uid))
    });
}

/// Renders already ranked summaries as a leaderboard frame, rank 1 first.
pub fn leaderboard(summaries: &[EvaluationSummary]) -> FolioResult<DataFrame> {
    let n = summaries.len();
    let mut rank_col = Vec::with_capacity(n);
    let mut uid = Vec::with_capacity(n);
    let mut agent = Vec::with_capacity(n);
    let mut steps = Vec::with_capacity(n);
    let mut total_asset = Vec::with_capacity(n);
    let mut cumulative = Vec::with_capacity(n);
    let mut sharpe = Vec::with_capacity(n);
    let mut mdd = Vec::with_capacity(n);
    let mut fees = Vec::with_capacity(n);
    let mut outcome = Vec::with_capacity(n);

    for (i, s) in summaries.iter().enumerate() {
        rank_col.push(i as u32 + 1);
        uid.push(s.agent_uid as u64);
        agent.push(s.agent.to_string());
        steps.push(s.steps as u32);
        total_asset.push(s.final_total_asset);
        cumulative.push(s.final_cumulative);
        sharpe.push(s.sharpe);
        mdd.push(s.max_drawdown);
        fees.push(s.total_fees);
        outcome.push(s.outcome.to_string());
    }

    df!(
        LeaderboardCol::Rank.as_str() => rank_col,
        LeaderboardCol::AgentUid.as_str() => uid,
        LeaderboardCol::Agent.as_str() => agent,
        LeaderboardCol::Steps.as_str() => steps,
        LeaderboardCol::FinalTotalAsset.as_str() => total_asset,
        LeaderboardCol::FinalCumulative.as_str() => cumulative,
        LeaderboardCol::Sharpe.as_str() => sharpe,
        LeaderboardCol::MaxDrawdown.as_str() => mdd,
        LeaderboardCol::TotalFees.as_str() => fees,
        LeaderboardCol::Outcome.as_str() => outcome,
    )
    .map_err(|e| DataError::DataFrame(e.to_string()).into())
}
