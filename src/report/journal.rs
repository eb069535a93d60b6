use polars::{df, frame::DataFrame, prelude::PlSmallStr};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    agent::AgentIdentifier,
    data::domain::Symbol,
    error::{DataError, FolioResult},
    gym::portfolio::{
        order::Order,
        record::{StepRecord, Trajectory},
    },
    math::risk::RiskMetricsConfig,
};

/// Label of the cash slot in the portfolio frame.
pub const CASH: &str = "cash";

// ================================================================================================
// Columns
// ================================================================================================

/// Columns of the per-step statistics frame.
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
pub enum StatisticsCol {
    Step,
    Date,
    /// Cash left uncommitted after the step's buy admissions.
    Position,
    TotalAsset,
    Fees,
    LogReward,
    CumulativeReward,
    PotentialReward,
    DrawdownAdjustedReward,
    TargetReward,
    Sharpe,
    MaxDrawdown,
    DataMissing,
    Outcome,
}

/// Columns of the order frame. Every order appears once when placed and once when resolved.
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
pub enum OrderCol {
    Date,
    /// `placed` or `resolved`.
    Stage,
    OrderId,
    Symbol,
    Side,
    LimitPrice,
    Quantity,
    Status,
    FillPrice,
}

/// Columns of the long-format portfolio frame (one row per date and slot).
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
pub enum PortfolioCol {
    Date,
    Asset,
    Price,
    Holding,
    Value,
    Weight,
}

macro_rules! impl_col_name {
    ($($col:ty),*) => {
        $(
            impl From<$col> for PlSmallStr {
                fn from(value: $col) -> Self {
                    value.as_str().into()
                }
            }

            impl $col {
                pub fn name(&self) -> PlSmallStr {
                    (*self).into()
                }

                pub fn as_str(&self) -> &'static str {
                    self.into()
                }
            }
        )*
    };
}
impl_col_name!(StatisticsCol, OrderCol, PortfolioCol);

// ================================================================================================
// Journal
// ================================================================================================

/// The trajectory of one episode rendered as in-memory data frames.
#[derive(Debug, Clone)]
pub struct Journal {
    agent: AgentIdentifier,
    statistics: DataFrame,
    orders: DataFrame,
    portfolio: DataFrame,
    risk_metrics_config: RiskMetricsConfig,
}

impl Journal {
    pub fn new(
        agent: AgentIdentifier,
        trajectory: &Trajectory,
        symbols: &[Symbol],
        risk_metrics_config: RiskMetricsConfig,
    ) -> FolioResult<Self> {
        let records = trajectory.records();
        Ok(Self {
            agent,
            statistics: StatisticsSoA::from_records(records).try_into()?,
            orders: OrderSoA::from_records(records).try_into()?,
            portfolio: PortfolioSoA::from_records(records, symbols).try_into()?,
            risk_metrics_config,
        })
    }

    pub fn agent(&self) -> &AgentIdentifier {
        &self.agent
    }

    pub fn statistics(&self) -> &DataFrame {
        &self.statistics
    }

    pub fn orders(&self) -> &DataFrame {
        &self.orders
    }

    pub fn portfolio(&self) -> &DataFrame {
        &self.portfolio
    }

    pub fn risk_metrics_config(&self) -> RiskMetricsConfig {
        self.risk_metrics_config
    }
}

// ================================================================================================
// Column-oriented Builders
// ================================================================================================

fn frame_err(e: polars::error::PolarsError) -> crate::error::FolioError {
    DataError::DataFrame(e.to_string()).into()
}

#[derive(Default)]
struct StatisticsSoA {
    step: Vec<u32>,
    date: Vec<String>,
    position: Vec<f64>,
    total_asset: Vec<f64>,
    fees: Vec<f64>,
    log_reward: Vec<f64>,
    cumulative_reward: Vec<f64>,
    potential_reward: Vec<f64>,
    drawdown_adjusted_reward: Vec<f64>,
    target_reward: Vec<Option<f64>>,
    sharpe: Vec<f64>,
    max_drawdown: Vec<f64>,
    data_missing: Vec<bool>,
    outcome: Vec<String>,
}

impl StatisticsSoA {
    fn from_records(records: &[StepRecord]) -> Self {
        let mut soa = Self::default();
        for r in records {
            soa.step.push(u32::try_from(r.step).unwrap_or(u32::MAX));
            soa.date.push(r.date.to_string());
            soa.position.push(r.position);
            soa.total_asset.push(r.total_asset);
            soa.fees.push(r.fees);
            soa.log_reward.push(r.rewards.log);
            soa.cumulative_reward.push(r.rewards.cumulative);
            soa.potential_reward.push(r.rewards.potential);
            soa.drawdown_adjusted_reward.push(r.rewards.drawdown_adjusted);
            soa.target_reward.push(r.rewards.target);
            soa.sharpe.push(r.risk.sharpe);
            soa.max_drawdown.push(r.risk.max_drawdown);
            soa.data_missing.push(r.data_missing);
            soa.outcome.push(r.outcome.to_string());
        }
        soa
    }
}

impl TryFrom<StatisticsSoA> for DataFrame {
    type Error = crate::error::FolioError;

    fn try_from(v: StatisticsSoA) -> Result<Self, Self::Error> {
        df!(
            StatisticsCol::Step.as_str() => v.step,
            StatisticsCol::Date.as_str() => v.date,
            StatisticsCol::Position.as_str() => v.position,
            StatisticsCol::TotalAsset.as_str() => v.total_asset,
            StatisticsCol::Fees.as_str() => v.fees,
            StatisticsCol::LogReward.as_str() => v.log_reward,
            StatisticsCol::CumulativeReward.as_str() => v.cumulative_reward,
            StatisticsCol::PotentialReward.as_str() => v.potential_reward,
            StatisticsCol::DrawdownAdjustedReward.as_str() => v.drawdown_adjusted_reward,
            StatisticsCol::TargetReward.as_str() => v.target_reward,
            StatisticsCol::Sharpe.as_str() => v.sharpe,
            StatisticsCol::MaxDrawdown.as_str() => v.max_drawdown,
            StatisticsCol::DataMissing.as_str() => v.data_missing,
            StatisticsCol::Outcome.as_str() => v.outcome,
        )
        .map_err(frame_err)
    }
}

#[derive(Default)]
struct OrderSoA {
    date: Vec<String>,
    stage: Vec<&'static str>,
    order_id: Vec<u64>,
    symbol: Vec<String>,
    side: Vec<&'static str>,
    limit_price: Vec<f64>,
    quantity: Vec<u64>,
    status: Vec<&'static str>,
    fill_price: Vec<Option<f64>>,
}

impl OrderSoA {
    fn from_records(records: &[StepRecord]) -> Self {
        let mut soa = Self::default();
        for r in records {
            for o in &r.placed {
                soa.push(r, "placed", o);
            }
            for o in &r.resolved {
                soa.push(r, "resolved", o);
            }
        }
        soa
    }

    fn push(&mut self, record: &StepRecord, stage: &'static str, order: &Order) {
        self.date.push(record.date.to_string());
        self.stage.push(stage);
        self.order_id.push(order.id().0);
        self.symbol.push(order.symbol().to_string());
        self.side.push(order.side().into());
        self.limit_price.push(order.limit_price().0);
        self.quantity.push(order.quantity().0);
        self.status.push(order.status().into());
        self.fill_price.push(order.fill_price().map(|p| p.0));
    }
}

impl TryFrom<OrderSoA> for DataFrame {
    type Error = crate::error::FolioError;

    fn try_from(v: OrderSoA) -> Result<Self, Self::Error> {
        df!(
            OrderCol::Date.as_str() => v.date,
            OrderCol::Stage.as_str() => v.stage,
            OrderCol::OrderId.as_str() => v.order_id,
            OrderCol::Symbol.as_str() => v.symbol,
            OrderCol::Side.as_str() => v.side,
            OrderCol::LimitPrice.as_str() => v.limit_price,
            OrderCol::Quantity.as_str() => v.quantity,
            OrderCol::Status.as_str() => v.status,
            OrderCol::FillPrice.as_str() => v.fill_price,
        )
        .map_err(frame_err)
    }
}

#[derive(Default)]
struct PortfolioSoA {
    date: Vec<String>,
    asset: Vec<String>,
    price: Vec<f64>,
    holding: Vec<f64>,
    value: Vec<f64>,
    weight: Vec<f64>,
}

impl PortfolioSoA {
    fn from_records(records: &[StepRecord], symbols: &[Symbol]) -> Self {
        let mut soa = Self::default();
        let names = std::iter::once(CASH.to_string())
            .chain(symbols.iter().map(Symbol::to_string))
            .collect::<Vec<_>>();

        for r in records {
            let v = &r.after;
            let assets = v.assets();
            let weights = v.weights();
            for (i, name) in names.iter().enumerate() {
                soa.date.push(r.date.to_string());
                soa.asset.push(name.clone());
                soa.price.push(v.prices().get(i).copied().unwrap_or(f64::NAN));
                soa.holding.push(v.holdings().get(i).copied().unwrap_or(f64::NAN));
                soa.value.push(assets.get(i).copied().unwrap_or(f64::NAN));
                soa.weight.push(weights.get(i).copied().unwrap_or(f64::NAN));
            }
        }
        soa
    }
}

impl TryFrom<PortfolioSoA> for DataFrame {
    type Error = crate::error::FolioError;

    fn try_from(v: PortfolioSoA) -> Result<Self, Self::Error> {
        df!(
            PortfolioCol::Date.as_str() => v.date,
            PortfolioCol::Asset.as_str() => v.asset,
            PortfolioCol::Price.as_str() => v.price,
            PortfolioCol::Holding.as_str() => v.holding,
            PortfolioCol::Value.as_str() => v.value,
            PortfolioCol::Weight.as_str() => v.weight,
        )
        .map_err(frame_err)
    }
}
