// 1. Traits
pub use crate::agent::Agent;
pub use crate::gym::portfolio::Env;

// 2. The Core "Loop" Types
pub use crate::gym::portfolio::{
    action::{Action, ActionSpace},
    config::EnvConfig,
    env::Environment,
    observation::Observation,
    record::{Step, StepRecord, Trajectory},
};
pub use crate::gym::{EnvStatus, StepOutcome};

// 3. Financial Domain Types
pub use crate::data::domain::{InstrumentId, Ohlc, Price, Quantity, Side, Symbol};
pub use crate::gym::portfolio::order::{Order, OrderId, OrderStatus};

// 4. Market Data
pub use crate::data::calendar::Calendar;
pub use crate::data::history::{
    ForecastRow, InstrumentHistory, MarketData, MarketDataBuilder, QuoteRow,
};

// 5. Rewards & Risk
pub use crate::math::reward::{RewardBreakdown, RewardKind};
pub use crate::math::risk::{RiskMetricsConfig, RiskSnapshot};

// 6. Agents & Reports
pub use crate::agent::{AgentIdentifier, GridAxis, constant::ConstantMix, random::RandomAgent};
pub use crate::report::{journal::Journal, summary::EvaluationSummary};

// 7. Errors
pub use crate::error::{
    AgentError, DataError, EnvError, FolioError, FolioResult, IoError, RewardError, SystemError,
};
