pub mod constant;
pub mod random;

use ndarray::Array;
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::Arc};
use strum::{Display, EnumString};

use crate::{
    error::{AgentError, FolioResult},
    gym::portfolio::{action::Action, observation::Observation},
};

// ============================================================================
//  Shared Utilities
// ============================================================================

/// A utility for defining search space axes in grid searches.
/// It parses explicit string parameters to avoid floating point ambiguity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridAxis {
    start: f64,
    end: f64,
    step: f64,
    /// Number of decimal places to round to, inferred from the `step` string.
    precision: u32,
}

impl GridAxis {
    /// Create a new axis from string parameters, e.g. `("0.0", "1.0", "0.1")`.
    pub fn new(start: &str, end: &str, step: &str) -> Result<Self, AgentError> {
        let parse = |s: &str| {
            f64::from_str(s).map_err(|e| AgentError::InvalidInput(format!("'{s}': {e}")))
        };
        let start_f = parse(start)?;
        let end_f = parse(end)?;
        let step_f = parse(step)?;
        if !(step_f > 0.0) {
            return Err(AgentError::InvalidInput(format!(
                "grid step must be positive, got {step}"
            )));
        }

        let precision = step.split('.').nth(1).map(|s| s.len() as u32).unwrap_or(0);

        Ok(Self {
            start: start_f,
            end: end_f,
            step: step_f,
            precision,
        })
    }

    /// Values in `[start, end)`, rounded to the precision of `step`.
    pub fn generate(&self) -> Vec<f64> {
        let factor = 10_f64.powi(self.precision as i32);

        Array::range(self.start, self.end, self.step)
            .iter()
            .map(|val| (val * factor).round() / factor)
            .collect()
    }
}

// ============================================================================
//  Core Agent Definitions
// ============================================================================

/// Represents the unique identifier of an agent, used for tracking actions in reports.
///
/// The `String` of `Named` can represent custom agent names or parameterized built-ins
/// (e.g. `"ConstantMix(0.50)"`).
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    Default,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentIdentifier {
    /// A custom user-defined agent.
    #[strum(to_string = "{0}")]
    Named(Arc<String>),

    #[default]
    Random,
}

pub trait Agent {
    /// Decide on the next allocation based on the current observation.
    fn act(&mut self, obs: &Observation) -> FolioResult<Action>;

    /// Optional agent name for logging/debugging.
    fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier::Named(Arc::new(
            "UnnamedAgent: override Agent::identifier()".to_string(),
        ))
    }

    /// Reset internal state at the end of an episode. Default is no-op.
    fn reset(&mut self) {}
}

impl Agent for Box<dyn Agent + Send> {
    fn act(&mut self, obs: &Observation) -> FolioResult<Action> {
        (**self).act(obs)
    }

    fn identifier(&self) -> AgentIdentifier {
        (**self).identifier()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
