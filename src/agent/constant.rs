use std::sync::Arc;

use crate::{
    agent::{Agent, AgentIdentifier, GridAxis},
    error::{AgentError, FolioResult},
    gym::portfolio::{action::Action, observation::Observation},
};

/// Holds a fixed target allocation and quotes every instrument at the same offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantMix {
    weights: Vec<f64>,
    offset: f64,
}

impl ConstantMix {
    /// `weights` is cash-first; `offset` is in percent of the last close.
    pub fn new(weights: Vec<f64>, offset: f64) -> Self {
        Self { weights, offset }
    }

    /// Invests `exposure` of the portfolio, split equally across `n_instruments`.
    pub fn equal_weight(n_instruments: usize, exposure: f64, offset: f64) -> Self {
        let per = if n_instruments == 0 {
            0.0
        } else {
            exposure / n_instruments as f64
        };
        let weights = std::iter::once(1.0 - exposure)
            .chain(std::iter::repeat_n(per, n_instruments))
            .collect();
        Self::new(weights, offset)
    }

    /// One equal-weight agent per exposure on `axis`.
    pub fn grid(n_instruments: usize, axis: &GridAxis, offset: f64) -> Vec<Self> {
        axis.generate()
            .into_iter()
            .map(|exposure| Self::equal_weight(n_instruments, exposure, offset))
            .collect()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Agent for ConstantMix {
    fn act(&mut self, obs: &Observation) -> FolioResult<Action> {
        let n = obs.n_slots();
        if self.weights.len() != n {
            return Err(AgentError::InvalidInput(format!(
                "ConstantMix has {} weights, observation has {n} slots",
                self.weights.len()
            ))
            .into());
        }
        Ok(Action::new(self.weights.clone(), vec![self.offset; n]))
    }

    fn identifier(&self) -> AgentIdentifier {
        let exposure = 1.0 - self.weights.first().copied().unwrap_or(1.0);
        AgentIdentifier::Named(Arc::new(format!(
            "ConstantMix({exposure:.2}, {:+.1}%)",
            self.offset
        )))
    }
}
