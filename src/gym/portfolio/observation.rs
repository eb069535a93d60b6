use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What the agent sees after `reset` and after every `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The decision date this observation was taken on.
    pub date: NaiveDate,
    /// Per instrument: the quote window followed by the forecast and its diagnostics.
    pub features: Vec<f64>,
    /// Current asset value vector `A`, cash first.
    pub achieved: Vec<f64>,
    /// `(1 + target_return) * A0`, fixed for the episode.
    pub desired: Vec<f64>,
    /// Some row behind this observation was forward-filled.
    pub data_missing: bool,
}

impl Observation {
    /// Number of portfolio slots (instruments plus cash).
    pub fn n_slots(&self) -> usize {
        self.achieved.len()
    }

    pub fn total_asset(&self) -> f64 {
        self.achieved.iter().sum()
    }
}
