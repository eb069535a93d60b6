use std::ops::RangeInclusive;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Admissible range of every target weight component.
pub const WEIGHT_BOUNDS: RangeInclusive<f64> = 0.0..=1.0;

/// Admissible range of every limit-price offset, in percent of the current price.
pub const OFFSET_BOUNDS: RangeInclusive<f64> = -10.0..=10.0;

// ================================================================================================
// Action
// ================================================================================================

/// The agent's decision for one step.
///
/// Both vectors are cash-first and have `N + 1` components. The cash offset is carried
/// for symmetry with the weights and ignored by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Target allocation, renormalized by the ledger.
    pub weights: Vec<f64>,
    /// Limit-price offsets in percent (`1.0` = quote 1% above the last close).
    pub offsets: Vec<f64>,
}

impl Action {
    pub fn new(weights: Vec<f64>, offsets: Vec<f64>) -> Self {
        Self { weights, offsets }
    }

    /// Splits a flat `[weights.., offsets..]` vector of length `2 * n_slots`.
    pub fn from_flat(flat: &[f64], n_slots: usize) -> Result<Self, EnvError> {
        if flat.len() != 2 * n_slots {
            return Err(EnvError::InvalidAction {
                date: None,
                action: flat.to_vec(),
                msg: format!("expected {} components, got {}", 2 * n_slots, flat.len()),
            });
        }
        let (weights, offsets) = flat.split_at(n_slots);
        Ok(Self::new(weights.to_vec(), offsets.to_vec()))
    }

    pub fn flatten(&self) -> Vec<f64> {
        self.weights
            .iter()
            .chain(self.offsets.iter())
            .copied()
            .collect()
    }

    /// All-cash allocation with zero offsets.
    pub fn hold_cash(n_slots: usize) -> Self {
        let mut weights = vec![0.0; n_slots];
        if let Some(cash) = weights.first_mut() {
            *cash = 1.0;
        }
        Self::new(weights, vec![0.0; n_slots])
    }

    /// Checks the shape and finiteness, then clamps every component into its box.
    ///
    /// Returns the clamped action and whether any component had to be moved.
    pub fn sanitize(self, n_slots: usize, date: NaiveDate) -> Result<(Self, bool), EnvError> {
        let reject = |action: &Self, msg: String| EnvError::InvalidAction {
            date: Some(date),
            action: action.flatten(),
            msg,
        };

        if self.weights.len() != n_slots || self.offsets.len() != n_slots {
            let msg = format!(
                "expected {n_slots} weights and {n_slots} offsets, got {} and {}",
                self.weights.len(),
                self.offsets.len()
            );
            return Err(reject(&self, msg));
        }
        if let Some(bad) = self.flatten().into_iter().find(|x| !x.is_finite()) {
            return Err(reject(&self, format!("non-finite component {bad}")));
        }

        let mut clamped = false;
        let mut clamp = |x: f64, bounds: &RangeInclusive<f64>| {
            let y = x.clamp(*bounds.start(), *bounds.end());
            clamped |= y != x;
            y
        };
        let weights = self
            .weights
            .iter()
            .map(|w| clamp(*w, &WEIGHT_BOUNDS))
            .collect();
        let offsets = self
            .offsets
            .iter()
            .map(|o| clamp(*o, &OFFSET_BOUNDS))
            .collect();

        Ok((Self { weights, offsets }, clamped))
    }
}

// ================================================================================================
// Action Space
// ================================================================================================

/// Describes the box of valid actions for a universe of `n_slots` (cash included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpace {
    n_slots: usize,
}

impl ActionSpace {
    pub fn new(n_slots: usize) -> Self {
        Self { n_slots }
    }

    pub fn n_slots(&self) -> usize {
        self.n_slots
    }

    /// Length of the flat action vector.
    pub fn len(&self) -> usize {
        2 * self.n_slots
    }

    pub fn is_empty(&self) -> bool {
        self.n_slots == 0
    }

    pub fn low(&self) -> Vec<f64> {
        self.bounds().map(|b| *b.start()).collect()
    }

    pub fn high(&self) -> Vec<f64> {
        self.bounds().map(|b| *b.end()).collect()
    }

    pub fn contains(&self, action: &Action) -> bool {
        action.weights.len() == self.n_slots
            && action.offsets.len() == self.n_slots
            && action
                .flatten()
                .iter()
                .zip(self.bounds())
                .all(|(x, b)| b.contains(x))
    }

    /// Draws every component uniformly from its interval.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Action {
        let weights = (0..self.n_slots)
            .map(|_| rng.random_range(WEIGHT_BOUNDS))
            .collect();
        let offsets = (0..self.n_slots)
            .map(|_| rng.random_range(OFFSET_BOUNDS))
            .collect();
        Action::new(weights, offsets)
    }

    fn bounds(&self) -> impl Iterator<Item = RangeInclusive<f64>> {
        std::iter::repeat_n(WEIGHT_BOUNDS, self.n_slots)
            .chain(std::iter::repeat_n(OFFSET_BOUNDS, self.n_slots))
    }
}
