use rand::{SeedableRng, rngs::StdRng};

use crate::{
    agent::{Agent, AgentIdentifier},
    error::FolioResult,
    gym::portfolio::{
        action::{Action, ActionSpace},
        observation::Observation,
    },
};

/// Draws every weight and offset uniformly from the action box.
///
/// Seeded, so two agents with the same seed produce the same episode.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    seed: u64,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Agent for RandomAgent {
    fn act(&mut self, obs: &Observation) -> FolioResult<Action> {
        Ok(ActionSpace::new(obs.n_slots()).sample(&mut self.rng))
    }

    fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier::Random
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;

    fn obs() -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            features: vec![],
            achieved: vec![100_000.0, 0.0, 0.0],
            desired: vec![160_000.0, 0.0, 0.0],
            data_missing: false,
        }
    }

    #[test]
    fn reset_replays_the_same_actions() {
        let mut agent = RandomAgent::new(5);
        let first = agent.act(&obs()).unwrap();
        agent.reset();
        assert_eq!(agent.act(&obs()).unwrap(), first);
        assert_eq!(first.weights.len(), 3);
    }
}
