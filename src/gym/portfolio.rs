use crate::{
    error::FolioResult,
    gym::portfolio::{action::Action, observation::Observation, record::Step},
};

pub mod action;
pub mod config;
pub mod env;
pub mod ledger;
pub mod observation;
pub mod order;
pub mod record;
pub mod vectors;

pub trait Env {
    fn reset(&mut self) -> FolioResult<Observation>;
    fn step(&mut self, action: Action) -> FolioResult<Step<'_>>;
}
