use std::sync::Arc;

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rand::{SeedableRng, rngs::StdRng};
use rayon::iter::ParallelIterator;
use tracing::{debug, info, warn};

use crate::{
    agent::{Agent, AgentIdentifier},
    data::{
        calendar::DecisionCursor,
        domain::{Ohlc, Symbol},
        history::MarketData,
        window::WindowProvider,
    },
    error::{DataError, EnvError, FolioError, FolioResult, SystemError},
    gym::{
        EnvStatus, StepOutcome,
        portfolio::{
            Env,
            action::{Action, ActionSpace},
            config::EnvConfig,
            ledger::{PortfolioLedger, RebalanceCtx},
            observation::Observation,
            record::{Step, StepRecord, Trajectory},
            vectors::PortfolioVectors,
        },
    },
    math::{
        reward::{RewardBreakdown, RewardModel},
        risk::RiskSnapshot,
    },
    report::{
        journal::Journal,
        summary::{self, EvaluationSummary},
    },
};

/// Drives one episode over the decision date range: it owns the ledger, the cursor and
/// the trajectory, and turns every action into exactly one simulated trading day.
#[derive(Clone, Debug)]
pub struct Environment {
    // === Public (configurable) ===
    config: EnvConfig,

    // === Internal only ===
    /// Shared, immutable market tables.
    provider: WindowProvider,

    ledger: PortfolioLedger,

    reward_model: RewardModel,

    /// Position inside the decision date range.
    cursor: DecisionCursor,

    /// Drives the instrument order of each rebalance. Reseeded on every reset.
    rng: StdRng,

    trajectory: Trajectory,

    /// `(1 + target_return) * A0`, fixed at reset.
    desired: Vec<f64>,

    env_status: EnvStatus,
}

/// A fully computed step that has not been committed yet.
struct Transition {
    cursor: DecisionCursor,
    ledger: PortfolioLedger,
    rng: StdRng,
    record: StepRecord,
    observation: Observation,
    reward: f64,
}

// ================================================================================================
// Building
// ================================================================================================
impl Environment {
    /// Builds an environment over `data`. Call [`Env::reset`] before the first step.
    pub fn new(data: Arc<MarketData>, config: EnvConfig) -> FolioResult<Self> {
        config.validate()?;

        let provider = WindowProvider::new(data, config.window_len());
        let first = provider.first_full_window()?;
        let start = config.start().map_or(first, |s| s.max(first));
        let cursor = DecisionCursor::new(
            provider.calendar(),
            start,
            config.stop(),
            config.max_episode_len(),
        )?;

        let reward_model = RewardModel::new(
            config.initial_capital(),
            config.drawdown_decay(),
            config.target_multiple(),
        )?;
        let ledger = PortfolioLedger::new(
            provider.data().symbols(),
            config.fee_rate(),
            config.lot_size(),
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed()),
            trajectory: Trajectory::with_capacity(config.max_episode_len()),
            desired: Vec::new(),
            env_status: EnvStatus::Uninitialized,
            config,
            provider,
            ledger,
            reward_model,
            cursor,
        })
    }
}

// ================================================================================================
// Public API
// ================================================================================================
impl Environment {
    /// Moves the decision range to begin at `start` (never before the first full window)
    /// and resets. Later calls to `reset` replay from the same date.
    pub fn reset_from(&mut self, start: NaiveDate) -> FolioResult<Observation> {
        let first = self.provider.first_full_window()?;
        self.cursor = DecisionCursor::new(
            self.provider.calendar(),
            start.max(first),
            self.config.stop(),
            self.config.max_episode_len(),
        )?;
        self.reset()
    }

    /// Same as `reset`, allowed from any state.
    pub fn close(&mut self) -> FolioResult<Observation> {
        self.reset()
    }

    /// Steps with a flat `[weights.., offsets..]` action of length `2 * (N + 1)`.
    pub fn step_flat(&mut self, flat: &[f64]) -> FolioResult<Step<'_>> {
        let action = Action::from_flat(flat, self.n_slots())?;
        self.step(action)
    }

    /// Target reward of an achieved asset vector, measured against the initial capital.
    pub fn compute_reward(&self, achieved: &[f64]) -> FolioResult<f64> {
        Ok(self.reward_model.target(achieved.iter().sum())?)
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn status(&self) -> EnvStatus {
        self.env_status
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn symbols(&self) -> &[Symbol] {
        self.ledger.symbols()
    }

    /// Number of portfolio slots, cash included.
    pub fn n_slots(&self) -> usize {
        self.provider.data().n_instruments() + 1
    }

    pub fn action_space(&self) -> ActionSpace {
        ActionSpace::new(self.n_slots())
    }

    /// Length of [`Observation::features`].
    pub fn observation_len(&self) -> usize {
        self.provider.observation_len()
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.cursor.current(self.provider.calendar())
    }

    pub fn journal(&self, agent: AgentIdentifier) -> FolioResult<Journal> {
        Journal::new(
            agent,
            &self.trajectory,
            self.symbols(),
            self.config.risk_metrics_cfg(),
        )
    }

    /// Runs `agent` through one full episode and returns its journal.
    pub fn evaluate_agent<T: Agent>(&mut self, agent: &mut T) -> FolioResult<Journal> {
        self.run_episode(agent)?;
        self.journal(agent.identifier())
    }

    /// Evaluates a stream of agents in parallel and returns one summary per agent, best
    /// final cumulative reward first.
    ///
    /// Every agent runs on its own clone of this environment, so `self` is left untouched.
    ///
    /// # Arguments
    ///
    /// * `agents` - A parallel iterator yielding `(usize, Agent)`. The `usize` is the
    ///   agent uid, typically from `.enumerate()` before converting to parallel.
    /// * `stream_len` - The number of agents expected, used only for the progress bar.
    pub fn evaluate_agents<T>(
        &self,
        agents: impl ParallelIterator<Item = (usize, T)>,
        stream_len: u64,
    ) -> FolioResult<Vec<EvaluationSummary>>
    where
        T: Agent + Send,
    {
        let pb = progress_bar(stream_len)?;
        pb.set_message("Running evaluation...");

        let mut summaries = agents
            .try_fold(Vec::new, |mut acc, (uid, mut agent)| {
                acc.push(self.worker(&mut agent, uid)?);
                pb.inc(1);
                Ok::<_, FolioError>(acc)
            })
            .try_reduce(Vec::new, |mut a, b| {
                a.extend(b);
                Ok::<_, FolioError>(a)
            })?;

        pb.finish_with_message("Evaluation complete.");
        summary::rank(&mut summaries);
        Ok(summaries)
    }
}

impl Env for Environment {
    #[tracing::instrument(skip(self), fields(seed = self.config.seed()))]
    fn reset(&mut self) -> FolioResult<Observation> {
        let calendar = self.provider.calendar();
        let mut cursor = self.cursor.clone();
        cursor.rewind();
        let date = cursor
            .current(calendar)
            .ok_or(DataError::EmptyCalendar)?;

        let bars = self.provider.bars(date)?;
        let mut ledger = self.ledger.clone();
        let vectors = ledger.reset(self.config.initial_capital(), &closes(&bars.value))?;
        let desired = vectors
            .assets()
            .iter()
            .map(|a| a * self.config.target_multiple())
            .collect::<Vec<_>>();

        let (mut observation, window_missing) = self.observe(date, &vectors, &desired)?;
        let missing_symbols = merge_missing(bars.missing, window_missing);
        observation.data_missing = !missing_symbols.is_empty();

        let total = vectors.total();
        let cumulative = self.reward_model.cumulative(total);
        let rewards = RewardBreakdown {
            log: 0.0,
            cumulative,
            potential: cumulative,
            drawdown_adjusted: cumulative,
            target: Some(self.reward_model.target(total)?),
        };
        let record = StepRecord {
            step: 0,
            date,
            resolved: Vec::new(),
            placed: Vec::new(),
            before: vectors.clone(),
            after: vectors.clone(),
            position: vectors.cash(),
            total_asset: total,
            fees: 0.0,
            rewards,
            risk: RiskSnapshot::default(),
            data_missing: observation.data_missing,
            missing_symbols,
            allocation_recovered: false,
            outcome: StepOutcome::InProgress,
        };

        // === Commit ===
        self.cursor = cursor;
        self.ledger = ledger;
        self.rng = StdRng::seed_from_u64(self.config.seed());
        self.desired = desired;
        self.trajectory.clear();
        self.trajectory.push(record);
        self.env_status = EnvStatus::Ready;

        info!(
            start = %date,
            last = ?self.cursor.last_date(self.provider.calendar()),
            initial_capital = total,
            "Episode starting"
        );
        self.env_status = EnvStatus::Running;
        Ok(observation)
    }

    #[tracing::instrument(skip(self, action), fields(step = self.cursor.steps_taken() + 1))]
    fn step(&mut self, action: Action) -> FolioResult<Step<'_>> {
        self.check_step_status()?;

        let Transition {
            cursor,
            ledger,
            rng,
            record,
            observation,
            reward,
        } = self.transition(action)?;

        let outcome = record.outcome;

        // === Commit ===
        self.cursor = cursor;
        self.ledger = ledger;
        self.rng = rng;
        self.trajectory.push(record);
        self.update_env_status(outcome);

        let record = self.trajectory.last().ok_or_else(|| {
            SystemError::InvariantViolation("trajectory is empty after a step".to_string())
        })?;

        Ok(Step {
            observation,
            reward,
            outcome,
            record,
        })
    }
}

// ================================================================================================
// Internals
// ================================================================================================
impl Environment {
    /// Computes the next trading day on copies of the mutable state.
    fn transition(&self, action: Action) -> FolioResult<Transition> {
        let calendar = self.provider.calendar();
        let decided_on = self
            .cursor
            .current(calendar)
            .ok_or(DataError::EmptyCalendar)?;

        let (action, clamped) = action.sanitize(self.n_slots(), decided_on)?;
        if clamped {
            warn!(date = %decided_on, "Action clamped into the action space");
        }

        let mut cursor = self.cursor.clone();
        let date = cursor
            .advance(calendar)
            .ok_or(DataError::EndOfCalendar(decided_on))?;

        let bars = self.provider.bars(date)?;
        let prices = closes(&bars.value);

        let mut ledger = self.ledger.clone();
        let mut rng = self.rng.clone();
        let ctx = RebalanceCtx {
            date,
            bars: &bars.value,
            prices: &prices,
            action: &action,
        };
        let executed = ledger.resolve_pending_and_rebalance(ctx, &mut rng)?;

        let a0 = executed.before.total();
        let a1 = executed.after.total();
        let mut series = self.trajectory.cumulative_series();
        let rewards = self
            .reward_model
            .evaluate(a0, a1, &series, cursor.steps_taken())
            .map_err(|source| EnvError::Reward { date, source })?;
        let reward = self
            .reward_model
            .select(&rewards, self.config.reward_kind())
            .map_err(|source| EnvError::Reward { date, source })?;
        series.push(rewards.cumulative);
        let risk = self.config.risk_metrics_cfg().snapshot(&series);

        let (mut observation, window_missing) = self.observe(date, &executed.after, &self.desired)?;
        let missing_symbols = merge_missing(bars.missing, window_missing);
        observation.data_missing = !missing_symbols.is_empty();

        let outcome = if rewards.cumulative < self.config.loss_threshold() {
            StepOutcome::Terminated
        } else if cursor.is_last() {
            StepOutcome::Truncated
        } else {
            StepOutcome::InProgress
        };

        debug!(
            %date,
            total_asset = a1,
            cumulative = rewards.cumulative,
            placed = executed.placed.len(),
            resolved = executed.resolved.len(),
            %outcome,
            "Step evaluated"
        );

        let record = StepRecord {
            step: cursor.steps_taken(),
            date,
            resolved: executed.resolved,
            placed: executed.placed,
            position: executed.position,
            total_asset: a1,
            fees: executed.fees,
            before: executed.before,
            after: executed.after,
            rewards,
            risk,
            data_missing: observation.data_missing,
            missing_symbols,
            allocation_recovered: executed.allocation_recovered,
            outcome,
        };

        Ok(Transition {
            cursor,
            ledger,
            rng,
            record,
            observation,
            reward,
        })
    }

    /// Builds the observation of `date` and reports the instruments that were forward-filled.
    fn observe(
        &self,
        date: NaiveDate,
        vectors: &PortfolioVectors,
        desired: &[f64],
    ) -> Result<(Observation, Vec<Symbol>), DataError> {
        let window = self.provider.window(date)?;
        let prediction = self.provider.prediction(date)?;
        let features = WindowProvider::observation_features(&window.value, &prediction.value);
        let missing = merge_missing(window.missing, prediction.missing);

        let observation = Observation {
            date,
            features,
            achieved: vectors.assets(),
            desired: desired.to_vec(),
            data_missing: !missing.is_empty(),
        };
        Ok((observation, missing))
    }

    fn run_episode<T: Agent>(&mut self, agent: &mut T) -> FolioResult<()> {
        agent.reset();
        let mut obs = self.reset()?;

        loop {
            let action = agent.act(&obs)?;
            let Step {
                observation,
                outcome,
                ..
            } = self.step(action)?;
            obs = observation;
            if outcome.is_terminal() {
                break;
            }
        }

        agent.reset();
        Ok(())
    }

    #[tracing::instrument(skip(self, agent), fields(agent_uid = %agent_uid))]
    fn worker<T: Agent>(&self, agent: &mut T, agent_uid: usize) -> FolioResult<EvaluationSummary> {
        let mut thread_env = self.clone();
        thread_env.run_episode(agent)?;

        EvaluationSummary::from_trajectory(agent_uid, agent.identifier(), &thread_env.trajectory)
            .ok_or_else(|| {
                SystemError::InvariantViolation(format!(
                    "agent {agent_uid} finished without a trajectory"
                ))
                .into()
            })
    }

    fn check_step_status(&self) -> Result<(), EnvError> {
        use EnvStatus::*;
        let msg = match self.env_status {
            Running => return Ok(()),
            Uninitialized => "Environment is not started. Call `reset()` before stepping.",
            Ready => "Environment has no observation yet. Call `reset()` before stepping.",
            Terminated => "Episode is done. Call `reset()` before stepping.",
        };
        Err(EnvError::SequenceViolation {
            status: self.env_status,
            date: self.current_date(),
            msg: msg.to_string(),
        })
    }

    fn update_env_status(&mut self, outcome: StepOutcome) {
        if outcome.is_terminal() {
            self.env_status = EnvStatus::Terminated;
            if let Some(last) = self.trajectory.last() {
                info!(
                    date = %last.date,
                    %outcome,
                    total_asset = last.total_asset,
                    cumulative = last.rewards.cumulative,
                    "Episode finished"
                );
            }
        }
    }
}

// ================================================================================================
// Helper Functions
// ================================================================================================
fn closes(bars: &[Ohlc]) -> Vec<f64> {
    bars.iter().map(|b| b.close.0).collect()
}

fn merge_missing(a: Vec<Symbol>, b: Vec<Symbol>) -> Vec<Symbol> {
    a.into_iter().chain(b).sorted().dedup().collect()
}

fn progress_bar(capacity: u64) -> FolioResult<ProgressBar> {
    let bar = ProgressBar::new(capacity);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta_precise}) {msg}")
            .map_err(EnvError::ProgressBar)?
            .progress_chars("#>-"));
    Ok(bar)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        data::{
            domain::Ohlc,
            history::{InstrumentHistory, MarketDataBuilder},
        },
        error::RewardError,
        math::reward::RewardKind,
    };

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    /// One instrument, flat bars at the given closes on consecutive days starting Jan 2.
    fn market(closes: &[f64]) -> Arc<MarketData> {
        let hist = closes
            .iter()
            .enumerate()
            .fold(InstrumentHistory::new("AAA"), |h, (i, c)| {
                h.with_bar(d(2 + i as u32), Ohlc::flat(*c))
            });
        Arc::new(MarketDataBuilder::new().add_instrument(hist).build().unwrap())
    }

    fn all_in() -> Action {
        Action::new(vec![0.0, 1.0], vec![0.0, 0.0])
    }

    // ============================================================================================
    // Lifecycle
    // ============================================================================================

    #[test]
    fn step_before_reset_is_a_sequence_violation() {
        let mut env = Environment::new(market(&[100.0, 100.0]), EnvConfig::default()).unwrap();
        let err = env.step(Action::hold_cash(2)).unwrap_err();
        assert!(matches!(
            err,
            FolioError::Env(EnvError::SequenceViolation {
                status: EnvStatus::Uninitialized,
                ..
            })
        ));
    }

    #[test]
    fn reset_emits_the_initial_record() {
        let mut env = Environment::new(market(&[100.0, 100.0]), EnvConfig::default()).unwrap();
        let obs = env.reset().unwrap();

        assert_eq!(env.status(), EnvStatus::Running);
        assert_eq!(obs.achieved, vec![100_000.0, 0.0]);
        assert!((obs.desired[0] - 160_000.0).abs() < 1e-6);
        assert_eq!(obs.features.len(), env.observation_len());

        let first = env.trajectory().first().unwrap();
        assert_eq!(first.step, 0);
        assert_eq!(first.date, d(2));
        assert_eq!(first.rewards.cumulative, 1.0);
        assert_eq!(first.rewards.target, Some(0.0));
    }

    #[test]
    fn last_decision_date_truncates() {
        let mut env = Environment::new(market(&[100.0, 100.0, 100.0]), EnvConfig::default())
            .unwrap();
        env.reset().unwrap();

        let first = env.step(Action::hold_cash(2)).unwrap();
        assert_eq!(first.outcome, StepOutcome::InProgress);
        let second = env.step(Action::hold_cash(2)).unwrap();
        assert_eq!(second.outcome, StepOutcome::Truncated);
        assert!(second.is_done());

        assert_eq!(env.status(), EnvStatus::Terminated);
        assert!(env.step(Action::hold_cash(2)).is_err());

        env.close().unwrap();
        assert_eq!(env.status(), EnvStatus::Running);
        assert_eq!(env.trajectory().len(), 1);
    }

    #[test]
    fn max_episode_len_cuts_the_range() {
        let cfg = EnvConfig::default().with_max_episode_len(2);
        let mut env = Environment::new(market(&[100.0; 6]), cfg).unwrap();
        env.reset().unwrap();
        let step = env.step(Action::hold_cash(2)).unwrap();
        assert_eq!(step.outcome, StepOutcome::Truncated);
    }

    #[test]
    fn single_date_range_is_rejected_up_front() {
        let cfg = EnvConfig::default().with_start(d(3)).with_stop(d(3));
        let err = Environment::new(market(&[100.0; 4]), cfg).unwrap_err();
        assert!(matches!(
            err,
            FolioError::Data(DataError::InsufficientHistory { needed: 2, .. })
        ));

        let mut env = Environment::new(market(&[100.0; 4]), EnvConfig::default()).unwrap();
        assert!(env.reset_from(d(5)).is_err());
        assert_eq!(env.status(), EnvStatus::Uninitialized);
    }

    #[test]
    fn reset_from_moves_the_start() {
        let mut env = Environment::new(market(&[100.0; 5]), EnvConfig::default()).unwrap();
        let obs = env.reset_from(d(4)).unwrap();
        assert_eq!(obs.date, d(4));
        assert_eq!(env.current_date(), Some(d(4)));
    }

    // ============================================================================================
    // Stepping
    // ============================================================================================

    #[test]
    fn flat_action_of_wrong_length_is_rejected() {
        let mut env = Environment::new(market(&[100.0; 3]), EnvConfig::default()).unwrap();
        env.reset().unwrap();
        let err = env.step_flat(&[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, FolioError::Env(EnvError::InvalidAction { .. })));
        assert_eq!(env.trajectory().len(), 1);
    }

    #[test]
    fn reward_domain_error_leaves_state_untouched() {
        let cfg = EnvConfig::default().with_loss_threshold(0.0);
        let mut env = Environment::new(market(&[100.0, 100.0, 100.0, 40.0, 40.0]), cfg).unwrap();
        env.reset().unwrap();
        env.step(all_in()).unwrap();
        env.step(all_in()).unwrap();
        assert_eq!(env.ledger().positions()[0].0, 1000);

        let before = env.clone();
        let err = env.step(all_in()).unwrap_err();
        assert!(matches!(
            err,
            FolioError::Env(EnvError::Reward {
                source: RewardError::Domain { .. },
                ..
            })
        ));
        assert_eq!(env.trajectory(), before.trajectory());
        assert_eq!(env.current_date(), before.current_date());
        assert_eq!(env.status(), EnvStatus::Running);
    }

    #[test]
    fn crash_below_the_target_domain_still_trips_the_breaker() {
        let cfg = EnvConfig::default().with_reward_kind(RewardKind::Cumulative);
        let mut env = Environment::new(market(&[100.0, 100.0, 100.0, 60.0, 60.0]), cfg).unwrap();
        env.reset().unwrap();
        env.step(all_in()).unwrap();
        env.step(all_in()).unwrap();

        let crash = env.step(all_in()).unwrap();
        assert_eq!(crash.outcome, StepOutcome::Terminated);
        assert_eq!(crash.record.rewards.target, None);
        // 1000 shares at 60 plus the cash left after the fee.
        assert!((crash.reward - 0.599).abs() < 1e-9);
        assert_eq!(env.status(), EnvStatus::Terminated);
    }

    #[test]
    fn portfolio_is_valued_at_the_close() {
        let hist = InstrumentHistory::new("AAA")
            .with_bar(d(2), Ohlc::new(90.0, 101.0, 89.0, 100.0))
            .with_bar(d(3), Ohlc::new(100.0, 112.0, 99.0, 110.0))
            .with_bar(d(4), Ohlc::new(110.0, 111.0, 100.0, 105.0));
        let data = Arc::new(MarketDataBuilder::new().add_instrument(hist).build().unwrap());
        let mut env = Environment::new(data, EnvConfig::default()).unwrap();

        env.reset().unwrap();
        assert_eq!(env.trajectory().first().unwrap().after.prices()[1], 100.0);

        let step = env.step(Action::hold_cash(2)).unwrap();
        assert_eq!(step.record.after.prices()[1], 110.0);
    }

    #[test]
    fn compute_reward_matches_target_transform() {
        let env = Environment::new(market(&[100.0, 100.0]), EnvConfig::default()).unwrap();
        assert!((env.compute_reward(&[160_000.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(env.compute_reward(&[100_000.0]).unwrap().abs() < 1e-12);
    }

    #[test]
    fn reward_kind_selects_the_returned_scalar() {
        let cfg = EnvConfig::default().with_reward_kind(RewardKind::Cumulative);
        let mut env = Environment::new(market(&[100.0; 3]), cfg).unwrap();
        env.reset().unwrap();
        let step = env.step(Action::hold_cash(2)).unwrap();
        assert_eq!(step.reward, step.record.rewards.cumulative);
        assert_eq!(step.reward, 1.0);
    }
}
