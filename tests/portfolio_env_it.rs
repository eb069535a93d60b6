mod common;

use anyhow::Result;
use folio_gym::prelude::*;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::common::{
    EPS, day, flat_history, market, three_asset_market, weights_action, wiggle,
};

// ================================================================================================
// Execution
// ================================================================================================

#[test]
fn half_allocation_buys_five_hundred_and_pays_the_fee() -> Result<()> {
    let data = market(vec![flat_history("AAA", &[100.0; 4])]);
    let mut env = Environment::new(data, EnvConfig::default())?;
    env.reset()?;

    let placed = env.step(weights_action(&[0.5, 0.5]))?;
    let order = &placed.record.placed[0];
    assert_eq!(order.side(), Side::Buy);
    assert_eq!(order.quantity(), Quantity(500));
    assert_eq!(order.limit_price(), Price(100.0));
    assert!((placed.record.after.cash() - 100_000.0).abs() < EPS);

    let filled = env.step(weights_action(&[0.5, 0.5]))?;
    let record = filled.record;
    assert_eq!(record.resolved.len(), 1);
    assert_eq!(record.resolved[0].status(), OrderStatus::Traded);
    assert_eq!(record.resolved[0].fill_price(), Some(Price(100.0)));

    let expected_cash = 100_000.0 - 500.0 * 100.0 * 1.001;
    assert!((record.after.cash() - expected_cash).abs() < EPS);
    assert_eq!(record.after.holdings()[1], 500.0);
    assert!((record.fees - 50.0).abs() < EPS);
    assert!((record.before.total() - record.fees - record.after.total()).abs() < EPS);
    Ok(())
}

#[test]
fn daily_losses_trip_the_circuit_breaker() -> Result<()> {
    let closes = [100.0, 100.0, 100.0, 85.0, 72.25, 61.41];
    let data = market(vec![flat_history("AAA", &closes)]);
    let mut env = Environment::new(data, EnvConfig::default())?;
    env.reset()?;

    let all_in = weights_action(&[0.0, 1.0]);
    assert_eq!(env.step(all_in.clone())?.outcome, StepOutcome::InProgress);
    assert_eq!(env.step(all_in.clone())?.outcome, StepOutcome::InProgress);

    let crash = env.step(all_in.clone())?;
    assert_eq!(crash.outcome, StepOutcome::Terminated);
    assert!(crash.record.rewards.cumulative < 0.9);
    assert_eq!(crash.record.date, day(3));
    assert_eq!(env.status(), EnvStatus::Terminated);

    let err = env.step(all_in).unwrap_err();
    match err {
        FolioError::Env(EnvError::SequenceViolation { status, date, .. }) => {
            assert_eq!(status, EnvStatus::Terminated);
            assert_eq!(date, Some(day(3)));
        }
        other => panic!("expected a sequence violation, got {other}"),
    }
    Ok(())
}

#[test]
fn missing_row_is_forward_filled_and_flagged() -> Result<()> {
    let gappy = InstrumentHistory::new("BBB")
        .with_bar(day(0), Ohlc::flat(50.0))
        .with_bar(day(1), Ohlc::flat(51.0))
        .with_bar(day(3), Ohlc::flat(53.0));
    let data = market(vec![flat_history("AAA", &[100.0; 4]), gappy]);
    let mut env = Environment::new(data, EnvConfig::default())?;
    env.reset()?;

    let clean = env.step(Action::hold_cash(3))?;
    assert!(!clean.record.data_missing);

    let filled = env.step(Action::hold_cash(3))?;
    assert_eq!(filled.record.date, day(2));
    assert!(filled.record.data_missing);
    assert!(filled.observation.data_missing);
    assert_eq!(filled.record.missing_symbols, vec![Symbol::from("BBB")]);
    assert_eq!(filled.record.after.prices()[2], 51.0);
    Ok(())
}

// ================================================================================================
// Invariants
// ================================================================================================

#[test]
fn random_run_keeps_portfolio_invariants() -> Result<()> {
    let cfg = EnvConfig::default().with_seed(11);
    let mut env = Environment::new(three_asset_market(), cfg)?;
    let mut agent = RandomAgent::new(3);
    env.evaluate_agent(&mut agent)?;

    for record in env.trajectory().records() {
        let v = &record.after;
        assert_eq!(v.prices()[0], 1.0);

        let assets = v.assets();
        for (i, a) in assets.iter().enumerate() {
            assert!((a - v.prices()[i] * v.holdings()[i]).abs() < EPS);
        }
        for h in &v.holdings()[1..] {
            assert_eq!(h % 100.0, 0.0);
            assert!(*h >= 0.0);
        }
        let weight_sum: f64 = v.weights().iter().sum();
        assert!((weight_sum - 1.0).abs() < EPS);
        assert!((v.total() - record.total_asset).abs() < EPS);

        for order in record.placed.iter().chain(&record.resolved) {
            assert_eq!(order.quantity().0 % 100, 0);
            assert!(!order.quantity().is_zero());
        }
    }
    Ok(())
}

#[test]
fn same_seed_replays_bit_identically() -> Result<()> {
    let cfg = EnvConfig::default().with_seed(42);

    let mut first = Environment::new(three_asset_market(), cfg.clone())?;
    first.evaluate_agent(&mut RandomAgent::new(9))?;

    let mut second = Environment::new(three_asset_market(), cfg)?;
    second.evaluate_agent(&mut RandomAgent::new(9))?;

    assert_eq!(first.trajectory(), second.trajectory());
    assert_eq!(first.trajectory().to_json()?, second.trajectory().to_json()?);

    // Resetting the same environment replays the episode as well.
    let replay = first.trajectory().clone();
    first.evaluate_agent(&mut RandomAgent::new(9))?;
    assert_eq!(first.trajectory(), &replay);
    Ok(())
}

// ================================================================================================
// Evaluation & Reports
// ================================================================================================

#[test]
fn journal_frames_cover_the_trajectory() -> Result<()> {
    let mut env = Environment::new(three_asset_market(), EnvConfig::default())?;
    let journal = env.evaluate_agent(&mut ConstantMix::equal_weight(3, 0.6, 0.5))?;

    let records = env.trajectory().records();
    let orders: usize = records
        .iter()
        .map(|r| r.placed.len() + r.resolved.len())
        .sum();

    assert_eq!(journal.statistics().height(), records.len());
    assert_eq!(journal.portfolio().height(), records.len() * 4);
    assert_eq!(journal.orders().height(), orders);
    assert!(orders > 0);
    Ok(())
}

#[test]
fn parallel_grid_is_ranked_by_final_cumulative_reward() -> Result<()> {
    let data = market(vec![
        flat_history("AAA", &wiggle(100.0, 0.0, 20)),
        flat_history("BBB", &wiggle(60.0, 1.5, 20)),
    ]);
    let env = Environment::new(data, EnvConfig::default())?;

    let axis = GridAxis::new("0.0", "1.0", "0.25")?;
    let agents = ConstantMix::grid(2, &axis, 0.0)
        .into_iter()
        .enumerate()
        .collect::<Vec<_>>();
    let n = agents.len() as u64;

    let summaries = env.evaluate_agents(agents.into_par_iter(), n)?;
    assert_eq!(summaries.len(), 4);
    assert!(
        summaries
            .windows(2)
            .all(|w| w[0].final_cumulative >= w[1].final_cumulative)
    );
    assert_eq!(env.status(), EnvStatus::Uninitialized);

    // The all-cash agent never trades.
    let cash = summaries
        .iter()
        .find(|s| s.agent_uid == 0)
        .expect("agent 0 was evaluated");
    assert!((cash.final_cumulative - 1.0).abs() < EPS);
    assert_eq!(cash.total_fees, 0.0);
    Ok(())
}
