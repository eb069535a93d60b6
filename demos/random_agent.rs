use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use folio_gym::{prelude::*, report::summary};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::info;
use tracing_subscriber::EnvFilter;

const N_DAYS: usize = 120;
const SYMBOLS: [&str; 3] = ["600519.SH", "000858.SZ", "601318.SH"];

fn main() -> Result<()> {
    init_tracing();

    let build_start = Instant::now();
    let data = synthetic_market(7)?;
    let cfg = EnvConfig::default()
        .with_window_len(5)
        .with_max_episode_len(60)
        .with_seed(7);
    info!(run_id = %cfg.hash()?, "Configuration");
    let mut env = Environment::new(data, cfg).context("Failed to build the environment")?;
    let build_time = build_start.elapsed();

    println!("Running random agent...");
    let random_start = Instant::now();
    let journal = env.evaluate_agent(&mut RandomAgent::new(1))?;
    let random_time = random_start.elapsed();
    println!("{}", journal.statistics().tail(Some(5)));

    println!("Running constant-mix grid...");
    let axis = GridAxis::new("0.0", "1.0", "0.1")?;
    let agents = ConstantMix::grid(SYMBOLS.len(), &axis, 0.5)
        .into_iter()
        .enumerate()
        .collect::<Vec<_>>();
    let stream_len = agents.len() as u64;

    let grid_start = Instant::now();
    let summaries = env.evaluate_agents(agents.into_par_iter(), stream_len)?;
    let grid_time = grid_start.elapsed();
    println!("{}", summary::leaderboard(&summaries)?);

    println!("\n--- Evaluation Timings ---");
    println!("1. Environment build time:   {build_time:?}");
    println!("2. Random agent run time:    {random_time:?}");
    println!("3. Grid run time:            {grid_time:?}");

    Ok(())
}

// ================================================================================================
// Tracing Configuration
// ================================================================================================

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio_gym=info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
        .with_current_span(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .init();
}

// ================================================================================================
// Helper Functions
// ================================================================================================

/// Geometric random walks with a 1.5% daily volatility and a 2% intraday range.
fn synthetic_market(seed: u64) -> Result<Arc<MarketData>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2021, 1, 4).context("Invalid start date")?;

    let mut builder = MarketDataBuilder::new();
    for (i, symbol) in SYMBOLS.iter().enumerate() {
        let mut close = 50.0 * (i + 1) as f64;
        let mut hist = InstrumentHistory::new(*symbol);
        for t in 0..N_DAYS {
            let date = start
                .checked_add_days(Days::new(t as u64))
                .context("Date overflow")?;
            let open = close;
            close *= 1.0 + rng.random_range(-0.015..0.015);
            let high = open.max(close) * 1.01;
            let low = open.min(close) * 0.99;
            hist = hist.with_bar(date, Ohlc::new(open, high, low, close));
        }
        builder = builder.add_instrument(hist);
    }
    Ok(Arc::new(builder.build()?))
}

