use std::sync::Arc;

use chrono::NaiveDate;
use ndarray::Array2;
use tracing::warn;

use crate::{
    data::{
        calendar::Calendar,
        domain::{Ohlc, Symbol},
        history::{DIAGNOSTIC_COUNT, ForecastRow, InstrumentHistory, MarketData, QuoteRow},
    },
    error::DataError,
};

/// A lookup result that may contain forward-filled rows.
///
/// `missing` lists the instruments whose row for the requested date did not exist
/// and was replaced by the most recent earlier row.
#[derive(Debug, Clone, PartialEq)]
pub struct Filled<T> {
    pub value: T,
    pub missing: Vec<Symbol>,
}

impl<T> Filled<T> {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Read-only access to quote windows, forecasts and bars.
///
/// Every method is a pure function of the shared tables and the calendar.
/// Matrices are laid out with one column per instrument.
#[derive(Debug, Clone)]
pub struct WindowProvider {
    data: Arc<MarketData>,
    window_len: usize,
}

impl WindowProvider {
    pub fn new(data: Arc<MarketData>, window_len: usize) -> Self {
        Self { data, window_len }
    }

    pub fn data(&self) -> &MarketData {
        &self.data
    }

    pub fn calendar(&self) -> &Calendar {
        self.data.calendar()
    }

    /// Number of rows of a window matrix.
    pub fn window_rows(&self) -> usize {
        self.window_len * self.data.feature_width()
    }

    /// Number of rows of a prediction matrix.
    pub fn prediction_rows(&self) -> usize {
        self.data.horizon() + DIAGNOSTIC_COUNT
    }

    /// Length of the flattened per-step observation.
    pub fn observation_len(&self) -> usize {
        (self.window_rows() + self.prediction_rows()) * self.data.n_instruments()
    }

    /// The first date that has a full trailing window.
    pub fn first_full_window(&self) -> Result<NaiveDate, DataError> {
        let idx = self.window_len.max(1) - 1;
        self.calendar()
            .get(idx)
            .ok_or(DataError::InsufficientHistory {
                date: self.calendar().last().unwrap_or_default(),
                needed: self.window_len,
                available: self.calendar().len(),
            })
    }

    // ============================================================================================
    // Lookups
    // ============================================================================================

    /// Per-instrument bars for `date`, forward-filled where a row is absent.
    pub fn bars(&self, date: NaiveDate) -> Result<Filled<Vec<Ohlc>>, DataError> {
        let mut missing = Vec::new();
        let bars = self
            .data
            .instruments()
            .iter()
            .map(|inst| quote_or_fill(inst, date, &mut missing).map(|row| row.bar))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Filled {
            value: bars,
            missing,
        })
    }

    /// Trailing `window_len` quote rows ending at `date`, shaped `(window_len * features) x N`.
    ///
    /// Row `t * features + f` holds feature `f` of the `t`-th day of the window (oldest first).
    pub fn window(&self, date: NaiveDate) -> Result<Filled<Array2<f64>>, DataError> {
        let dates = self.calendar().trailing(date, self.window_len)?;
        let width = self.data.feature_width();
        let mut out = Array2::zeros((self.window_rows(), self.data.n_instruments()));
        let mut missing = Vec::new();

        for (col, inst) in self.data.instruments().iter().enumerate() {
            let mut inst_missing = Vec::new();
            for (t, day) in dates.iter().enumerate() {
                let row = quote_or_fill(inst, *day, &mut inst_missing)?;
                for (f, value) in row.features.iter().enumerate() {
                    out[[t * width + f, col]] = *value;
                }
            }
            if !inst_missing.is_empty() {
                missing.push(inst.symbol().clone());
            }
        }

        Ok(Filled {
            value: out,
            missing,
        })
    }

    /// The first forecast strictly after `date`, shaped `(horizon + 4) x N`.
    ///
    /// Predictions come first, then the four training diagnostics. Without forecast
    /// tables the matrix is all zeros.
    pub fn prediction(&self, date: NaiveDate) -> Result<Filled<Array2<f64>>, DataError> {
        let mut out = Array2::zeros((self.prediction_rows(), self.data.n_instruments()));
        if !self.data.has_forecasts() {
            return Ok(Filled {
                value: out,
                missing: Vec::new(),
            });
        }

        let mut missing = Vec::new();
        for (col, inst) in self.data.instruments().iter().enumerate() {
            let row = forecast_or_fill(inst, date, &mut missing)?;
            for (r, value) in row.values().enumerate() {
                out[[r, col]] = value;
            }
        }

        Ok(Filled {
            value: out,
            missing,
        })
    }

    /// Flattens a window and a prediction matrix into the per-instrument observation:
    /// instrument `i`'s window column followed by its prediction column.
    pub fn observation_features(window: &Array2<f64>, prediction: &Array2<f64>) -> Vec<f64> {
        window
            .columns()
            .into_iter()
            .zip(prediction.columns())
            .flat_map(|(w, p)| w.iter().chain(p.iter()).copied().collect::<Vec<_>>())
            .collect()
    }
}

// ================================================================================================
// Forward-Fill
// ================================================================================================

fn quote_or_fill<'a>(
    inst: &'a InstrumentHistory,
    date: NaiveDate,
    missing: &mut Vec<Symbol>,
) -> Result<&'a QuoteRow, DataError> {
    match inst.quote(date) {
        Ok(row) => Ok(row),
        Err(DataError::Missing { .. }) => {
            let row = inst.quote_on_or_before(date)?;
            warn!(symbol = %inst.symbol(), %date, "Quote missing, forward-filling previous row");
            missing.push(inst.symbol().clone());
            Ok(row)
        }
        Err(e) => Err(e),
    }
}

fn forecast_or_fill<'a>(
    inst: &'a InstrumentHistory,
    date: NaiveDate,
    missing: &mut Vec<Symbol>,
) -> Result<&'a ForecastRow, DataError> {
    match inst.forecast_after(date) {
        Ok(row) => Ok(row),
        Err(DataError::Missing { .. }) => {
            let row = inst.forecast_on_or_before(date)?;
            warn!(symbol = %inst.symbol(), %date, "Forecast missing, forward-filling latest row");
            missing.push(inst.symbol().clone());
            Ok(row)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::history::MarketDataBuilder;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn diag() -> [f64; 4] {
        [0.5, 0.6, 0.7, 0.8]
    }

    // AAA trades every day, BBB skips day 3.
    fn provider(window_len: usize) -> WindowProvider {
        let aaa = InstrumentHistory::new("AAA")
            .with_bar(d(1), Ohlc::new(10.0, 11.0, 9.0, 10.5))
            .with_bar(d(2), Ohlc::new(10.5, 12.0, 10.0, 11.0))
            .with_bar(d(3), Ohlc::new(11.0, 11.5, 10.5, 11.2))
            .with_forecast(d(2), ForecastRow::new(vec![11.1, 11.3], diag()))
            .with_forecast(d(3), ForecastRow::new(vec![11.4, 11.6], diag()));
        let bbb = InstrumentHistory::new("BBB")
            .with_bar(d(1), Ohlc::flat(20.0))
            .with_bar(d(2), Ohlc::flat(21.0))
            .with_forecast(d(2), ForecastRow::new(vec![21.5, 22.0], diag()));
        let data = MarketDataBuilder::new()
            .add_instrument(aaa)
            .add_instrument(bbb)
            .build()
            .unwrap();
        WindowProvider::new(Arc::new(data), window_len)
    }

    #[test]
    fn bars_forward_fill_missing_rows() {
        let wp = provider(1);
        let filled = wp.bars(d(3)).unwrap();
        assert_eq!(filled.value[0].close.0, 11.2);
        assert_eq!(filled.value[1], Ohlc::flat(21.0));
        assert_eq!(filled.missing, vec![Symbol::from("BBB")]);
        assert!(wp.bars(d(2)).unwrap().is_complete());
    }

    #[test]
    fn window_is_time_major_per_column() {
        let wp = provider(2);
        let w = wp.window(d(2)).unwrap();
        assert_eq!(w.value.shape(), &[8, 2]);
        // day 1 close, then day 2 open for AAA
        assert_eq!(w.value[[3, 0]], 10.5);
        assert_eq!(w.value[[4, 0]], 10.5);
        assert_eq!(w.value[[7, 1]], 21.0);
        assert!(w.is_complete());
        assert!(wp.window(d(1)).is_err());
    }

    #[test]
    fn prediction_uses_next_forecast() {
        let wp = provider(1);
        let p = wp.prediction(d(2)).unwrap();
        assert_eq!(p.value.shape(), &[6, 2]);
        assert_eq!(p.value[[0, 0]], 11.4);
        assert_eq!(p.value[[5, 0]], 0.8);
        // BBB has nothing after day 2 and falls back to its latest forecast
        assert_eq!(p.value[[0, 1]], 21.5);
        assert_eq!(p.missing, vec![Symbol::from("BBB")]);
    }

    #[test]
    fn observation_concatenates_window_and_prediction() {
        let wp = provider(1);
        let w = wp.window(d(2)).unwrap().value;
        let p = wp.prediction(d(1)).unwrap().value;
        let obs = WindowProvider::observation_features(&w, &p);
        assert_eq!(obs.len(), wp.observation_len());
        assert_eq!(&obs[..4], &[10.5, 12.0, 10.0, 11.0]);
        assert_eq!(obs[4], 11.1);
        assert_eq!(obs[10], 21.0);
    }

    #[test]
    fn first_full_window_respects_length() {
        assert_eq!(provider(1).first_full_window().unwrap(), d(1));
        assert_eq!(provider(3).first_full_window().unwrap(), d(3));
        assert!(provider(4).first_full_window().is_err());
    }
}
