use std::{collections::BTreeMap, ops::Bound};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    data::{
        calendar::Calendar,
        domain::{Ohlc, Symbol},
    },
    error::DataError,
};

/// Number of training diagnostics attached to every forecast row
/// (`epoch_loss`, `epoch_val_loss`, `epoch_acc`, `epoch_val_acc`).
pub const DIAGNOSTIC_COUNT: usize = 4;

// ================================================================================================
// Rows
// ================================================================================================

/// One day of quotes for one instrument.
///
/// `bar` drives order matching and valuation (the close is the instrument's price),
/// `features` is the opaque observation payload shown to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    pub bar: Ohlc,
    pub features: Vec<f64>,
}

impl QuoteRow {
    pub fn new(bar: Ohlc, features: Vec<f64>) -> Self {
        Self { bar, features }
    }

    /// Uses `[open, high, low, close]` as the observation features.
    pub fn from_bar(bar: Ohlc) -> Self {
        Self {
            bar,
            features: bar.as_array().to_vec(),
        }
    }
}

/// One forecast produced by the external forecasting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    /// Predicted values for the next `horizon` trading days.
    pub predictions: Vec<f64>,
    /// Training diagnostics of the model that produced the forecast.
    pub diagnostics: [f64; DIAGNOSTIC_COUNT],
}

impl ForecastRow {
    pub fn new(predictions: Vec<f64>, diagnostics: [f64; DIAGNOSTIC_COUNT]) -> Self {
        Self {
            predictions,
            diagnostics,
        }
    }

    pub fn width(&self) -> usize {
        self.predictions.len() + DIAGNOSTIC_COUNT
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.predictions
            .iter()
            .chain(self.diagnostics.iter())
            .copied()
    }
}

// ================================================================================================
// Per-Instrument Tables
// ================================================================================================

/// Quote and forecast tables of one instrument, indexed by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentHistory {
    symbol: Symbol,
    quotes: BTreeMap<NaiveDate, QuoteRow>,
    forecasts: BTreeMap<NaiveDate, ForecastRow>,
}

impl InstrumentHistory {
    pub fn new(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            quotes: BTreeMap::new(),
            forecasts: BTreeMap::new(),
        }
    }

    pub fn with_quote(mut self, date: NaiveDate, row: QuoteRow) -> Self {
        self.quotes.insert(date, row);
        self
    }

    pub fn with_bar(self, date: NaiveDate, bar: Ohlc) -> Self {
        self.with_quote(date, QuoteRow::from_bar(bar))
    }

    pub fn with_forecast(mut self, date: NaiveDate, row: ForecastRow) -> Self {
        self.forecasts.insert(date, row);
        self
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn quotes(&self) -> &BTreeMap<NaiveDate, QuoteRow> {
        &self.quotes
    }

    pub fn forecasts(&self) -> &BTreeMap<NaiveDate, ForecastRow> {
        &self.forecasts
    }

    /// The quote row dated exactly `date`.
    pub fn quote(&self, date: NaiveDate) -> Result<&QuoteRow, DataError> {
        self.quotes.get(&date).ok_or_else(|| self.missing(date))
    }

    /// The most recent quote row on or before `date` (forward-fill source).
    pub fn quote_on_or_before(&self, date: NaiveDate) -> Result<&QuoteRow, DataError> {
        self.quotes
            .range(..=date)
            .next_back()
            .map(|(_, row)| row)
            .ok_or_else(|| self.no_history(date))
    }

    /// The first forecast row strictly after `date`.
    pub fn forecast_after(&self, date: NaiveDate) -> Result<&ForecastRow, DataError> {
        self.forecasts
            .range((Bound::Excluded(date), Bound::Unbounded))
            .next()
            .map(|(_, row)| row)
            .ok_or_else(|| self.missing(date))
    }

    /// The most recent forecast row on or before `date` (forward-fill source).
    pub fn forecast_on_or_before(&self, date: NaiveDate) -> Result<&ForecastRow, DataError> {
        self.forecasts
            .range(..=date)
            .next_back()
            .map(|(_, row)| row)
            .ok_or_else(|| self.no_history(date))
    }

    fn missing(&self, date: NaiveDate) -> DataError {
        DataError::Missing {
            symbol: self.symbol.to_string(),
            date,
        }
    }

    fn no_history(&self, date: NaiveDate) -> DataError {
        DataError::NoHistory {
            symbol: self.symbol.to_string(),
            date,
        }
    }
}

// ================================================================================================
// Market Data
// ================================================================================================

/// The immutable historical tables backing a simulation run.
///
/// Materialized once by the caller and shared (behind an `Arc`) between cloned environments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    calendar: Calendar,
    instruments: Vec<InstrumentHistory>,
    feature_width: usize,
    horizon: usize,
    has_forecasts: bool,
}

impl MarketData {
    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn instruments(&self) -> &[InstrumentHistory] {
        &self.instruments
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.instruments.iter().map(|i| i.symbol().clone()).collect()
    }

    /// Number of tradable instruments (cash excluded).
    pub fn n_instruments(&self) -> usize {
        self.instruments.len()
    }

    /// Number of features per quote row.
    pub fn feature_width(&self) -> usize {
        self.feature_width
    }

    /// Number of predicted values per forecast row.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Whether forecast tables were supplied at all.
    pub fn has_forecasts(&self) -> bool {
        self.has_forecasts
    }
}

#[derive(Debug, Default)]
pub struct MarketDataBuilder {
    calendar: Option<Calendar>,
    instruments: Vec<InstrumentHistory>,
}

impl MarketDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calendar(self, calendar: Calendar) -> Self {
        Self {
            calendar: Some(calendar),
            ..self
        }
    }

    pub fn add_instrument(mut self, history: InstrumentHistory) -> Self {
        self.instruments.push(history);
        self
    }

    /// Validates table shapes and freezes the data.
    ///
    /// Without an explicit calendar the union of all quote dates is used.
    pub fn build(self) -> Result<MarketData, DataError> {
        if self.instruments.is_empty() {
            return Err(DataError::Shape("no instruments".to_string()));
        }

        let calendar = match self.calendar {
            Some(c) => c,
            None => Calendar::new(
                self.instruments
                    .iter()
                    .flat_map(|i| i.quotes.keys().copied()),
            )?,
        };

        let feature_width = uniform_width(
            &self.instruments,
            "quote feature",
            |i| i.quotes.values().map(|q| q.features.len()).collect(),
        )?;
        let horizon = uniform_width(&self.instruments, "forecast horizon", |i| {
            i.forecasts.values().map(|f| f.predictions.len()).collect()
        })?;

        let with_forecasts = self
            .instruments
            .iter()
            .filter(|i| !i.forecasts.is_empty())
            .count();
        if with_forecasts != 0 && with_forecasts != self.instruments.len() {
            return Err(DataError::Shape(format!(
                "{with_forecasts} of {} instruments carry forecasts",
                self.instruments.len()
            )));
        }

        Ok(MarketData {
            calendar,
            instruments: self.instruments,
            feature_width,
            horizon,
            has_forecasts: with_forecasts > 0,
        })
    }
}

/// All rows of all instruments must agree on a width; empty tables are allowed.
fn uniform_width(
    instruments: &[InstrumentHistory],
    what: &str,
    widths: impl Fn(&InstrumentHistory) -> Vec<usize>,
) -> Result<usize, DataError> {
    let mut found: Option<usize> = None;
    for inst in instruments {
        for w in widths(inst) {
            match found {
                None => found = Some(w),
                Some(prev) if prev != w => {
                    return Err(DataError::Shape(format!(
                        "{what} width of '{}' is {w}, expected {prev}",
                        inst.symbol
                    )));
                }
                Some(_) => {}
            }
        }
    }
    Ok(found.unwrap_or(0))
}
