use std::ops::Range;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// An ordered, de-duplicated sequence of trading dates.
///
/// Immutable for the lifetime of a simulation run. All lookups are binary searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar(Vec<NaiveDate>);

impl Calendar {
    /// Builds a calendar from arbitrary dates; input order and duplicates do not matter.
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Result<Self, DataError> {
        let dates = dates.into_iter().sorted_unstable().dedup().collect::<Vec<_>>();
        if dates.is_empty() {
            return Err(DataError::EmptyCalendar);
        }
        Ok(Self(dates))
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.0.last().copied()
    }

    pub fn get(&self, idx: usize) -> Option<NaiveDate> {
        self.0.get(idx).copied()
    }

    /// Number of trading days on or before `date`.
    fn count_on_or_before(&self, date: NaiveDate) -> usize {
        self.0.partition_point(|d| *d <= date)
    }

    /// The trailing `len` trading days ending at (and including) `date`.
    ///
    /// `date` itself does not need to be a trading day; the window ends at the last
    /// trading day on or before it.
    pub fn trailing(&self, date: NaiveDate, len: usize) -> Result<&[NaiveDate], DataError> {
        let end = self.count_on_or_before(date);
        if len == 0 || end < len {
            return Err(DataError::InsufficientHistory {
                date,
                needed: len,
                available: end,
            });
        }
        Ok(&self.0[end - len..end])
    }
}

// ================================================================================================
// Decision Cursor
// ================================================================================================

/// The start date plus at least one date to step into.
const MIN_DECISION_DATES: usize = 2;

/// Walks the decision date range of one episode, one trading day per step.
///
/// The range is a contiguous slice of the calendar; the cursor only stores indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionCursor {
    range: Range<usize>,
    pos: usize,
}

impl DecisionCursor {
    /// Creates a cursor over `[start, stop]`, truncated to at most `max_len` trading days.
    ///
    /// `start` snaps forward to the first trading day on or after it. A range with fewer
    /// than two trading days is rejected, since it leaves nothing to step into.
    pub fn new(
        calendar: &Calendar,
        start: NaiveDate,
        stop: Option<NaiveDate>,
        max_len: usize,
    ) -> Result<Self, DataError> {
        let first = calendar.0.partition_point(|d| *d < start);
        if first >= calendar.len() {
            return Err(DataError::EndOfCalendar(start));
        }
        let mut last = match stop {
            Some(stop) => calendar.count_on_or_before(stop),
            None => calendar.len(),
        };
        if max_len > 0 {
            last = last.min(first + max_len);
        }
        if last < first + MIN_DECISION_DATES {
            return Err(DataError::InsufficientHistory {
                date: start,
                needed: MIN_DECISION_DATES,
                available: last.saturating_sub(first),
            });
        }
        Ok(Self {
            range: first..last,
            pos: first,
        })
    }

    pub fn current(&self, calendar: &Calendar) -> Option<NaiveDate> {
        calendar.get(self.pos)
    }

    pub fn first_date(&self, calendar: &Calendar) -> Option<NaiveDate> {
        calendar.get(self.range.start)
    }

    pub fn last_date(&self, calendar: &Calendar) -> Option<NaiveDate> {
        calendar.get(self.range.end - 1)
    }

    /// Moves forward by exactly one trading day and returns it.
    ///
    /// Returns `None` (and does not move) when already on the last decision date.
    pub fn advance(&mut self, calendar: &Calendar) -> Option<NaiveDate> {
        if self.is_last() {
            return None;
        }
        self.pos += 1;
        calendar.get(self.pos)
    }

    pub fn is_last(&self) -> bool {
        self.pos + 1 >= self.range.end
    }

    /// Number of steps already taken in this episode.
    pub fn steps_taken(&self) -> usize {
        self.pos - self.range.start
    }

    pub fn rewind(&mut self) {
        self.pos = self.range.start;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn calendar() -> Calendar {
        // Unsorted and duplicated on purpose
        Calendar::new([d(5), d(2), d(3), d(3), d(8), d(4), d(9)]).unwrap()
    }

    #[test]
    fn new_sorts_and_dedups() {
        let cal = calendar();
        assert_eq!(cal.dates(), &[d(2), d(3), d(4), d(5), d(8), d(9)]);
        assert!(Calendar::new(Vec::new()).is_err());
    }

    #[test]
    fn trailing_window_ends_at_date() {
        let cal = calendar();
        assert_eq!(cal.trailing(d(5), 3).unwrap(), &[d(3), d(4), d(5)]);
        assert_eq!(cal.trailing(d(7), 2).unwrap(), &[d(4), d(5)]);
        assert_eq!(
            cal.trailing(d(3), 3),
            Err(DataError::InsufficientHistory {
                date: d(3),
                needed: 3,
                available: 2
            })
        );
    }

    #[test]
    fn cursor_walks_until_stop() {
        let cal = calendar();
        let mut cursor = DecisionCursor::new(&cal, d(3), Some(d(8)), 200).unwrap();
        assert_eq!(cursor.current(&cal), Some(d(3)));
        assert_eq!(cursor.last_date(&cal), Some(d(8)));

        assert_eq!(cursor.advance(&cal), Some(d(4)));
        assert_eq!(cursor.advance(&cal), Some(d(5)));
        assert_eq!(cursor.advance(&cal), Some(d(8)));
        assert!(cursor.is_last());
        assert_eq!(cursor.advance(&cal), None);
        assert_eq!(cursor.steps_taken(), 3);

        cursor.rewind();
        assert_eq!(cursor.current(&cal), Some(d(3)));
    }

    #[test]
    fn cursor_needs_a_date_to_step_into() {
        let cal = calendar();
        let single = DecisionCursor::new(&cal, d(8), Some(d(8)), 200);
        assert_eq!(
            single,
            Err(DataError::InsufficientHistory {
                date: d(8),
                needed: 2,
                available: 1
            })
        );
        assert!(DecisionCursor::new(&cal, d(9), None, 200).is_err());
        assert!(DecisionCursor::new(&cal, d(2), None, 1).is_err());
        assert!(DecisionCursor::new(&cal, d(8), None, 200).is_ok());
    }

    #[test]
    fn cursor_respects_max_len() {
        let cal = calendar();
        let cursor = DecisionCursor::new(&cal, d(1), None, 2).unwrap();
        assert_eq!(cursor.first_date(&cal), Some(d(2)));
        assert_eq!(cursor.last_date(&cal), Some(d(3)));
    }
}
