use chrono::NaiveDate;
use thiserror::Error;

use crate::exchange_rate::{RatePoint, RateSeries};
use crate::rate_table::RateTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Nearest table date on or after the target.
    Forward,
    /// Nearest table date on or before the target.
    Backward,
}

/// Why a lookup produced nothing. Callers see a single "not found" outcome;
/// the reason is kept for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    DateOutOfRange,
    UnknownDate,
    UnknownCurrency,
    MissingValue,
    EmptyRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no rate found ({reason:?})")]
pub struct NotFound {
    pub reason: NotFoundReason,
}

impl From<NotFoundReason> for NotFound {
    fn from(reason: NotFoundReason) -> Self {
        Self { reason }
    }
}

pub struct RateQuery<'a> {
    table: &'a RateTable,
}

impl<'a> RateQuery<'a> {
    pub fn new(table: &'a RateTable) -> Self {
        Self { table }
    }

    pub fn resolve_closest_date(
        &self,
        target: NaiveDate,
        direction: Direction,
    ) -> Result<NaiveDate, NotFound> {
        let dates = self.table.dates();
        let resolved = match direction {
            Direction::Forward => {
                let idx = dates.partition_point(|d| *d < target);
                dates.get(idx)
            }
            Direction::Backward => {
                let idx = dates.partition_point(|d| *d <= target);
                idx.checked_sub(1).and_then(|i| dates.get(i))
            }
        };

        resolved
            .copied()
            .ok_or(NotFoundReason::DateOutOfRange.into())
    }

    /// Exact lookup, no closest-date fallback. `currency` must already be
    /// upper-cased.
    pub fn get_rate(&self, date: NaiveDate, currency: &str) -> Result<f64, NotFound> {
        let row = self
            .table
            .position(date)
            .ok_or(NotFound::from(NotFoundReason::UnknownDate))?;
        let column = self
            .table
            .column(currency)
            .ok_or(NotFound::from(NotFoundReason::UnknownCurrency))?;

        column[row].ok_or(NotFoundReason::MissingValue.into())
    }

    /// Rates between the closest trading dates inside `[start, end]`,
    /// ascending, with unpublished days left out. Never returns an empty
    /// series.
    pub fn get_rates_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        currency: &str,
    ) -> Result<RateSeries, NotFound> {
        let start = self.resolve_closest_date(start, Direction::Forward)?;
        let end = self.resolve_closest_date(end, Direction::Backward)?;
        let column = self
            .table
            .column(currency)
            .ok_or(NotFound::from(NotFoundReason::UnknownCurrency))?;

        if start > end {
            return Err(NotFoundReason::EmptyRange.into());
        }

        let dates = self.table.dates();
        // Both bounds are table keys at this point.
        let first = dates.partition_point(|d| *d < start);
        let last = dates.partition_point(|d| *d <= end);

        let points: Vec<RatePoint> = dates[first..last]
            .iter()
            .zip(&column[first..last])
            .filter_map(|(date, cell)| cell.map(|rate| RatePoint { date: *date, rate }))
            .collect();

        if points.is_empty() {
            return Err(NotFoundReason::EmptyRange.into());
        }

        Ok(RateSeries(points))
    }
}
