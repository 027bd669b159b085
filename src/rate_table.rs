use std::collections::HashMap;

use chrono::NaiveDate;
use log::warn;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("duplicate currency column {0}")]
    DuplicateCurrency(String),
    #[error("row for {date} has {found} cells, expected {expected}")]
    RowWidth {
        date: NaiveDate,
        found: usize,
        expected: usize,
    },
}

/// Date-indexed table of rates against the base currency.
///
/// Dates are unique and ascending. Each currency owns one column with a cell
/// per date; `None` marks a day with no published rate.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    dates: Vec<NaiveDate>,
    currencies: Vec<String>,
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl RateTable {
    pub fn new(
        currencies: Vec<String>,
        mut rows: Vec<(NaiveDate, Vec<Option<f64>>)>,
    ) -> Result<Self, TableError> {
        let mut columns: HashMap<String, Vec<Option<f64>>> = HashMap::with_capacity(currencies.len());
        for code in &currencies {
            if columns.insert(code.clone(), Vec::with_capacity(rows.len())).is_some() {
                return Err(TableError::DuplicateCurrency(code.clone()));
            }
        }

        // Stable, so the first row for a repeated date stays in front.
        rows.sort_by_key(|(date, _)| *date);

        let mut dates = Vec::with_capacity(rows.len());
        for (date, cells) in rows {
            if cells.len() != currencies.len() {
                return Err(TableError::RowWidth {
                    date,
                    found: cells.len(),
                    expected: currencies.len(),
                });
            }
            if dates.last() == Some(&date) {
                warn!("Dropping duplicate row for {}", date);
                continue;
            }

            dates.push(date);
            for (code, cell) in currencies.iter().zip(cells) {
                if let Some(column) = columns.get_mut(code) {
                    column.push(cell.filter(|v| v.is_finite()));
                }
            }
        }

        Ok(Self {
            dates,
            currencies,
            columns,
        })
    }

    /// Currency codes in column order.
    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn column(&self, currency: &str) -> Option<&[Option<f64>]> {
        self.columns.get(currency).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Row index of `date`, if it is a key of the table.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }
}
