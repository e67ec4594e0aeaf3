use crate::columns::{ColumnId, ColumnIndex};
use crate::group_key::group_key;
use crate::parser::{DataRow, ParseError, RowSink};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running sum and count for one column
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnStats {
    pub sum: f64,
    pub count: u64,
}

impl ColumnStats {
    #[inline]
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// `sum / count`, or 0 when nothing was accumulated
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// What to do with a token that is not a finite number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericPolicy {
    /// Add 0 to the sum and still count the value
    #[default]
    ZeroFill,
    /// Leave the value out of both sum and count
    Exclude,
}

/// Summary of one successfully parsed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub group_key: String,
    pub file_name: String,
    /// Mean of every tracked column; columns absent from the file are 0
    pub means: BTreeMap<ColumnId, f64>,
    /// Magnitude of the mean wind vector, rounded to the nearest 0.5
    pub derived_wind_speed: f64,
    pub row_count: u64,
}

impl FileSummary {
    pub fn mean(&self, column: ColumnId) -> f64 {
        self.means.get(&column).copied().unwrap_or(0.0)
    }
}

/// Single-pass, fixed-memory statistics for one file
///
/// One slot per [`ColumnId`] regardless of how many rows or header columns the file
/// has. The column index is resolved once from the header; each row then costs
/// O(tokens) with no allocation.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    index: ColumnIndex,
    slots: [ColumnStats; ColumnId::COUNT],
    rows: u64,
    invalid_values: u64,
    policy: NumericPolicy,
}

impl StatsAccumulator {
    pub fn new(policy: NumericPolicy) -> Self {
        Self {
            index: ColumnIndex::default(),
            slots: [ColumnStats::default(); ColumnId::COUNT],
            rows: 0,
            invalid_values: 0,
            policy,
        }
    }

    pub fn column(&self, column: ColumnId) -> &ColumnStats {
        &self.slots[column.slot()]
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Tokens in tracked columns that did not parse as finite numbers
    pub fn invalid_values(&self) -> u64 {
        self.invalid_values
    }

    /// Finalize into a [`FileSummary`]; a file with no data rows yields `EmptyFile`
    pub fn finalize(&self, file_name: &str) -> Result<FileSummary, ParseError> {
        if self.rows == 0 {
            return Err(ParseError::EmptyFile);
        }

        let means: BTreeMap<ColumnId, f64> = ColumnId::ALL
            .iter()
            .map(|&column| (column, self.column(column).mean()))
            .collect();

        let derived_wind_speed = wind_speed(
            self.column(ColumnId::WindX).mean(),
            self.column(ColumnId::WindY).mean(),
            self.column(ColumnId::WindZ).mean(),
        );

        Ok(FileSummary {
            group_key: group_key(file_name),
            file_name: file_name.to_string(),
            means,
            derived_wind_speed,
            row_count: self.rows,
        })
    }
}

impl RowSink for StatsAccumulator {
    fn on_header(&mut self, header: &[String]) {
        self.index = ColumnIndex::resolve(header);
    }

    fn on_row(&mut self, row: &DataRow<'_>) {
        self.rows += 1;
        for (pos, token) in row.tokens().enumerate() {
            let Some(column) = self.index.column_at(pos) else {
                continue;
            };
            let slot = &mut self.slots[column.slot()];
            match parse_finite(token) {
                Some(value) => slot.add(value),
                None => {
                    self.invalid_values += 1;
                    if self.policy == NumericPolicy::ZeroFill {
                        slot.add(0.0);
                    }
                }
            }
        }
    }
}

#[inline]
fn parse_finite(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to the nearest 0.5
pub fn round_to_half(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}

/// Resultant wind speed from mean vector components
///
/// Takes the magnitude of the averaged components, not the average of per-row
/// magnitudes; exported values depend on this order.
pub fn wind_speed(mean_x: f64, mean_y: f64, mean_z: f64) -> f64 {
    round_to_half((mean_x * mean_x + mean_y * mean_y + mean_z * mean_z).sqrt())
}
