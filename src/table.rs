//! Flat, time-ordered table of a session's samples.
//!
//! One row per sample, a leading `time` column, then one column per metric
//! name seen anywhere in the session (sorted). A metric missing from a sample
//! is [`Cell::Absent`], never zero. In CSV an absent cell is the only empty
//! field; a NaN or infinite reading is written as `NaN`, `inf` or `-inf`.

use crate::collectors::MetricValue;
use crate::sampler::SampleSeries;
use std::fmt::Write as _;

pub const TIME_COLUMN: &str = "time";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Absent,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }

    fn write_csv(&self, out: &mut String) {
        match self {
            Cell::Absent => {}
            // Non-finite values are spelled `NaN`, `inf` and `-inf`, never empty.
            Cell::Number(v) => {
                let _ = write!(out, "{v}");
            }
            Cell::Text(s) => write_csv_field(out, s),
        }
    }
}

impl From<&MetricValue> for Cell {
    fn from(value: &MetricValue) -> Self {
        match value {
            MetricValue::Number(v) => Cell::Number(*v),
            MetricValue::Text(s) => Cell::Text(s.clone()),
        }
    }
}

impl From<Option<&MetricValue>> for Cell {
    fn from(value: Option<&MetricValue>) -> Self {
        value.map_or(Cell::Absent, Cell::from)
    }
}

fn write_csv_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl SampleTable {
    pub fn from_series(series: &SampleSeries) -> Self {
        let names: Vec<&str> = series
            .metric_names()
            .into_iter()
            .filter(|name| *name != TIME_COLUMN)
            .collect();

        let mut columns = Vec::with_capacity(names.len() + 1);
        columns.push(TIME_COLUMN.to_string());
        columns.extend(names.iter().map(|n| n.to_string()));

        let rows = series
            .iter()
            .map(|sample| {
                let mut row = Vec::with_capacity(columns.len());
                row.push(Cell::Number(sample.timestamp));
                row.extend(names.iter().map(|name| Cell::from(sample.get(name))));
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Keep only columns for which `keep` returns true.
    pub fn retain_columns<P: FnMut(&str) -> bool>(&mut self, mut keep: P) {
        let mask: Vec<bool> = self.columns.iter().map(|c| keep(c)).collect();
        let mut i = 0;
        self.columns.retain(|_| {
            i += 1;
            mask[i - 1]
        });
        for row in &mut self.rows {
            let mut i = 0;
            row.retain(|_| {
                i += 1;
                mask[i - 1]
            });
        }
    }

    /// Append a column; `cells` must have one entry per row.
    pub fn push_column(&mut self, name: impl Into<String>, cells: Vec<Cell>) {
        assert_eq!(cells.len(), self.rows.len(), "column length must match row count");
        self.columns.push(name.into());
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
    }

    /// Apply `f` to every cell of a column. Returns false if it does not exist.
    pub fn map_column<F: FnMut(&Cell) -> Cell>(&mut self, name: &str, mut f: F) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        true
    }

    /// Apply `f` to every numeric cell in the table.
    pub fn map_numbers<F: FnMut(&str, f64) -> f64>(&mut self, mut f: F) {
        for row in &mut self.rows {
            for (column, cell) in self.columns.iter().zip(row.iter_mut()) {
                if let Cell::Number(v) = cell {
                    *v = f(column, *v);
                }
            }
        }
    }

    /// Header line plus one line per row. Absent cells are empty fields.
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_csv_field(&mut out, column);
        }
        out.push('\n');

        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                cell.write_csv(&mut out);
            }
            out.push('\n');
        }
        out
    }
}
