//! In-memory tabular model shared by every pipeline stage.
//!
//! - [`Cell`] - a single typed value (null, integer, float, text or date)
//! - [`Table`] - a named table with ordered columns and rows of cells
//!
//! Tables are plain owned values: every builder returns a new table and
//! never touches its input.

use std::borrow::Cow;
use std::fmt;

use chrono::NaiveDate;
use serde_json::{Number, Value};

use crate::error::{TransformError, TransformResult};

/// Canonical date layout used for CSV output and remote payloads.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Cell
// =============================================================================

/// A single value of a table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Missing value.
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    /// Calendar date, without time of day.
    Date(NaiveDate),
}

/// Hashable view of a [`Cell`], used for deduplication.
///
/// Floats compare by bit pattern, so `0.1 + 0.2` and `0.3` are distinct keys
/// while two missing values are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKey<'a> {
    Null,
    Int(i64),
    Float(u64),
    Text(&'a str),
    Date(NaiveDate),
}

impl Cell {
    /// Build a text cell, mapping empty strings to [`Cell::Null`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Null
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn key(&self) -> CellKey<'_> {
        match self {
            Cell::Null => CellKey::Null,
            Cell::Int(v) => CellKey::Int(*v),
            Cell::Float(v) if v.is_nan() => CellKey::Null,
            Cell::Float(v) => CellKey::Float(v.to_bits()),
            Cell::Text(s) => CellKey::Text(s),
            Cell::Date(d) => CellKey::Date(*d),
        }
    }

    /// Render the cell as a CSV field.
    ///
    /// Missing values become an empty field and floats always keep a
    /// fractional part (`100.0`), so integer and float columns stay
    /// distinguishable after a round trip.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Cell::Null => Cow::Borrowed(""),
            Cell::Int(v) => Cow::Owned(v.to_string()),
            Cell::Float(v) => Cow::Owned(format_float(*v)),
            Cell::Text(s) => Cow::Borrowed(s),
            Cell::Date(d) => Cow::Owned(d.format(DATE_FORMAT).to_string()),
        }
    }

    /// Convert to a JSON value for a remote payload.
    ///
    /// Missing values (including NaN and infinities) become an explicit
    /// `null` and dates become `YYYY-MM-DD` strings.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Int(v) => Value::Number((*v).into()),
            Cell::Float(v) => Number::from_f64(*v).map(Value::Number).unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::text(v)
    }
}

impl From<NaiveDate> for Cell {
    fn from(v: NaiveDate) -> Self {
        Cell::Date(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Null)
    }
}

fn format_float(v: f64) -> String {
    if !v.is_finite() {
        String::new()
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

// =============================================================================
// Table
// =============================================================================

/// A named table: ordered column names and rows holding one cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn name(&self) -> &str {
        &self.name
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

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Position of a column that `building` cannot do without.
    pub fn require_column(&self, column: &str, building: &str) -> TransformResult<usize> {
        self.column_index(column).ok_or_else(|| TransformError::MissingColumn {
            table: building.to_string(),
            column: column.to_string(),
        })
    }

    /// Cell at `row` in the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All cells of the named column, in row order.
    pub fn column_values<'a>(
        &'a self,
        column: &str,
    ) -> Option<impl Iterator<Item = &'a Cell> + 'a> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }
}
