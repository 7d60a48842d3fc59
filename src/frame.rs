//! In-memory tabular frames.
//!
//! `Frame` is the tabular value passed between the sandbox, the chart
//! helpers, and the result envelope. Columns keep their source order and
//! rows are row-major; cells are JSON values so frames round-trip
//! cleanly through the serialized envelope.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// An ordered-column, row-major table of JSON values.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Serialized form of a tabular result:
/// `{"type": "dataframe", "columns": [...], "records": [...]}` where each
/// record is an ordered mapping in column order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FrameEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub columns: Vec<String>,
    pub records: Vec<Map<String, Value>>,
}

impl Frame {
    /// Build a frame from pre-shaped parts. Every row must match the
    /// column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for row in &rows {
            if row.len() != columns.len() {
                return Err(Error::InvalidChartData(format!(
                    "row has {} values but the frame has {} columns",
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a frame from ordered `(name, values)` columns. All columns
    /// must have the same length.
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let expected = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        for (name, values) in &columns {
            if values.len() != expected {
                return Err(Error::InvalidChartData(format!(
                    "column '{}' has {} values but '{}' has {}",
                    name,
                    values.len(),
                    columns[0].0,
                    expected
                )));
            }
        }
        let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let rows = (0..expected)
            .map(|row| columns.iter().map(|(_, values)| values[row].clone()).collect())
            .collect();
        Ok(Self { columns: names, rows })
    }

    /// Build a frame from a list of record mappings. Column order is the
    /// first-seen order across records; missing cells become null.
    pub fn from_records(records: &[Value]) -> Result<Self> {
        let mut objects = Vec::with_capacity(records.len());
        for record in records {
            let object = record.as_object().ok_or_else(|| {
                Error::InvalidChartData(format!(
                    "every record must be an object, found {}",
                    json_kind(record)
                ))
            })?;
            objects.push(object);
        }
        let mut columns: Vec<String> = Vec::new();
        for object in &objects {
            for key in object.keys() {
                if !columns.iter().any(|name| name == key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = objects
            .iter()
            .map(|object| {
                columns
                    .iter()
                    .map(|name| object.get(name).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Ok(Self { columns, rows })
    }

    /// Column names in source order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[index].clone()).collect())
    }

    /// The first `n` rows as a new frame.
    pub fn head(&self, n: usize) -> Frame {
        Frame {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Values of one column as floats, for plotting. Null cells become
    /// NaN; anything non-numeric is an error.
    pub fn numeric_values(&self, name: &str) -> Result<Vec<f64>> {
        let index = self.column_index(name).ok_or_else(|| {
            Error::InvalidChartData(format!("unknown column '{name}'"))
        })?;
        self.rows
            .iter()
            .map(|row| match &row[index] {
                Value::Null => Ok(f64::NAN),
                Value::Number(number) => number.as_f64().ok_or_else(|| {
                    Error::InvalidChartData(format!(
                        "column '{name}' holds a number outside the float range"
                    ))
                }),
                other => Err(Error::InvalidChartData(format!(
                    "column '{name}' holds {} where a number is required",
                    json_kind(other)
                ))),
            })
            .collect()
    }

    /// Values of one column as display labels.
    pub fn labels(&self, name: &str) -> Result<Vec<String>> {
        let index = self.column_index(name).ok_or_else(|| {
            Error::InvalidChartData(format!("unknown column '{name}'"))
        })?;
        Ok(self.rows.iter().map(|row| cell_text(&row[index])).collect())
    }

    /// First column whose non-null values are all numbers.
    pub fn first_numeric_column(&self) -> Option<&str> {
        (0..self.columns.len())
            .find(|&index| self.column_is_numeric(index))
            .map(|index| self.columns[index].as_str())
    }

    /// First column holding anything other than numbers.
    pub fn first_categorical_column(&self) -> Option<&str> {
        (0..self.columns.len())
            .find(|&index| !self.column_is_numeric(index))
            .map(|index| self.columns[index].as_str())
    }

    fn column_is_numeric(&self, index: usize) -> bool {
        let mut saw_number = false;
        for row in &self.rows {
            match &row[index] {
                Value::Null => {}
                Value::Number(_) => saw_number = true,
                _ => return false,
            }
        }
        saw_number
    }

    /// Serialize into the dataframe envelope: columns in frame order,
    /// records as ordered mappings.
    pub fn to_envelope(&self) -> FrameEnvelope {
        let records = self
            .rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                for (name, value) in self.columns.iter().zip(row) {
                    record.insert(name.clone(), value.clone());
                }
                record
            })
            .collect();
        FrameEnvelope {
            kind: "dataframe".to_string(),
            columns: self.columns.clone(),
            records,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW_ROWS: usize = 10;
        writeln!(f, "{}", self.columns.join(" | "))?;
        for row in self.rows.iter().take(PREVIEW_ROWS) {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        if self.rows.len() > PREVIEW_ROWS {
            writeln!(f, "... ({} more rows)", self.rows.len() - PREVIEW_ROWS)?;
        }
        Ok(())
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
