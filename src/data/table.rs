//! Generic rectangular table for differential expression results.

use crate::error::{GeneRankError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Free text.
    Text(String),
    /// Numeric value (may be infinite or NaN).
    Number(f64),
    /// Missing value (`NA` or empty cell).
    Missing,
}

impl Value {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric view of the cell. Text that parses as a number is accepted.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Text(s) => parse_number(s),
            Value::Missing => None,
        }
    }

    /// Render the cell as text. Missing cells have no text form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(v) => Some(format_number(*v)),
            Value::Missing => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(v) => write!(f, "{}", format_number(*v)),
            Value::Missing => write!(f, "NA"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map(Value::Number).unwrap_or(Value::Missing)
    }
}

/// Integral values print without a fractional part so numeric identifier
/// columns (e.g. Entrez IDs) compare equal to their textual form.
fn format_number(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        (if v > 0.0 { "Inf" } else { "-Inf" }).to_string()
    } else {
        format!("{}", v)
    }
}

fn is_missing_token(raw: &str) -> bool {
    raw.is_empty() || raw == "NA" || raw == "na" || raw == "NULL"
}

fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    match raw {
        "Inf" | "+Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        _ => raw.parse::<f64>().ok(),
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Text column from string slices.
    pub fn text<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        Self::new(
            name,
            values.iter().map(|s| Value::Text(s.as_ref().to_string())).collect(),
        )
    }

    /// Numeric column from floats.
    pub fn numeric(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().map(|&v| Value::Number(v)).collect())
    }
}

/// An ordered, rectangular table of named columns.
///
/// Column names are not required to be unique on input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Create a table from columns, checking that all columns have equal length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != n_rows) {
            return Err(GeneRankError::InvalidInput(format!(
                "column '{}' has {} rows, expected {}",
                bad.name,
                bad.values.len(),
                n_rows
            )));
        }
        Ok(Self { columns, n_rows })
    }

    /// Load a table from a tab-separated file with a header row.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_delimited(file, b'\t')
    }

    /// Load a table from any delimited reader with a header row.
    ///
    /// A column is numeric when every non-missing cell parses as a number,
    /// otherwise it is kept as text. `NA`, `NULL` and empty cells are missing.
    pub fn from_delimited<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let names: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|s| s.to_string())
            .collect();
        if names.is_empty() || (names.len() == 1 && names[0].is_empty()) {
            return Err(GeneRankError::EmptyData("table has no header".to_string()));
        }

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for record in csv_reader.records() {
            let record = record?;
            for (col_idx, field) in record.iter().enumerate() {
                raw[col_idx].push(field.trim().to_string());
            }
        }

        let columns = names
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| {
                let numeric = cells
                    .iter()
                    .all(|c| is_missing_token(c) || parse_number(c).is_some());
                let values = cells
                    .into_iter()
                    .map(|c| {
                        if is_missing_token(&c) {
                            Value::Missing
                        } else if numeric {
                            parse_number(&c).map(Value::Number).unwrap_or(Value::Missing)
                        } else {
                            Value::Text(c)
                        }
                    })
                    .collect();
                Column::new(name, values)
            })
            .collect();

        Self::new(columns)
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let header: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        writeln!(writer, "{}", header.join("\t"))?;

        for row in 0..self.n_rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| c.values[row].to_string())
                .collect();
            writeln!(writer, "{}", cells.join("\t"))?;
        }

        Ok(())
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    #[inline]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Columns in order.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of the first column with exactly this name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Check if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// First column with exactly this name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Values of a named column, or a `MissingColumn` error.
    pub fn values(&self, name: &str) -> Result<&[Value]> {
        self.column(name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| GeneRankError::MissingColumn(name.to_string()))
    }

    /// Borrowed view of one row.
    pub fn row(&self, index: usize) -> RowView<'_> {
        RowView { table: self, index }
    }

    /// Iterate over all rows.
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> + '_ {
        (0..self.n_rows).map(move |index| self.row(index))
    }

    /// Rename the column at a position.
    pub fn rename_at(&mut self, index: usize, name: impl Into<String>) {
        self.columns[index].name = name.into();
    }

    /// Replace the first column with the given name, or append it.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        if column.values.len() != self.n_rows && !self.columns.is_empty() {
            return Err(GeneRankError::InvalidInput(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.values.len(),
                self.n_rows
            )));
        }
        if self.columns.is_empty() {
            self.n_rows = column.values.len();
        }
        match self.position(&column.name) {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(())
    }
}

/// A borrowed row of a [`Table`], used as the evaluation context for
/// derived columns.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> RowView<'a> {
    /// Cell in the first column with this name.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.table.column(column).map(|c| &c.values[self.index])
    }

    /// Numeric cell in the first column with this name.
    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_number)
    }
}
