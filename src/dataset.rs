//! Tabular data model
//!
//! A `Dataset` is the parsed content of one uploaded file: an ordered list of
//! column names and an ordered list of rows. Every row has exactly one cell
//! per column. Query results reuse the same shape.

use crate::error::{QueryBotError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Null => None,
        }
    }

    /// Parse a raw text cell into the narrowest scalar type.
    /// Empty cells become `Null`.
    pub fn infer(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        Value::Text(raw.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Parsed tabular content of one uploaded file (or one query result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a Dataset, enforcing that every row matches the column width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(QueryBotError::Parse(format!(
                    "Row {} has {} cells but {} columns are declared",
                    idx,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Find a column index, ignoring case and surrounding whitespace.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let needle = name.trim().to_lowercase();
        self.columns
            .iter()
            .position(|c| c.trim().to_lowercase() == needle)
    }

    /// All values of one column.
    pub fn column_values(&self, index: usize) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Render the dataset as an aligned text grid for terminal display.
    pub fn to_grid(&self) -> String {
        if self.columns.is_empty() {
            return String::from("(empty result)");
        }
        // Widths in characters, not bytes, so non-ASCII cells stay aligned.
        let char_len = |s: &str| s.chars().count();
        let mut widths: Vec<usize> = self.columns.iter().map(|c| char_len(c)).collect();
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();
        for row in &rendered {
            for (i, cell) in row.iter().enumerate() {
                if char_len(cell) > widths[i] {
                    widths[i] = char_len(cell);
                }
            }
        }
        let mut out = String::new();
        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect();
        out.push_str(&header.join(" | "));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&rule.join("-+-"));
        out.push('\n');
        for row in &rendered {
            let line: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                .collect();
            out.push_str(&line.join(" | "));
            out.push('\n');
        }
        out
    }
}

/// One sheet of an Excel workbook: a named sub-dataset.
/// Sheets are kept for the insights flow and are never loaded into the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub data: Dataset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_narrows_scalar_types() {
        assert_eq!(Value::infer("42"), Value::Int(42));
        assert_eq!(Value::infer("3.5"), Value::Float(3.5));
        assert_eq!(Value::infer("hello"), Value::Text("hello".to_string()));
        assert_eq!(Value::infer("  "), Value::Null);
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let result = Dataset::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Value::Int(1)]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn column_index_ignores_case_and_whitespace() {
        let ds = Dataset::new(
            vec!["Month ".to_string(), "sales".to_string()],
            vec![],
        )
        .unwrap();
        assert_eq!(ds.column_index("month"), Some(0));
        assert_eq!(ds.column_index(" SALES "), Some(1));
        assert_eq!(ds.column_index("profit"), None);
    }

    #[test]
    fn grid_aligns_non_ascii_cells() {
        let ds = Dataset::new(
            vec!["city".to_string(), "sales".to_string()],
            vec![
                vec![Value::Text("München".to_string()), Value::Int(100)],
                vec![Value::Text("Paris".to_string()), Value::Int(90)],
            ],
        )
        .unwrap();
        let grid = ds.to_grid();
        let line_widths: Vec<usize> = grid.lines().map(|l| l.chars().count()).collect();
        assert!(line_widths.windows(2).all(|w| w[0] == w[1]), "{:?}", line_widths);
    }

    #[test]
    fn grid_contains_headers_and_cells() {
        let ds = Dataset::new(
            vec!["month".to_string(), "sales".to_string()],
            vec![vec![Value::Text("Jan".to_string()), Value::Int(100)]],
        )
        .unwrap();
        let grid = ds.to_grid();
        assert!(grid.contains("month"));
        assert!(grid.contains("Jan"));
        assert!(grid.contains("100"));
    }
}
