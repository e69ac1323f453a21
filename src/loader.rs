//! Tabular Loader
//!
//! Reads an uploaded file into a `Dataset`. CSV delimiters are auto-detected
//! by comparing comma vs semicolon frequency in a fixed-size prefix of the
//! raw bytes; Excel workbooks are parsed sheet by sheet with calamine.

use crate::dataset::{Dataset, Sheet, Value};
use crate::error::{QueryBotError, Result};
use calamine::{open_workbook_auto, Data, Reader, Xlsx};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Size of the prefix sampled when sniffing the CSV delimiter.
const SNIFF_PREFIX_LEN: usize = 4096;

/// Pick the CSV delimiter by counting `,` vs `;` in a prefix of the raw
/// bytes. Comma wins ties, including a sample containing neither; the caller
/// accepts the degenerate single-column dataset that can result.
pub fn detect_delimiter(bytes: &[u8]) -> u8 {
    let sample_len = bytes.len().min(SNIFF_PREFIX_LEN);
    let sample = String::from_utf8_lossy(&bytes[..sample_len]);
    let commas = sample.matches(',').count();
    let semicolons = sample.matches(';').count();
    let delimiter = if semicolons > commas { b';' } else { b',' };
    debug!(commas, semicolons, delimiter = %(delimiter as char), "detected CSV delimiter");
    delimiter
}

/// Parse CSV bytes into a Dataset. The first record is the header.
pub fn load_csv(bytes: &[u8]) -> Result<Dataset> {
    let delimiter = detect_delimiter(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| QueryBotError::Parse(format!("Failed to read CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| QueryBotError::Parse(format!("Failed to read CSV row: {}", e)))?;
        let mut row: Vec<Value> = record.iter().map(Value::infer).collect();
        // Flexible parsing can yield short or long records. Short rows are
        // padded with nulls; oversized rows lose their trailing cells.
        if row.len() > columns.len() {
            warn!(
                row = rows.len(),
                cells = row.len(),
                columns = columns.len(),
                "CSV row wider than header; dropping trailing cells"
            );
        }
        row.resize(columns.len(), Value::Null);
        rows.push(row);
    }

    let dataset = Dataset::new(columns, rows)?;
    info!(
        columns = dataset.column_count(),
        rows = dataset.row_count(),
        "loaded CSV dataset"
    );
    Ok(dataset)
}

/// Read an Excel workbook from disk; every sheet becomes a named sub-dataset.
pub fn load_workbook(path: &Path) -> Result<Vec<Sheet>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| QueryBotError::Parse(format!("Failed to open workbook: {}", e)))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| QueryBotError::Parse(format!("Failed to read sheet '{}': {}", name, e)))?;
        sheets.push(Sheet {
            data: range_to_dataset(range.rows().map(|r| r.to_vec()).collect())?,
            name,
        });
    }
    info!(sheets = sheets.len(), "loaded Excel workbook");
    Ok(sheets)
}

/// Read an `.xlsx` workbook from an in-memory upload buffer.
pub fn load_workbook_bytes(bytes: &[u8]) -> Result<Vec<Sheet>> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook: Xlsx<_> = Xlsx::new(cursor)
        .map_err(|e| QueryBotError::Parse(format!("Failed to open workbook: {}", e)))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| QueryBotError::Parse(format!("Failed to read sheet '{}': {}", name, e)))?;
        sheets.push(Sheet {
            data: range_to_dataset(range.rows().map(|r| r.to_vec()).collect())?,
            name,
        });
    }
    Ok(sheets)
}

fn range_to_dataset(rows: Vec<Vec<Data>>) -> Result<Dataset> {
    if rows.is_empty() {
        return Ok(Dataset::empty());
    }
    let columns: Vec<String> = rows[0]
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let header = cell.to_string().trim().to_string();
            if header.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                header
            }
        })
        .collect();

    let mut data_rows = Vec::with_capacity(rows.len().saturating_sub(1));
    for raw_row in &rows[1..] {
        let mut row: Vec<Value> = raw_row.iter().map(cell_to_value).collect();
        row.resize(columns.len(), Value::Null);
        data_rows.push(row);
    }
    Dataset::new(columns, data_rows)
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(v) => Value::Int(*v),
        Data::Float(v) => {
            if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                Value::Int(*v as i64)
            } else {
                Value::Float(*v)
            }
        }
        Data::Bool(b) => Value::Int(*b as i64),
        Data::String(s) => Value::infer(s),
        other => Value::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_wins_on_tie() {
        assert_eq!(detect_delimiter(b"a,b;c,d;"), b',');
    }

    #[test]
    fn comma_is_default_for_empty_sample() {
        assert_eq!(detect_delimiter(b""), b',');
        assert_eq!(detect_delimiter(b"singlecolumn\nvalue\n"), b',');
    }

    #[test]
    fn semicolon_detected_when_dominant() {
        assert_eq!(detect_delimiter(b"a;b;c\n1;2;3\n"), b';');
    }

    #[test]
    fn csv_shape_matches_header_and_lines() {
        let csv = b"month,sales\nJan,100\nFeb,150\nMar,120\n";
        let ds = load_csv(csv).unwrap();
        assert_eq!(ds.columns, vec!["month", "sales"]);
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.rows[0][0], Value::Text("Jan".to_string()));
        assert_eq!(ds.rows[0][1], Value::Int(100));
    }

    #[test]
    fn semicolon_csv_parses_to_same_shape() {
        let csv = b"month;sales\nJan;100\nFeb;150\n";
        let ds = load_csv(csv).unwrap();
        assert_eq!(ds.column_count(), 2);
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn delimiterless_input_yields_single_column() {
        let csv = b"values\n1\n2\n";
        let ds = load_csv(csv).unwrap();
        assert_eq!(ds.column_count(), 1);
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn short_rows_are_padded_with_null() {
        let csv = b"a,b\n1\n";
        let ds = load_csv(csv).unwrap();
        assert_eq!(ds.rows[0], vec![Value::Int(1), Value::Null]);
    }

    #[test]
    fn oversized_rows_keep_only_header_width() {
        let csv = b"a,b\n1,2,3\n";
        let ds = load_csv(csv).unwrap();
        assert_eq!(ds.column_count(), 2);
        assert_eq!(ds.rows[0], vec![Value::Int(1), Value::Int(2)]);
    }
}
